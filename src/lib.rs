//! sentiflow - Sentiment notification workflow orchestrator
//!
//! Runs a small state-machine workflow for each incoming payload: fetch a
//! record by key, classify its sentiment with a model, and publish a
//! notification when the sentiment is negative.
//!
//! # Architecture
//!
//! - A workflow is an ordered list of states (task, choice, succeed, fail)
//! - Task states call injected capabilities; their output replaces the payload
//! - Choice states route on predicates over the payload
//! - Every execution runs against a single deadline shared by all states
//!
//! # Modules
//!
//! - `adapters`: Capabilities (record store, classifier, notifiers)
//! - `core`: Orchestration logic (Workflow, Condition, Limits, Orchestrator)
//! - `domain`: Data structures (Payload, Execution, Event)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Store a record
//! sentiflow record put 34 '{"text": "I hate this"}'
//!
//! # Run the workflow
//! sentiflow run --payload '{"age": "34"}'
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{Capability, CapabilityError, CapabilityRegistry};
pub use self::core::{Orchestrator, Workflow};
pub use domain::{ExecutionOutcome, ExecutionReport, FailureCause, Payload};
