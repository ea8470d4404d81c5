//! Domain types for the sentiflow orchestrator.
//!
//! This module contains the core data structures:
//! - Payload: JSON object flowing between states
//! - Execution: One run of a workflow
//! - Events: Immutable history entries for an execution

pub mod events;
pub mod execution;
pub mod payload;

// Re-export commonly used types
pub use events::{correlation_key, Event, EventType};
pub use execution::{Execution, ExecutionOutcome, ExecutionReport, FailureCause};
pub use payload::{Payload, PayloadError};
