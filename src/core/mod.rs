//! Core orchestration logic.
//!
//! This module contains:
//! - Workflow: State definitions and loading
//! - Condition: Choice predicates over the payload
//! - Limits: Execution deadline and size limits
//! - Orchestrator: Main execution engine

pub mod condition;
pub mod limits;
pub mod orchestrator;
pub mod workflow;

// Re-export commonly used types
pub use condition::{Condition, Predicate};
pub use limits::{Deadline, ExecutionLimits, LimitViolation, MAX_TIMEOUT_SECONDS};
pub use orchestrator::Orchestrator;
pub use workflow::{
    ChoiceRule, ChoiceState, ErrorPolicy, State, TaskState, Workflow, WorkflowError,
};
