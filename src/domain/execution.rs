//! Execution state and results.
//!
//! An Execution is one run of a workflow for one input payload. It lives only
//! for the duration of the run and is turned into an [`ExecutionReport`] once
//! a terminal state is reached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::adapters::CapabilityError;

use super::events::{Event, EventType};
use super::payload::Payload;

/// A workflow execution in progress
#[derive(Debug, Clone)]
pub struct Execution {
    /// Unique identifier for this execution
    pub id: Uuid,

    /// Name of the workflow being executed
    pub workflow_name: String,

    /// Payload supplied by the caller
    pub input: Payload,

    /// Current payload (replaced by each task's output)
    pub payload: Payload,

    /// Name of the state currently being executed
    pub current_state: String,

    /// When the execution started
    pub started_at: DateTime<Utc>,

    /// Wall-clock deadline (start + maximum duration)
    pub deadline: DateTime<Utc>,

    /// Number of state transitions taken so far
    pub transitions: u32,

    /// Ordered history of events
    pub history: Vec<Event>,
}

impl Execution {
    /// Create a new execution positioned at the workflow's start state
    pub fn new(
        id: Uuid,
        workflow_name: String,
        start_state: String,
        input: Payload,
        max_duration: chrono::Duration,
    ) -> Self {
        let started_at = Utc::now();
        Self {
            id,
            workflow_name,
            payload: input.clone(),
            input,
            current_state: start_state,
            started_at,
            deadline: started_at
                .checked_add_signed(max_duration)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            transitions: 0,
            history: Vec::new(),
        }
    }

    /// Append an event to the history
    pub fn record(&mut self, event: Event) {
        self.history.push(event);
    }

    /// Move to the next state
    pub fn transition_to(&mut self, next: &str) {
        self.current_state = next.to_string();
        self.transitions += 1;
    }

    /// Finish the execution, producing the report handed to the caller
    pub fn finish(self, outcome: ExecutionOutcome) -> ExecutionReport {
        ExecutionReport {
            execution_id: self.id,
            workflow_name: self.workflow_name,
            started_at: self.started_at,
            completed_at: Utc::now(),
            final_state: self.current_state,
            outcome,
            history: self.history,
        }
    }
}

/// The two outcome shapes an execution can end in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ExecutionOutcome {
    /// Reached a success terminal state
    Succeeded { payload: Payload },

    /// Reached a failure terminal state
    Failed { cause: FailureCause },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Succeeded { payload } => Some(payload),
            Self::Failed { .. } => None,
        }
    }

    pub fn cause(&self) -> Option<&FailureCause> {
        match self {
            Self::Succeeded { .. } => None,
            Self::Failed { cause } => Some(cause),
        }
    }

    pub fn into_result(self) -> Result<Payload, FailureCause> {
        match self {
            Self::Succeeded { payload } => Ok(payload),
            Self::Failed { cause } => Err(cause),
        }
    }
}

/// Why an execution failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum FailureCause {
    /// An invoked capability could not produce output
    #[error("Task '{state}' failed: {error}")]
    TaskFailed { state: String, error: CapabilityError },

    /// The execution deadline elapsed before a terminal state was reached
    #[error("Execution timed out in state '{state}' after {limit_seconds}s")]
    Timeout { state: String, limit_seconds: u64 },

    /// The workflow routed into a fail state
    #[error("State '{state}' failed: {error}: {cause}")]
    FailState {
        state: String,
        error: String,
        cause: String,
    },

    /// A transition or payload limit was exceeded
    #[error("Limit exceeded in state '{state}': {limit}")]
    LimitExceeded { state: String, limit: String },
}

impl FailureCause {
    /// State in which the failure happened
    pub fn state(&self) -> &str {
        match self {
            Self::TaskFailed { state, .. }
            | Self::Timeout { state, .. }
            | Self::FailState { state, .. }
            | Self::LimitExceeded { state, .. } => state,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result of one execution as returned to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub execution_id: Uuid,
    pub workflow_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// State the execution ended in
    pub final_state: String,
    pub outcome: ExecutionOutcome,
    pub history: Vec<Event>,
}

impl ExecutionReport {
    /// Number of times a state was entered
    pub fn times_entered(&self, state: &str) -> usize {
        self.history
            .iter()
            .filter(|e| e.event_type == EventType::StateEntered)
            .filter(|e| e.state.as_deref() == Some(state))
            .count()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }
}
