//! History events for a single execution.
//!
//! Every transition of an execution is recorded as an immutable event in an
//! in-memory, append-only history returned alongside the result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single entry in an execution's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// The execution this event belongs to
    pub execution_id: Uuid,

    /// State the event refers to (None for execution-level events)
    pub state: Option<String>,

    /// Type of event
    pub event_type: EventType,

    /// Correlation key: "{execution_id}:{state}:{input_digest}"
    pub correlation_key: String,

    /// Human-readable summary (NO payload contents)
    pub summary: String,

    /// Time taken in milliseconds (for task events)
    pub duration_ms: Option<u64>,

    /// Error message if failed
    pub error: Option<String>,
}

impl Event {
    /// Create a new event with the current timestamp
    pub fn new(
        execution_id: Uuid,
        state: Option<String>,
        event_type: EventType,
        correlation_key: String,
        summary: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            execution_id,
            state,
            event_type,
            correlation_key,
            summary,
            duration_ms: None,
            error: None,
        }
    }

    /// Create an event with duration information
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Create an event with error information
    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }
}

/// Build the correlation key for a state visit
pub fn correlation_key(execution_id: Uuid, state: &str, input_digest: &str) -> String {
    format!("{}:{}:{}", execution_id, state, input_digest)
}

/// Types of events that can occur during an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Execution accepted its input payload
    ExecutionStarted,

    /// The execution moved into a state
    StateEntered,

    /// A task state's capability returned output
    TaskSucceeded,

    /// A task state's capability returned an error
    TaskFailed,

    /// A choice state selected its next state
    ChoiceEvaluated,

    /// Execution reached a success terminal state
    ExecutionSucceeded,

    /// Execution reached a failure terminal state
    ExecutionFailed,

    /// Execution deadline elapsed before a terminal state
    ExecutionTimedOut,
}
