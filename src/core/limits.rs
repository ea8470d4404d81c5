//! Execution limits and deadline tracking.
//!
//! Bounds every execution by:
//! - Total wall-clock duration (one budget shared by all states)
//! - Number of state transitions
//! - Payload size

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

use crate::domain::Payload;

/// Longest execution a workflow may ask for (7 days)
pub const MAX_TIMEOUT_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Limits applied to each execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Maximum execution duration in seconds (default: 900 = 15 min)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Maximum number of state transitions (default: 25)
    #[serde(default = "default_max_transitions")]
    pub max_transitions: u32,

    /// Maximum payload size in bytes (default: 256 KiB)
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

fn default_timeout() -> u64 {
    900
} // 15 min
fn default_max_transitions() -> u32 {
    25
}
fn default_max_payload_bytes() -> usize {
    256 * 1024
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            max_transitions: default_max_transitions(),
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

impl ExecutionLimits {
    /// Execution budget, capped at [`MAX_TIMEOUT_SECONDS`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.min(MAX_TIMEOUT_SECONDS))
    }

    /// Validate a payload against the size limit
    pub fn validate_payload(&self, payload: &Payload) -> Result<(), LimitViolation> {
        let size = payload.size_bytes();
        if size > self.max_payload_bytes {
            return Err(LimitViolation::MaxPayloadBytes {
                actual: size,
                limit: self.max_payload_bytes,
            });
        }
        Ok(())
    }

    /// Check a transition count against the limit
    pub fn check_transitions(&self, transitions: u32) -> Result<(), LimitViolation> {
        if transitions >= self.max_transitions {
            return Err(LimitViolation::MaxTransitions {
                actual: transitions,
                limit: self.max_transitions,
            });
        }
        Ok(())
    }
}

/// Absolute deadline for one execution.
///
/// Computed once when the execution starts; never reset between states.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started_at: Instant,
    expires_at: Instant,
}

impl Deadline {
    /// Start a deadline `budget` from now
    ///
    /// A budget the clock cannot represent is capped at [`MAX_TIMEOUT_SECONDS`].
    pub fn start(budget: Duration) -> Self {
        let started_at = Instant::now();
        let expires_at = started_at
            .checked_add(budget)
            .or_else(|| started_at.checked_add(Duration::from_secs(MAX_TIMEOUT_SECONDS)))
            .unwrap_or(started_at);
        Self {
            started_at,
            expires_at,
        }
    }

    /// Instant at which the execution must be finished
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Limit violation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitViolation {
    #[error("Maximum transitions exceeded: {actual} >= {limit}")]
    MaxTransitions { actual: u32, limit: u32 },

    #[error("Maximum payload bytes exceeded: {actual} > {limit}")]
    MaxPayloadBytes { actual: usize, limit: usize },
}
