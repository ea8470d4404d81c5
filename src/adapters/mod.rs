//! Capability interfaces for external systems.
//!
//! Capabilities provide a unified call contract for the external operations a
//! workflow invokes: record lookup, classification, notification.

pub mod classifier;
pub mod log_notifier;
pub mod record_store;
pub mod telegram;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Payload;

pub use classifier::{ClassifierConfig, SentimentClassifier};
pub use log_notifier::LogNotifier;
pub use record_store::{FetchRecord, RecordStore};
pub use telegram::{TelegramClient, TelegramConfig, TelegramNotifier};

/// Registry key of the record lookup capability
pub const CAPABILITY_FETCH_RECORD: &str = "fetch_record";

/// Registry key of the classification capability
pub const CAPABILITY_CLASSIFY: &str = "classify";

/// Registry key of the notification capability
pub const CAPABILITY_NOTIFY: &str = "notify";

/// Why a capability could not produce output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case", tag = "kind", content = "message")]
pub enum CapabilityError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invocation error: {0}")]
    Invocation(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("timed out: {0}")]
    Timeout(String),
}

/// An external operation invoked by a task state
#[async_trait]
pub trait Capability: Send + Sync {
    /// Human-readable capability name
    fn name(&self) -> &str;

    /// Invoke the capability with the current payload
    async fn invoke(&self, input: Payload) -> Result<Payload, CapabilityError>;
}

/// Capability handles injected into the orchestrator, keyed by reference name
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: BTreeMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability under a reference name, replacing any previous one
    pub fn register(&mut self, key: impl Into<String>, capability: Arc<dyn Capability>) {
        self.capabilities.insert(key.into(), capability);
    }

    /// Builder-style register
    pub fn with(mut self, key: impl Into<String>, capability: Arc<dyn Capability>) -> Self {
        self.register(key, capability);
        self
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.capabilities.contains_key(key)
    }

    /// Registered reference names, sorted
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.capabilities.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.capabilities
                    .iter()
                    .map(|(key, cap)| (key.as_str(), cap.name())),
            )
            .finish()
    }
}
