//! Shared test capabilities.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use sentiflow::adapters::{CAPABILITY_CLASSIFY, CAPABILITY_FETCH_RECORD, CAPABILITY_NOTIFY};
use sentiflow::{Capability, CapabilityError, CapabilityRegistry, Orchestrator, Payload, Workflow};

type Responder = Box<dyn Fn(Payload) -> Result<Payload, CapabilityError> + Send + Sync>;

/// Scripted capability that counts its invocations
pub struct MockCapability {
    name: String,
    respond: Responder,
    delay: Option<Duration>,
    calls: AtomicUsize,
    completions: AtomicUsize,
}

impl MockCapability {
    pub fn new(
        name: &str,
        respond: impl Fn(Payload) -> Result<Payload, CapabilityError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            respond: Box::new(respond),
            delay: None,
            calls: AtomicUsize::new(0),
            completions: AtomicUsize::new(0),
        }
    }

    /// Echo the input back unchanged
    pub fn passthrough(name: &str) -> Self {
        Self::new(name, Ok)
    }

    /// Always fail with the given error
    pub fn failing(name: &str, error: CapabilityError) -> Self {
        Self::new(name, move |_| Err(error.clone()))
    }

    /// Merge fixed fields into the input
    pub fn merging(name: &str, fields: Value) -> Self {
        Self::new(name, move |mut input| {
            let extra = Payload::try_from(fields.clone())
                .map_err(|e| CapabilityError::MalformedResponse(e.to_string()))?;
            input.merge(extra);
            Ok(input)
        })
    }

    /// Sleep before responding
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Invocations that ran to completion (not cancelled)
    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl Capability for MockCapability {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: Payload) -> Result<Payload, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = (self.respond)(input);
        self.completions.fetch_add(1, Ordering::SeqCst);
        result
    }
}

pub fn payload(value: Value) -> Payload {
    Payload::try_from(value).expect("test payload must be an object")
}

/// The three capabilities of the sentiment workflow
pub struct Harness {
    pub fetch: Arc<MockCapability>,
    pub classify: Arc<MockCapability>,
    pub notify: Arc<MockCapability>,
}

impl Harness {
    pub fn new(fetch: MockCapability, classify: MockCapability, notify: MockCapability) -> Self {
        Self {
            fetch: fetch.into_arc(),
            classify: classify.into_arc(),
            notify: notify.into_arc(),
        }
    }

    /// Fetch adds `text`, classify sets `emotion`, notify passes through
    pub fn with_emotion(text: &str, emotion: Value) -> Self {
        Self::new(
            MockCapability::merging("fetch", serde_json::json!({ "text": text })),
            MockCapability::merging("classify", serde_json::json!({ "emotion": emotion })),
            MockCapability::passthrough("notify"),
        )
    }

    pub fn registry(&self) -> CapabilityRegistry {
        CapabilityRegistry::new()
            .with(CAPABILITY_FETCH_RECORD, self.fetch.clone())
            .with(CAPABILITY_CLASSIFY, self.classify.clone())
            .with(CAPABILITY_NOTIFY, self.notify.clone())
    }

    pub fn orchestrator(&self) -> Orchestrator {
        self.orchestrator_for(Workflow::sentiment())
    }

    pub fn orchestrator_for(&self, workflow: Workflow) -> Orchestrator {
        Orchestrator::new(workflow, self.registry()).expect("workflow must be valid")
    }
}
