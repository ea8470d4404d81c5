//! Independence Integration Tests
//!
//! Executions share no state: the same input yields the same result, and
//! concurrent executions do not interfere.

mod common;

use std::sync::Arc;

use serde_json::json;
use tokio::task::JoinSet;

use common::{payload, Harness, MockCapability};
use sentiflow::{CapabilityError, Payload};

/// Classify by the record's text so different inputs take different arms
fn text_classifier() -> MockCapability {
    MockCapability::new("classify", |mut input: Payload| {
        let text = input
            .lookup_str("$.text")
            .ok_or_else(|| CapabilityError::InvalidInput("missing text".to_string()))?;
        let emotion = if text.contains("hate") { "NEGATIVE" } else { "POSITIVE" };
        input.insert("emotion", emotion);
        Ok(input)
    })
}

/// Look up text by age
fn record_fetcher() -> MockCapability {
    MockCapability::new("fetch", |mut input: Payload| {
        let text = match input.lookup_str("$.age") {
            Some("34") => "I hate this",
            Some("50") => "What a lovely day",
            Some(other) => return Err(CapabilityError::NotFound(format!("age={}", other))),
            None => return Err(CapabilityError::InvalidInput("missing age".to_string())),
        };
        input.insert("text", text);
        Ok(input)
    })
}

#[tokio::test]
async fn test_repeated_runs_agree() {
    let harness = Harness::new(record_fetcher(), text_classifier(), MockCapability::passthrough("notify"));
    let orchestrator = harness.orchestrator();

    let first = orchestrator.start_execution(payload(json!({ "age": "34" }))).await;
    let second = orchestrator.start_execution(payload(json!({ "age": "34" }))).await;

    assert_ne!(first.execution_id, second.execution_id);
    assert_eq!(first.outcome, second.outcome);
    assert_eq!(first.final_state, second.final_state);
    assert_eq!(harness.notify.calls(), 2);
}

#[tokio::test]
async fn test_concurrent_executions_are_independent() {
    let harness = Harness::new(record_fetcher(), text_classifier(), MockCapability::passthrough("notify"));
    let orchestrator = Arc::new(harness.orchestrator());

    let mut set = JoinSet::new();
    for i in 0..10 {
        let orchestrator = Arc::clone(&orchestrator);
        let age = if i % 2 == 0 { "34" } else { "50" };
        set.spawn(async move {
            let report = orchestrator.start_execution(payload(json!({ "age": age }))).await;
            (age, report)
        });
    }

    let mut ids = Vec::new();
    while let Some(joined) = set.join_next().await {
        let (age, report) = joined.unwrap();
        let result = report.outcome.payload().expect("execution should succeed");
        let expected = if age == "34" { "NEGATIVE" } else { "POSITIVE" };
        assert_eq!(result.lookup_str("$.emotion"), Some(expected));
        assert_eq!(result.lookup_str("$.age"), Some(age));
        assert!(report
            .history
            .iter()
            .all(|e| e.execution_id == report.execution_id));
        ids.push(report.execution_id);
    }

    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10);
    assert_eq!(harness.fetch.calls(), 10);
    assert_eq!(harness.notify.calls(), 5);
}

#[tokio::test]
async fn test_one_failure_does_not_affect_others() {
    let harness = Harness::new(record_fetcher(), text_classifier(), MockCapability::passthrough("notify"));
    let orchestrator = harness.orchestrator();

    let (missing, present) = tokio::join!(
        orchestrator.run(payload(json!({ "age": "99" }))),
        orchestrator.run(payload(json!({ "age": "50" }))),
    );

    tokio_test::assert_err!(missing);
    let present = tokio_test::assert_ok!(present);
    assert_eq!(present.lookup_str("$.emotion"), Some("POSITIVE"));
}
