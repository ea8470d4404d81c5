//! End-to-End Integration Tests
//!
//! Wires the real record store, classifier and notifiers from configuration,
//! with the HTTP endpoints served by mockito.

use mockito::{Matcher, Server};
use serde_json::json;
use tempfile::TempDir;

use sentiflow::adapters::{ClassifierConfig, RecordStore};
use sentiflow::cli::{build_registry, load_workflow};
use sentiflow::config::{LimitsConfig, NotifierConfig, ResolvedConfig};
use sentiflow::{CapabilityError, FailureCause, Orchestrator, Payload};

fn payload(value: serde_json::Value) -> Payload {
    Payload::try_from(value).unwrap()
}

fn resolved(temp: &TempDir, classifier_url: String, notifier: NotifierConfig) -> ResolvedConfig {
    ResolvedConfig {
        home: temp.path().to_path_buf(),
        config_file: None,
        store_path: temp.path().join("records.db"),
        key_field: "age".to_string(),
        classifier: ClassifierConfig {
            base_url: classifier_url,
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        },
        notifier,
        limits: LimitsConfig::default(),
        workflow: None,
    }
}

async fn seed(config: &ResolvedConfig) {
    let store = RecordStore::open(&config.store_path).unwrap();
    store
        .put("34", payload(json!({ "text": "I hate this" })))
        .await
        .unwrap();
    store
        .put("50", payload(json!({ "text": "What a lovely day" })))
        .await
        .unwrap();
}

fn completion(label: &str) -> String {
    json!({
        "id": "chatcmpl-1",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": label },
            "finish_reason": "stop"
        }]
    })
    .to_string()
}

fn orchestrator(config: &ResolvedConfig) -> Orchestrator {
    let workflow = load_workflow(config, None).unwrap();
    let registry = build_registry(config).unwrap();
    Orchestrator::new(workflow, registry).unwrap()
}

#[tokio::test]
async fn test_negative_record_sends_telegram_alert() {
    let mut model = Server::new_async().await;
    let mut telegram = Server::new_async().await;

    let classify = model
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::Regex("I hate this".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion("NEGATIVE"))
        .expect(1)
        .create_async()
        .await;

    let alert = telegram
        .mock("POST", "/botTOKEN/sendMessage")
        .match_body(Matcher::PartialJson(json!({ "chat_id": "-1001" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ok":true,"result":{"message_id":7}}"#)
        .expect(1)
        .create_async()
        .await;

    let temp = TempDir::new().unwrap();
    let config = resolved(
        &temp,
        model.url(),
        NotifierConfig::Telegram {
            chat_id: "-1001".to_string(),
            bot_token: Some("TOKEN".to_string()),
            api_base: Some(telegram.url()),
        },
    );
    seed(&config).await;

    let result = orchestrator(&config)
        .run(payload(json!({ "age": "34" })))
        .await
        .unwrap();

    assert_eq!(result.lookup_str("$.text"), Some("I hate this"));
    assert_eq!(result.lookup_str("$.emotion"), Some("NEGATIVE"));
    classify.assert_async().await;
    alert.assert_async().await;
}

#[tokio::test]
async fn test_positive_record_sends_nothing() {
    let mut model = Server::new_async().await;
    let mut telegram = Server::new_async().await;

    let classify = model
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion("Positive."))
        .create_async()
        .await;

    let alert = telegram
        .mock("POST", "/botTOKEN/sendMessage")
        .expect(0)
        .create_async()
        .await;

    let temp = TempDir::new().unwrap();
    let config = resolved(
        &temp,
        model.url(),
        NotifierConfig::Telegram {
            chat_id: "-1001".to_string(),
            bot_token: Some("TOKEN".to_string()),
            api_base: Some(telegram.url()),
        },
    );
    seed(&config).await;

    let result = orchestrator(&config)
        .run(payload(json!({ "age": 50 })))
        .await
        .unwrap();

    assert_eq!(result.lookup_str("$.emotion"), Some("POSITIVE"));
    classify.assert_async().await;
    alert.assert_async().await;
}

#[tokio::test]
async fn test_unknown_record_fails_before_classifying() {
    let mut model = Server::new_async().await;
    let classify = model
        .mock("POST", "/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let temp = TempDir::new().unwrap();
    let config = resolved(&temp, model.url(), NotifierConfig::Log);
    seed(&config).await;

    let result = orchestrator(&config)
        .run(payload(json!({ "age": "99" })))
        .await;

    assert_eq!(
        result,
        Err(FailureCause::TaskFailed {
            state: "FetchRecord".to_string(),
            error: CapabilityError::NotFound("age=99".to_string()),
        })
    );
    classify.assert_async().await;
}

#[tokio::test]
async fn test_classifier_outage_fails_execution() {
    let mut model = Server::new_async().await;
    model
        .mock("POST", "/chat/completions")
        .with_status(503)
        .with_body("overloaded")
        .create_async()
        .await;

    let temp = TempDir::new().unwrap();
    let config = resolved(&temp, model.url(), NotifierConfig::Log);
    seed(&config).await;

    let report = orchestrator(&config)
        .start_execution(payload(json!({ "age": "34" })))
        .await;

    let cause = report.outcome.cause().unwrap();
    assert_eq!(cause.state(), "Classify");
    assert!(cause.to_string().contains("503"));
    assert_eq!(report.times_entered("Notify"), 0);
}
