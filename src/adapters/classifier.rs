//! Sentiment classifier backed by a chat-completions model endpoint.
//!
//! Sends the payload's text to an OpenAI-compatible `/chat/completions` API
//! and writes the model's one-word verdict into the `emotion` field.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::domain::Payload;

use super::{Capability, CapabilityError};

/// Payload field the verdict is written to
pub const EMOTION_FIELD: &str = "emotion";

const SYSTEM_PROMPT: &str = "You are a sentiment classifier. \
Reply with exactly one word: POSITIVE, NEGATIVE, NEUTRAL or MIXED.";

/// Classifier endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// API base URL (the `/chat/completions` path is appended)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token, if the endpoint needs one
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Payload field holding the text to classify
    #[serde(default = "default_text_field")]
    pub text_field: String,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_text_field() -> String {
    "text".to_string()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            text_field: default_text_field(),
        }
    }
}

/// Classification capability
pub struct SentimentClassifier {
    config: ClassifierConfig,
    client: reqwest::Client,
}

impl SentimentClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn build_headers(&self) -> Result<HeaderMap, CapabilityError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(ref key) = self.config.api_key {
            let auth = format!("Bearer {}", key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth)
                    .map_err(|e| CapabilityError::Invocation(e.to_string()))?,
            );
        }
        Ok(headers)
    }

    fn build_request(&self, text: &str) -> Value {
        serde_json::json!({
            "model": self.config.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": text },
            ],
        })
    }
}

/// Pull the reply text out of a chat-completions response body
fn parse_reply(body: &Value) -> Result<&str, CapabilityError> {
    body.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            CapabilityError::MalformedResponse("missing choices[0].message.content".to_string())
        })
}

/// Normalise a model reply to a label: first word, letters only, upper-cased
pub fn normalize_label(reply: &str) -> Option<String> {
    let word = reply
        .split_whitespace()
        .next()?
        .trim_matches(|c: char| !c.is_alphabetic());

    if word.is_empty() {
        None
    } else {
        Some(word.to_uppercase())
    }
}

#[async_trait]
impl Capability for SentimentClassifier {
    fn name(&self) -> &str {
        "sentiment_classifier"
    }

    async fn invoke(&self, input: Payload) -> Result<Payload, CapabilityError> {
        let text = input.lookup_str(&self.config.text_field).ok_or_else(|| {
            CapabilityError::InvalidInput(format!(
                "missing text field '{}'",
                self.config.text_field
            ))
        })?;

        let headers = self.build_headers()?;
        let response = self
            .client
            .post(self.endpoint())
            .headers(headers)
            .json(&self.build_request(text))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CapabilityError::Timeout(e.to_string())
                } else {
                    CapabilityError::Invocation(e.to_string())
                }
            })?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| CapabilityError::Invocation(e.to_string()))?;

        if !status.is_success() {
            return Err(CapabilityError::Invocation(format!(
                "model endpoint returned {}: {}",
                status.as_u16(),
                body_text.trim()
            )));
        }

        let body: Value = serde_json::from_str(&body_text)
            .map_err(|e| CapabilityError::MalformedResponse(e.to_string()))?;
        let reply = parse_reply(&body)?;
        let label = normalize_label(reply).ok_or_else(|| {
            CapabilityError::MalformedResponse("model returned an empty reply".to_string())
        })?;

        debug!(%label, model = %self.config.model, "Classified record");

        let mut output = input;
        output.insert(EMOTION_FIELD, label);
        Ok(output)
    }
}
