//! Telegram Bot API notifier.
//!
//! Publishes negative-sentiment alerts to a single fixed Telegram chat.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::Payload;

use super::{Capability, CapabilityError};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API client
pub struct TelegramClient {
    /// Bot token
    bot_token: String,
    /// Target chat ID
    chat_id: String,
    /// API base URL
    api_base: String,
    /// HTTP client
    client: reqwest::Client,
}

/// Response from Telegram API
#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// Message result from sendMessage
#[derive(Debug, Deserialize)]
struct MessageResult {
    message_id: i64,
}

/// Configuration for Telegram client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default)]
    pub api_base: Option<String>,
}

impl TelegramClient {
    /// Create a new Telegram client
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            bot_token,
            chat_id,
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create from config
    pub fn from_config(config: TelegramConfig) -> Self {
        let mut client = Self::new(config.bot_token, config.chat_id);
        if let Some(base) = config.api_base {
            client.api_base = base;
        }
        client
    }

    /// Build API URL
    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base.trim_end_matches('/'),
            self.bot_token,
            method
        )
    }

    /// Send a text message, returning the message id
    pub async fn send_message(&self, text: &str) -> Result<i64> {
        let url = self.api_url("sendMessage");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": text,
            }))
            .send()
            .await
            .context("Failed to send Telegram message")?;

        let result: TelegramResponse<MessageResult> = response
            .json()
            .await
            .context("Failed to parse Telegram response")?;

        if !result.ok {
            anyhow::bail!(
                "Telegram API error: {}",
                result.description.unwrap_or_default()
            );
        }

        Ok(result.result.map(|r| r.message_id).unwrap_or(0))
    }
}

/// Render the alert text for a payload
pub fn format_alert(payload: &Payload) -> String {
    let emotion = payload.lookup_str("$.emotion").unwrap_or("UNKNOWN");
    let mut text = format!("Sentiment alert: {}", emotion);

    if let Some(body) = payload.lookup_str("$.text") {
        text.push_str("\n\n");
        text.push_str(body);
    }

    text.push_str("\n\n");
    text.push_str(&payload.to_string());
    text
}

/// Notification capability publishing through Telegram
pub struct TelegramNotifier {
    client: TelegramClient,
}

impl TelegramNotifier {
    pub fn new(client: TelegramClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Capability for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn invoke(&self, input: Payload) -> Result<Payload, CapabilityError> {
        let message_id = self
            .client
            .send_message(&format_alert(&input))
            .await
            .map_err(|e| CapabilityError::Invocation(format!("{:#}", e)))?;

        info!(message_id, "Notification delivered");
        Ok(input)
    }
}
