//! ==============================================================================
//! alert.rs - outbound alert delivery
//! ==============================================================================
//!
//! purpose:
//!     the only component that talks to the outside network. the ingestion
//!     loop hands it a message and gets back an outcome; a failed delivery
//!     is logged by the caller and never stops the loop.
//!
//! relationships:
//!     - used by: ingest.rs (through the AlertDispatcher trait)
//!     - uses: reqwest (https post to the telegram bot api)
//!
//! ==============================================================================

use crate::config::AlertConfig;
use crate::error::TransportError;
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;

/// result of one delivery attempt
#[derive(Debug)]
pub enum DispatchOutcome {
    Delivered,
    Failed(TransportError),
}

/// anything that can deliver an alert message
///
/// implementations must not panic or return early errors; every failure
/// is folded into `DispatchOutcome::Failed`.
pub trait AlertDispatcher: Send + Sync {
    fn send(&self, message: &str) -> impl Future<Output = DispatchOutcome> + Send;
}

// ==============================================================================
// telegram bot api
// ==============================================================================

pub struct TelegramDispatcher {
    client: reqwest::Client,
    url: String,
    chat_id: serde_json::Value,
}

impl TelegramDispatcher {
    pub fn new(api_base: &str, bot_token: &str, chat_id: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;

        Ok(Self::with_client(client, api_base, bot_token, chat_id))
    }

    pub fn with_client(client: reqwest::Client, api_base: &str, bot_token: &str, chat_id: &str) -> Self {
        Self {
            client,
            url: format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), bot_token),
            chat_id: chat_id_value(chat_id),
        }
    }

    pub fn from_config(config: &AlertConfig) -> Result<Self> {
        Self::new(
            &config.api_base,
            &config.bot_token,
            &config.chat_id,
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

/// numeric ids go out as json numbers, channel names (@foo) as strings
fn chat_id_value(chat_id: &str) -> serde_json::Value {
    match chat_id.trim().parse::<i64>() {
        Ok(id) => serde_json::Value::from(id),
        Err(_) => serde_json::Value::from(chat_id.trim()),
    }
}

impl AlertDispatcher for TelegramDispatcher {
    async fn send(&self, message: &str) -> DispatchOutcome {
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": message,
        });

        // the url carries the bot token, keep it out of error messages
        let response = match self.client.post(&self.url).json(&payload).send().await {
            Ok(r) => r,
            Err(e) => {
                return DispatchOutcome::Failed(TransportError::Dispatch(e.without_url().to_string()))
            }
        };

        let status = response.status();
        if status.is_success() {
            DispatchOutcome::Delivered
        } else {
            DispatchOutcome::Failed(TransportError::Dispatch(format!(
                "bot api answered {}",
                status
            )))
        }
    }
}
