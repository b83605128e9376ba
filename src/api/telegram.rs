use super::Notifier;
use crate::config::TelegramSettings;
use crate::error::ApiError;
use crate::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Sends operator notifications through the Telegram Bot API
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: TELEGRAM_API_BASE.to_string(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Build the notifier if telegram is enabled, `None` otherwise
    pub fn from_settings(settings: &TelegramSettings, timeout: Duration) -> Result<Option<Self>> {
        if !settings.enabled {
            return Ok(None);
        }

        let (bot_token, chat_id) = settings
            .credentials()
            .ok_or("telegram is enabled but bot_token/chat_id are missing")?;

        Ok(Some(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        }))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Send a plain text message, reporting failures to the caller
    pub async fn send_message(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);

        let response: TelegramResponse = self
            .client
            .post(&url)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text,
            })
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(ApiError::Telegram(
                response
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            )
            .into());
        }

        tracing::debug!(length = text.len(), "Sent Telegram notification");
        Ok(())
    }
}

impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) {
        if let Err(e) = self.send_message(text).await {
            tracing::warn!("Failed to send Telegram notification: {}", e);
        }
    }
}
