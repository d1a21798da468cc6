use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::BotConfig;
use crate::notifier::Notifier;
use crate::utils::error::{AppError, Result};

/// Extra time on top of the long-poll timeout before a request is abandoned.
const LONG_POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Chat {
    pub id: i64,
}

/// Minimal Telegram Bot API client.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    api_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(config: &BotConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    /// Sends a Markdown message with link previews disabled.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });

        let delivery_error = |message: String| AppError::Delivery {
            user_id: chat_id,
            message,
        };

        let response = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| delivery_error(e.without_url().to_string()))?;

        let status = response.status();
        let reply: ApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|_| delivery_error(format!("unexpected response with status {}", status)))?;

        if !reply.ok {
            return Err(delivery_error(
                reply
                    .description
                    .unwrap_or_else(|| format!("rejected with status {}", status)),
            ));
        }

        tracing::debug!(chat_id, "Message delivered");
        Ok(())
    }

    /// Long-polls for updates with an id of at least `offset`.
    pub async fn get_updates(&self, offset: i64, timeout: u64) -> Result<Vec<Update>> {
        let body = json!({
            "offset": offset,
            "timeout": timeout,
            "allowed_updates": ["message"],
        });

        let reply: ApiResponse<Vec<Update>> = self
            .http
            .post(self.method_url("getUpdates"))
            .timeout(Duration::from_secs(timeout) + LONG_POLL_GRACE)
            .json(&body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?
            .json()
            .await
            .map_err(reqwest::Error::without_url)?;

        if !reply.ok {
            return Err(AppError::BotApi {
                method: "getUpdates".to_string(),
                description: reply.description.unwrap_or_default(),
            });
        }

        Ok(reply.result.unwrap_or_default())
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send(&self, user_id: i64, text: &str) -> Result<()> {
        // Private chats share the user's id.
        self.send_message(user_id, text).await
    }
}
