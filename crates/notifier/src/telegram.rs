//! Telegram Bot API client.
//!
//! Every method issues exactly one request against
//! `{base_url}/bot{token}/{method}` and returns `true` on a 2xx response.
//! The bot token is part of the URL, so URLs are never logged.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};

use relay_common::config::TelegramConfig;
use relay_common::error::AppError;
use relay_common::propagation::{Propagator, TraceContext};

use crate::{AudioTrack, DeliveryClient};

const PARSE_MODE: &str = "markdown";
const LINK_BUTTON_TEXT: &str = "Open link";

/// Entry of the bot command menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

impl BotCommand {
    pub fn new(command: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
        }
    }
}

/// Stateless Bot API wrapper. Cheap to clone.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    base_url: String,
    propagator: Propagator,
}

impl TelegramClient {
    /// Build a client whose requests time out after `config.timeout()`.
    pub fn new(config: &TelegramConfig, propagator: Propagator) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Delivery(e.to_string()))?;

        Ok(Self {
            http,
            base_url: format!(
                "{}/bot{}/",
                config.base_url.trim_end_matches('/'),
                config.token
            ),
            propagator,
        })
    }

    /// Replace the bot's command menu.
    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> bool {
        self.post(
            &TraceContext::default(),
            "setMyCommands",
            json!({ "commands": commands }),
        )
        .await
    }

    /// Fetch the current webhook configuration and log it.
    pub async fn webhook_info(&self) -> bool {
        let method = "getWebhookInfo";
        match self.http.get(self.url(method)).send().await {
            Ok(response) => {
                let status = response.status();
                match response.text().await {
                    Ok(body) => tracing::info!(method, body = %body, "Webhook info"),
                    Err(e) => {
                        tracing::warn!(method, error = %e.without_url(), "Failed to read webhook info")
                    }
                }
                status.is_success()
            }
            Err(e) => {
                tracing::error!(method, error = %e.without_url(), "Telegram request failed");
                false
            }
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}{}", self.base_url, method)
    }

    async fn post(&self, trace: &TraceContext, method: &str, body: Value) -> bool {
        let mut request = self.http.post(self.url(method)).json(&body);
        for (key, value) in self.propagator.inject(trace) {
            request = request.header(key, value);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                tracing::info!(method, status = status.as_u16(), "Telegram request finished");
                status.is_success()
            }
            Err(e) => {
                tracing::error!(method, error = %e.without_url(), "Telegram request failed");
                false
            }
        }
    }
}

fn link_keyboard(link_url: &str) -> Value {
    json!({
        "inline_keyboard": [[{ "text": LINK_BUTTON_TEXT, "url": link_url }]]
    })
}

#[async_trait]
impl DeliveryClient for TelegramClient {
    async fn send_text(&self, trace: &TraceContext, recipient: u64, text: &str) -> bool {
        self.post(
            trace,
            "sendMessage",
            json!({
                "chat_id": recipient,
                "text": text,
                "parse_mode": PARSE_MODE,
            }),
        )
        .await
    }

    async fn send_photo(
        &self,
        trace: &TraceContext,
        recipient: u64,
        caption: &str,
        link_url: &str,
        photo_url: &str,
    ) -> bool {
        self.post(
            trace,
            "sendPhoto",
            json!({
                "chat_id": recipient,
                "photo": photo_url,
                "caption": caption,
                "parse_mode": PARSE_MODE,
                "reply_markup": link_keyboard(link_url),
            }),
        )
        .await
    }

    async fn send_document(
        &self,
        trace: &TraceContext,
        recipient: u64,
        document_url: &str,
    ) -> bool {
        self.post(
            trace,
            "sendDocument",
            json!({
                "chat_id": recipient,
                "document": document_url,
            }),
        )
        .await
    }

    async fn send_audio(&self, trace: &TraceContext, recipient: u64, track: &AudioTrack) -> bool {
        self.post(
            trace,
            "sendAudio",
            json!({
                "chat_id": recipient,
                "audio": track.audio_url,
                "title": track.title,
                "thumbnail": track.thumbnail_url,
                "duration": track.duration,
            }),
        )
        .await
    }

    async fn send_message_with_button(
        &self,
        trace: &TraceContext,
        recipient: u64,
        text: &str,
        link_url: &str,
    ) -> bool {
        self.post(
            trace,
            "sendMessage",
            json!({
                "chat_id": recipient,
                "text": text,
                "parse_mode": PARSE_MODE,
                "reply_markup": link_keyboard(link_url),
            }),
        )
        .await
    }
}
