//! Outbound delivery of relayed messages.
//!
//! The dispatch pool only depends on the narrow [`DeliveryClient`] contract;
//! [`TelegramClient`] implements it against the Telegram Bot API.

pub mod telegram;

use async_trait::async_trait;

use relay_common::propagation::TraceContext;

pub use telegram::{BotCommand, TelegramClient};

/// Audio attachment for [`DeliveryClient::send_audio`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTrack {
    pub title: String,
    pub audio_url: String,
    pub thumbnail_url: String,
    /// Duration in seconds
    pub duration: u32,
}

/// Sends one request per call and reports whether the remote side accepted it.
///
/// Implementations never fail: transport errors and non-success statuses are
/// folded into `false`. `trace` is the context of the message being delivered
/// and is propagated on the outbound request.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn send_text(&self, trace: &TraceContext, recipient: u64, text: &str) -> bool;

    /// Photo with a caption and an "Open link" button pointing at `link_url`.
    async fn send_photo(
        &self,
        trace: &TraceContext,
        recipient: u64,
        caption: &str,
        link_url: &str,
        photo_url: &str,
    ) -> bool;

    async fn send_document(
        &self,
        trace: &TraceContext,
        recipient: u64,
        document_url: &str,
    ) -> bool;

    async fn send_audio(&self, trace: &TraceContext, recipient: u64, track: &AudioTrack) -> bool;

    /// Text message with an "Open link" button pointing at `link_url`.
    async fn send_message_with_button(
        &self,
        trace: &TraceContext,
        recipient: u64,
        text: &str,
        link_url: &str,
    ) -> bool;
}
