pub mod binary;
pub mod json;

#[cfg(test)]
mod decoder_tests;

use std::collections::HashMap;

use relay_common::types::{Message, MessageKind, MessageParams, PayloadEncoding};
use thiserror::Error;

/// Errors produced while decoding a payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid binary payload: {0}")]
    Binary(#[from] prost::DecodeError),

    #[error("invalid value for field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Trait that all payload codecs must implement.
pub trait PayloadDecoder: Send + Sync {
    /// Parse a raw payload into a typed message.
    fn decode(&self, payload: &[u8]) -> Result<Message, DecodeError>;

    /// Serialize a message into this codec's wire format.
    fn encode(&self, message: &Message) -> Vec<u8>;

    /// Human-readable name for this codec (e.g., "protojson").
    fn name(&self) -> &'static str;
}

/// Selects the codec for the configured payload encoding.
pub struct MessageDecoder {
    encoding: PayloadEncoding,
    codec: Box<dyn PayloadDecoder>,
}

impl MessageDecoder {
    pub fn new(encoding: PayloadEncoding) -> Self {
        let codec: Box<dyn PayloadDecoder> = match encoding {
            PayloadEncoding::Json => Box::new(json::JsonDecoder::new()),
            PayloadEncoding::Binary => Box::new(binary::ProtobufDecoder::new()),
        };
        Self { encoding, codec }
    }

    pub fn encoding(&self) -> PayloadEncoding {
        self.encoding
    }

    pub fn decode(&self, payload: &[u8]) -> Result<Message, DecodeError> {
        let message = self.codec.decode(payload)?;
        tracing::trace!(
            codec = self.codec.name(),
            kind = %message.kind,
            user_id = message.user_id,
            "Decoded message"
        );
        Ok(message)
    }

    pub fn encode(&self, message: &Message) -> Vec<u8> {
        self.codec.encode(message)
    }
}

/// Decode a payload with the codec selected by `encoding`.
pub fn decode(payload: &[u8], encoding: PayloadEncoding) -> Result<Message, DecodeError> {
    MessageDecoder::new(encoding).decode(payload)
}

/// Encode a message with the codec selected by `encoding`.
pub fn encode(message: &Message, encoding: PayloadEncoding) -> Vec<u8> {
    MessageDecoder::new(encoding).encode(message)
}

/// Build the domain message from wire fields, dropping unknown parameter keys.
pub(crate) fn into_message(
    kind: i32,
    user_id: u64,
    text: String,
    params: HashMap<String, String>,
) -> Message {
    let (params, unknown) = MessageParams::from_wire(params);
    if !unknown.is_empty() {
        tracing::debug!(?unknown, "Ignoring unknown message parameters");
    }
    Message {
        kind: MessageKind::from_wire(kind),
        user_id,
        text,
        params,
    }
}
