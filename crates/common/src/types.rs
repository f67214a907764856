use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::propagation::TraceContext;

/// Header key carrying the correlation id.
pub const CORRELATION_HEADER: &str = "uuid";

/// Correlation id used when the header is absent or not a string.
pub const DEFAULT_CORRELATION_ID: &str = "00000000-0000-4000-8000-000000000000";

/// Wire format of inbound payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncoding {
    /// Protojson-compatible text encoding.
    Json,
    /// Protobuf binary encoding.
    Binary,
}

impl FromStr for PayloadEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(PayloadEncoding::Json),
            "binary" | "proto" | "protobuf" => Ok(PayloadEncoding::Binary),
            other => Err(format!("unsupported payload encoding {other:?}")),
        }
    }
}

impl std::fmt::Display for PayloadEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadEncoding::Json => write!(f, "json"),
            PayloadEncoding::Binary => write!(f, "binary"),
        }
    }
}

/// Kind of an outbound message.
///
/// Values outside the known set are kept as `Other` so that an unknown kind
/// decodes successfully and is skipped at dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Text,
    Image,
    Other(i32),
}

impl MessageKind {
    pub fn from_wire(value: i32) -> Self {
        match value {
            0 => MessageKind::Text,
            1 => MessageKind::Image,
            other => MessageKind::Other(other),
        }
    }

    pub fn wire_value(self) -> i32 {
        match self {
            MessageKind::Text => 0,
            MessageKind::Image => 1,
            MessageKind::Other(v) => v,
        }
    }

    /// Canonical enum name, if the kind is known.
    pub fn name(self) -> Option<&'static str> {
        match self {
            MessageKind::Text => Some("TEXT"),
            MessageKind::Image => Some("IMAGE"),
            MessageKind::Other(_) => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "TEXT" => Some(MessageKind::Text),
            "IMAGE" => Some(MessageKind::Image),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::Text => write!(f, "text"),
            MessageKind::Image => write!(f, "image"),
            MessageKind::Other(v) => write!(f, "other({v})"),
        }
    }
}

/// Known parameter names of the `params` map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageParam {
    FileUrl,
    PhotoUrl,
}

impl MessageParam {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageParam::FileUrl => "FILE_URL",
            MessageParam::PhotoUrl => "PHOTO_URL",
        }
    }
}

impl FromStr for MessageParam {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FILE_URL" => Ok(MessageParam::FileUrl),
            "PHOTO_URL" => Ok(MessageParam::PhotoUrl),
            _ => Err(()),
        }
    }
}

/// Typed view of the wire `params` map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageParams {
    values: BTreeMap<MessageParam, String>,
}

impl MessageParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert the wire map, returning the keys that were not recognised.
    pub fn from_wire(raw: HashMap<String, String>) -> (Self, Vec<String>) {
        let mut params = Self::new();
        let mut unknown = Vec::new();
        for (key, value) in raw {
            match key.parse::<MessageParam>() {
                Ok(param) => {
                    params.values.insert(param, value);
                }
                Err(()) => unknown.push(key),
            }
        }
        unknown.sort();
        (params, unknown)
    }

    pub fn to_wire(&self) -> HashMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.clone()))
            .collect()
    }

    pub fn with(mut self, param: MessageParam, value: impl Into<String>) -> Self {
        self.values.insert(param, value.into());
        self
    }

    /// Value of a parameter, empty when absent.
    pub fn get(&self, param: MessageParam) -> &str {
        self.values.get(&param).map(String::as_str).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A decoded outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    /// Recipient chat id
    pub user_id: u64,
    pub text: String,
    pub params: MessageParams,
}

/// Value of a transport header.
///
/// Only `Text` values take part in trace propagation and correlation.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
    Other,
}

impl HeaderValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Text(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::Text(value)
    }
}

/// Transport headers of one delivery.
pub type Headers = BTreeMap<String, HeaderValue>;

/// Pass-through label for cross-system log correlation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Read the correlation id from headers, falling back to the default id.
    pub fn from_headers(headers: &Headers) -> Self {
        headers
            .get(CORRELATION_HEADER)
            .and_then(HeaderValue::as_text)
            .map(|s| Self(s.to_string()))
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the label parses as a UUID. Informational only.
    pub fn is_well_formed(&self) -> bool {
        uuid::Uuid::try_parse(&self.0).is_ok()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self(DEFAULT_CORRELATION_ID.to_string())
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unit of work handed from the consumer to the dispatch pool.
#[derive(Debug, Clone)]
pub struct TracedMessage {
    pub message: Message,
    pub correlation_id: CorrelationId,
    pub trace: TraceContext,
}

/// Result of a queue health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueueStatus {
    Up,
    Down,
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueStatus::Up => write!(f, "UP"),
            QueueStatus::Down => write!(f, "DOWN"),
        }
    }
}

/// Body of the liveness probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppStatus {
    pub status: String,
    pub db_status: String,
    pub amqp_status: QueueStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text_error: Option<String>,
}
