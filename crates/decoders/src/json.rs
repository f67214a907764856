use std::collections::HashMap;

use relay_common::types::{Message, MessageKind};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::{DecodeError, PayloadDecoder, into_message};

/// Enum fields may arrive as their name or their number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EnumField {
    Number(i32),
    Name(String),
}

/// 64-bit integers may arrive as a number or a decimal string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Uint64Field {
    Number(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonMessage {
    #[serde(rename = "type", default)]
    kind: Option<EnumField>,
    #[serde(alias = "userId", default)]
    user_id: Option<Uint64Field>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    params: Option<HashMap<String, String>>,
}

/// Protojson-compatible text codec.
///
/// Accepts both the proto field names and their lowerCamelCase forms,
/// and treats missing or `null` fields as their zero value.
pub struct JsonDecoder;

impl JsonDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadDecoder for JsonDecoder {
    fn decode(&self, payload: &[u8]) -> Result<Message, DecodeError> {
        let raw: JsonMessage = serde_json::from_slice(payload)?;

        let kind = match raw.kind {
            None => 0,
            Some(EnumField::Number(n)) => n,
            Some(EnumField::Name(name)) => MessageKind::from_name(&name)
                .map(MessageKind::wire_value)
                .ok_or_else(|| DecodeError::InvalidField {
                    field: "type",
                    reason: format!("unknown enum value {name:?}"),
                })?,
        };

        let user_id = match raw.user_id {
            None => 0,
            Some(Uint64Field::Number(n)) => n,
            Some(Uint64Field::Text(s)) => s.parse().map_err(|_| DecodeError::InvalidField {
                field: "user_id",
                reason: format!("{s:?} is not an unsigned integer"),
            })?,
        };

        Ok(into_message(
            kind,
            user_id,
            raw.text.unwrap_or_default(),
            raw.params.unwrap_or_default(),
        ))
    }

    fn encode(&self, message: &Message) -> Vec<u8> {
        let kind = match message.kind.name() {
            Some(name) => json!(name),
            None => json!(message.kind.wire_value()),
        };
        let params: Map<String, Value> = message
            .params
            .to_wire()
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();

        json!({
            "type": kind,
            "user_id": message.user_id,
            "text": message.text,
            "params": params,
        })
        .to_string()
        .into_bytes()
    }

    fn name(&self) -> &'static str {
        "protojson"
    }
}
