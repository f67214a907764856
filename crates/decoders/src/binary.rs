use std::collections::HashMap;

use prost::Message as _;
use relay_common::types::Message;

use crate::{DecodeError, PayloadDecoder, into_message};

/// Protobuf layout of a send request.
///
/// ```text
/// message SendMessage {
///   MessageType type = 1;
///   uint64 user_id = 2;
///   string text = 3;
///   map<string, string> params = 4;
/// }
/// ```
#[derive(Clone, PartialEq, prost::Message)]
pub struct WireMessage {
    #[prost(int32, tag = "1")]
    pub kind: i32,
    #[prost(uint64, tag = "2")]
    pub user_id: u64,
    #[prost(string, tag = "3")]
    pub text: String,
    #[prost(map = "string, string", tag = "4")]
    pub params: HashMap<String, String>,
}

/// Protobuf binary codec.
pub struct ProtobufDecoder;

impl ProtobufDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProtobufDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadDecoder for ProtobufDecoder {
    fn decode(&self, payload: &[u8]) -> Result<Message, DecodeError> {
        let wire = WireMessage::decode(payload)?;
        Ok(into_message(wire.kind, wire.user_id, wire.text, wire.params))
    }

    fn encode(&self, message: &Message) -> Vec<u8> {
        WireMessage {
            kind: message.kind.wire_value(),
            user_id: message.user_id,
            text: message.text.clone(),
            params: message.params.to_wire(),
        }
        .encode_to_vec()
    }

    fn name(&self) -> &'static str {
        "protobuf"
    }
}
