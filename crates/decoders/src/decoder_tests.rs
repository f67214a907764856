//! Table tests for both payload codecs and the `MessageDecoder` selector.
//!
//! Binary fixtures are built with `prost` from `WireMessage` so they match
//! what an upstream protobuf producer puts on the queue.

use std::collections::HashMap;

use prost::Message as _;
use relay_common::types::{
    Message, MessageKind, MessageParam, MessageParams, PayloadEncoding,
};

use crate::binary::{ProtobufDecoder, WireMessage};
use crate::json::JsonDecoder;
use crate::{DecodeError, MessageDecoder, PayloadDecoder, decode, encode};

// ───────────────────────────── helpers ──────────────────────────────

fn text_message(user_id: u64, text: &str) -> Message {
    Message {
        kind: MessageKind::Text,
        user_id,
        text: text.to_string(),
        params: MessageParams::new(),
    }
}

fn image_message() -> Message {
    Message {
        kind: MessageKind::Image,
        user_id: 7,
        text: "*caption*".to_string(),
        params: MessageParams::new()
            .with(MessageParam::FileUrl, "http://a")
            .with(MessageParam::PhotoUrl, "http://b"),
    }
}

// ═══════════════════════════════════════════════════════════════════
//  JSON codec
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_json_text_message() {
    let payload = br#"{"type": "TEXT", "user_id": 42, "text": "hi"}"#;
    let message = JsonDecoder::new().decode(payload).unwrap();
    assert_eq!(message, text_message(42, "hi"));
}

#[test]
fn test_json_image_message_params() {
    let payload = br#"{
        "type": "IMAGE",
        "user_id": 7,
        "text": "*caption*",
        "params": {"FILE_URL": "http://a", "PHOTO_URL": "http://b"}
    }"#;
    let message = JsonDecoder::new().decode(payload).unwrap();
    assert_eq!(message, image_message());
}

#[test]
fn test_json_accepts_protojson_spelling() {
    // protojson writes uint64 as a string and uses lowerCamelCase names
    let payload = br#"{"type": "TEXT", "userId": "18446744073709551615", "text": "max"}"#;
    let message = JsonDecoder::new().decode(payload).unwrap();
    assert_eq!(message.user_id, u64::MAX);
}

#[test]
fn test_json_numeric_enum() {
    let payload = br#"{"type": 1, "user_id": 1}"#;
    assert_eq!(
        JsonDecoder::new().decode(payload).unwrap().kind,
        MessageKind::Image
    );

    let payload = br#"{"type": 5, "user_id": 1}"#;
    assert_eq!(
        JsonDecoder::new().decode(payload).unwrap().kind,
        MessageKind::Other(5)
    );
}

#[test]
fn test_json_missing_fields_take_zero_values() {
    let message = JsonDecoder::new().decode(b"{}").unwrap();
    assert_eq!(message, text_message(0, ""));

    let message = JsonDecoder::new()
        .decode(br#"{"type": null, "text": null, "params": null}"#)
        .unwrap();
    assert_eq!(message, text_message(0, ""));
}

#[test]
fn test_json_unknown_params_are_dropped() {
    let payload = br#"{"type": "IMAGE", "params": {"PHOTO_URL": "http://b", "SIZE": "big"}}"#;
    let message = JsonDecoder::new().decode(payload).unwrap();
    assert_eq!(message.params.get(MessageParam::PhotoUrl), "http://b");
    assert_eq!(message.params.to_wire().len(), 1);
}

#[test]
fn test_json_unknown_enum_name_is_rejected() {
    let err = JsonDecoder::new()
        .decode(br#"{"type": "VIDEO", "user_id": 1}"#)
        .unwrap_err();
    assert!(
        matches!(err, DecodeError::InvalidField { field: "type", .. }),
        "unexpected error: {err}"
    );
}

#[test]
fn test_json_bad_user_id_string_is_rejected() {
    let err = JsonDecoder::new()
        .decode(br#"{"type": "TEXT", "user_id": "forty-two"}"#)
        .unwrap_err();
    assert!(matches!(err, DecodeError::InvalidField { field: "user_id", .. }));
}

#[test]
fn test_json_negative_user_id_is_rejected() {
    assert!(JsonDecoder::new().decode(br#"{"user_id": -1}"#).is_err());
}

#[test]
fn test_json_unknown_field_is_rejected() {
    let err = JsonDecoder::new()
        .decode(br#"{"type": "TEXT", "chat": 1}"#)
        .unwrap_err();
    assert!(matches!(err, DecodeError::Json(_)));
}

#[test]
fn test_json_malformed_bytes() {
    for payload in [&b"not json"[..], b"", b"42", &[0xff, 0xfe, 0x00]] {
        assert!(
            JsonDecoder::new().decode(payload).is_err(),
            "expected failure for {payload:?}"
        );
    }
}

#[test]
fn test_json_encode_uses_canonical_names() {
    let bytes = JsonDecoder::new().encode(&image_message());
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value["type"], "IMAGE");
    assert_eq!(value["user_id"], 7);
    assert_eq!(value["params"]["FILE_URL"], "http://a");
}

// ═══════════════════════════════════════════════════════════════════
//  Protobuf codec
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_binary_text_message() {
    let payload = WireMessage {
        kind: 0,
        user_id: 42,
        text: "hi".to_string(),
        params: HashMap::new(),
    }
    .encode_to_vec();

    let message = ProtobufDecoder::new().decode(&payload).unwrap();
    assert_eq!(message, text_message(42, "hi"));
}

#[test]
fn test_binary_image_message() {
    let payload = WireMessage {
        kind: 1,
        user_id: 7,
        text: "*caption*".to_string(),
        params: HashMap::from([
            ("FILE_URL".to_string(), "http://a".to_string()),
            ("PHOTO_URL".to_string(), "http://b".to_string()),
        ]),
    }
    .encode_to_vec();

    assert_eq!(
        ProtobufDecoder::new().decode(&payload).unwrap(),
        image_message()
    );
}

#[test]
fn test_binary_empty_payload_is_default_message() {
    // proto3: every field at its zero value encodes to nothing
    assert_eq!(
        ProtobufDecoder::new().decode(&[]).unwrap(),
        text_message(0, "")
    );
}

#[test]
fn test_binary_truncated_payload_is_rejected() {
    let mut payload = WireMessage {
        kind: 0,
        user_id: 42,
        text: "hello world".to_string(),
        params: HashMap::new(),
    }
    .encode_to_vec();
    payload.truncate(payload.len() - 3);

    let err = ProtobufDecoder::new().decode(&payload).unwrap_err();
    assert!(matches!(err, DecodeError::Binary(_)));
}

#[test]
fn test_binary_garbage_is_rejected() {
    assert!(ProtobufDecoder::new().decode(&[0xff, 0xff, 0xff]).is_err());
}

// ═══════════════════════════════════════════════════════════════════
//  MessageDecoder selection and round trips
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_round_trip_both_encodings() {
    let messages = [
        text_message(42, "hi"),
        image_message(),
        Message {
            kind: MessageKind::Other(9),
            user_id: u64::MAX,
            text: "ünïcode ✓".to_string(),
            params: MessageParams::new().with(MessageParam::FileUrl, ""),
        },
    ];

    for encoding in [PayloadEncoding::Json, PayloadEncoding::Binary] {
        for message in &messages {
            let bytes = encode(message, encoding);
            let decoded = decode(&bytes, encoding).unwrap();
            assert_eq!(&decoded, message, "round trip failed for {encoding}");
        }
    }
}

#[test]
fn test_encoding_flag_selects_codec() {
    let json = br#"{"type": "TEXT", "user_id": 42, "text": "hi"}"#;
    assert!(MessageDecoder::new(PayloadEncoding::Json).decode(json).is_ok());
    assert!(MessageDecoder::new(PayloadEncoding::Binary).decode(json).is_err());
    assert_eq!(
        MessageDecoder::new(PayloadEncoding::Binary).encoding(),
        PayloadEncoding::Binary
    );
}
