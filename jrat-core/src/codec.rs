//! Codec for outbound and inbound JSON-RPC messages
//!
//! Outbound, a flush of pending calls becomes one wire payload: a single
//! request object when one call is flushed, an array otherwise. Inbound,
//! transports hand over already-parsed JSON (`serde_json::Value`), either one
//! message object or an array of them; [`decode_value`] classifies each item
//! and normalizes responses.
//!
//! # Examples
//!
//! ```rust
//! use jrat_core::{codec, Id, JsonRpcRequest};
//!
//! let one = vec![JsonRpcRequest::new("ping", None, Id::Number(1))];
//! assert!(codec::encode_requests(&one).unwrap().starts_with('{'));
//!
//! let two = vec![
//!     JsonRpcRequest::new("a", None, Id::Number(1)),
//!     JsonRpcRequest::new("b", None, Id::Number(2)),
//! ];
//! assert!(codec::encode_requests(&two).unwrap().starts_with('['));
//! ```

use crate::error::{Error, Result};
use crate::types::{JsonRpcMessage, JsonRpcRequest};
use serde::Serialize;

/// Encode any serializable message to a JSON string
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| Error::Serialization(e.to_string()))
}

/// Encode the requests of one flush into a single wire payload
///
/// Order is preserved. An empty slice is rejected: there is nothing to send.
pub fn encode_requests(requests: &[JsonRpcRequest]) -> Result<String> {
    match requests {
        [] => Err(Error::Internal("Cannot encode an empty flush".to_string())),
        [single] => encode(single),
        many => encode(&many),
    }
}

/// Parse a JSON text payload (for text-based transports)
pub fn parse(data: &str) -> Result<serde_json::Value> {
    serde_json::from_str(data).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode one inbound value into messages
///
/// Objects yield one entry, arrays one entry per element (in order). Each
/// entry is decoded independently so one malformed element does not hide the
/// others. Responses are normalized (error wins over result).
pub fn decode_value(value: serde_json::Value) -> Vec<Result<JsonRpcMessage>> {
    match value {
        serde_json::Value::Array(items) => items.into_iter().map(decode_message).collect(),
        other => vec![decode_message(other)],
    }
}

fn decode_message(value: serde_json::Value) -> Result<JsonRpcMessage> {
    if !value.is_object() {
        return Err(Error::Serialization(format!(
            "Expected a JSON-RPC message object, got {}",
            value
        )));
    }

    let message: JsonRpcMessage =
        serde_json::from_value(value).map_err(|e| Error::Serialization(e.to_string()))?;

    Ok(match message {
        JsonRpcMessage::Response(response) => JsonRpcMessage::Response(response.normalize()),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Id;
    use serde_json::json;

    #[test]
    fn test_encode_single_request_as_object() {
        let payload =
            encode_requests(&[JsonRpcRequest::new("ping", Some(json!([])), Id::Number(1))])
                .unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["method"], "ping");
        assert_eq!(value["id"], 1);
    }

    #[test]
    fn test_encode_preserves_order() {
        let requests: Vec<JsonRpcRequest> = (1..=5)
            .map(|i| JsonRpcRequest::new(format!("m{}", i), None, Id::Number(i)))
            .collect();
        let value: serde_json::Value =
            serde_json::from_str(&encode_requests(&requests).unwrap()).unwrap();

        let ids: Vec<i64> = value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_encode_empty_flush_fails() {
        assert!(encode_requests(&[]).is_err());
    }

    #[test]
    fn test_decode_single_response() {
        let decoded = decode_value(json!({"jsonrpc": "2.0", "id": 1, "result": 42}));
        assert_eq!(decoded.len(), 1);
        match decoded.into_iter().next().unwrap().unwrap() {
            JsonRpcMessage::Response(resp) => assert_eq!(resp.result, Some(json!(42))),
            other => panic!("Expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_normalizes_conflicting_response() {
        let decoded = decode_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": 42,
            "error": {"code": 9, "message": "nine"}
        }));
        match decoded.into_iter().next().unwrap().unwrap() {
            JsonRpcMessage::Response(resp) => {
                assert!(resp.result.is_none());
                assert_eq!(resp.error.unwrap().code, 9);
            }
            other => panic!("Expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_mixed_array_keeps_good_items() {
        let decoded = decode_value(json!([
            {"jsonrpc": "2.0", "id": 1, "result": "ok"},
            "garbage",
            {"jsonrpc": "2.0", "method": "tick", "params": [1]}
        ]));

        assert_eq!(decoded.len(), 3);
        assert!(decoded[0].as_ref().unwrap().is_response());
        assert!(decoded[1].is_err());
        assert!(decoded[2].as_ref().unwrap().is_notification());
    }

    #[test]
    fn test_parse_invalid_text() {
        assert!(parse("{not json").is_err());
        assert_eq!(parse("[1,2]").unwrap(), json!([1, 2]));
    }
}
