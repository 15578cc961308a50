use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, SocketError};

/// Event envelope exchanged with clients in both directions.
///
/// `namespace` and `room` are informational: the core fills them in on
/// outbound messages and ignores them on inbound ones, where routing is fixed
/// by the namespace the connection was accepted into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

impl Message {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            namespace: None,
            room: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }
}

/// One transport-level message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
}

impl Frame {
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Serialize/deserialize capability injected into a server.
pub trait MessageCodec: Send + Sync + 'static {
    fn encode(&self, message: &Message) -> Result<Frame>;
    fn decode(&self, frame: Frame) -> Result<Message>;
}

/// JSON text frames, the default wire format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn encode(&self, message: &Message) -> Result<Frame> {
        serde_json::to_string(message)
            .map(Frame::Text)
            .map_err(SocketError::encode)
    }

    fn decode(&self, frame: Frame) -> Result<Message> {
        let message = match frame {
            Frame::Text(text) => serde_json::from_str(&text)?,
            Frame::Binary(bytes) => serde_json::from_slice(&bytes)?,
        };
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encode_then_decode_keeps_all_fields() {
        let codec = JsonCodec;
        let msg = Message::new("test-event", json!("test-data"))
            .with_namespace("/test")
            .with_room("room1");

        let frame = codec.encode(&msg).unwrap();
        assert_eq!(codec.decode(frame).unwrap(), msg);
    }

    #[test]
    fn optional_fields_are_omitted() {
        let frame = JsonCodec.encode(&Message::new("pong", Value::Null)).unwrap();
        assert_eq!(frame, Frame::Text(r#"{"event":"pong","data":null}"#.into()));
    }

    #[test]
    fn missing_data_decodes_as_null() {
        let msg = JsonCodec
            .decode(Frame::Text(r#"{"event":"ping"}"#.into()))
            .unwrap();
        assert_eq!(msg.event, "ping");
        assert_eq!(msg.data, Value::Null);
        assert_eq!(msg.namespace, None);
    }

    #[test]
    fn binary_frames_are_accepted() {
        let msg = JsonCodec
            .decode(Frame::Binary(Bytes::from_static(br#"{"event":"x","data":42}"#)))
            .unwrap();
        assert_eq!(msg.data, json!(42));
    }

    #[test]
    fn malformed_frames_fail_to_decode() {
        let err = JsonCodec.decode(Frame::Text("not json".into())).unwrap_err();
        assert!(matches!(err, SocketError::Decode(_)));

        let err = JsonCodec.decode(Frame::Text(r#"{"data":1}"#.into())).unwrap_err();
        assert!(matches!(err, SocketError::Decode(_)));
    }
}
