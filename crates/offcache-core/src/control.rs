//! Control channel: out-of-band commands from the controlled application.
//!
//! Wire format is a JSON object with a `type` field:
//!
//! | `type`           | payload | reply          |
//! |------------------|---------|----------------|
//! | `SKIP_WAITING`   | none    | none           |
//! | `GET_CACHE_SIZE` | none    | `{"size": n}`  |
//!
//! Anything else, including non-objects, is ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

/// Where a reply to a control message is delivered.
pub type ReplyPort = oneshot::Sender<Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Stop waiting and take control of open application instances now.
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
    /// Report the number of entries in the current store.
    #[serde(rename = "GET_CACHE_SIZE")]
    GetCacheSize,
}

impl ControlMessage {
    /// Parse an inbound message; unrecognized shapes yield `None`.
    pub fn parse(data: &Value) -> Option<Self> {
        Self::deserialize(data).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeReply {
    pub size: usize,
}

impl SizeReply {
    pub fn to_value(self) -> Value {
        serde_json::json!({ "size": self.size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(
            ControlMessage::parse(&json!({"type": "SKIP_WAITING"})),
            Some(ControlMessage::SkipWaiting)
        );
        assert_eq!(
            ControlMessage::parse(&json!({"type": "GET_CACHE_SIZE"})),
            Some(ControlMessage::GetCacheSize)
        );
    }

    #[test]
    fn test_parse_tolerates_extra_fields() {
        assert_eq!(
            ControlMessage::parse(&json!({"type": "SKIP_WAITING", "reason": "update"})),
            Some(ControlMessage::SkipWaiting)
        );
    }

    #[test]
    fn test_parse_ignores_unknown_shapes() {
        assert_eq!(ControlMessage::parse(&json!({"type": "CLEAR_CACHE"})), None);
        assert_eq!(ControlMessage::parse(&json!({"kind": "SKIP_WAITING"})), None);
        assert_eq!(ControlMessage::parse(&json!("SKIP_WAITING")), None);
        assert_eq!(ControlMessage::parse(&json!(null)), None);
    }

    #[test]
    fn test_size_reply_wire_shape() {
        assert_eq!(SizeReply { size: 4 }.to_value(), json!({"size": 4}));
    }
}
