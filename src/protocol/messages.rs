use crate::protocol::constants::ACTIVITY_TIMEOUT;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;

/// A frame on the Pusher wire, inbound or outbound. Every field is optional
/// because the protocol's frames share one envelope: `pusher:pong` has no
/// channel, API-triggered events have a `name`, client frames have no
/// `user_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PusherMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<MessageData>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Payload of a frame. Pusher transports most internal payloads as
/// JSON-encoded strings, but clients may send plain objects; both shapes
/// round-trip here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageData {
    String(String),
    Json(Value),
}

impl MessageData {
    /// The payload as a JSON value, parsing string payloads on the way.
    pub fn as_value(&self) -> Option<Value> {
        match self {
            MessageData::Json(value) => Some(value.clone()),
            MessageData::String(raw) => serde_json::from_str(raw).ok(),
        }
    }

}

/// Roster snapshot embedded in a presence channel's subscription reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceData {
    pub ids: Vec<String>,
    pub hash: HashMap<String, Option<Value>>,
    pub count: usize,
}

impl PusherMessage {
    pub fn connection_established(socket_id: String) -> Self {
        let data = json!({
            "socket_id": socket_id,
            "activity_timeout": ACTIVITY_TIMEOUT,
        });

        Self {
            event: Some("pusher:connection_established".to_string()),
            data: Some(MessageData::String(data.to_string())),
            ..Default::default()
        }
    }

    pub fn pong() -> Self {
        Self {
            event: Some("pusher:pong".to_string()),
            data: Some(MessageData::String("{}".to_string())),
            ..Default::default()
        }
    }

    pub fn error(code: u16, message: String, channel: Option<String>) -> Self {
        Self {
            event: Some("pusher:error".to_string()),
            channel,
            data: Some(MessageData::Json(json!({
                "code": code,
                "message": message,
            }))),
            ..Default::default()
        }
    }

    pub fn subscription_error(channel: String, code: u16, message: String) -> Self {
        Self {
            event: Some("pusher:subscription_error".to_string()),
            channel: Some(channel),
            data: Some(MessageData::Json(json!({
                "code": code,
                "message": message,
            }))),
            ..Default::default()
        }
    }

    /// Subscription reply. Public and private channels carry an empty
    /// object; presence channels embed the current roster.
    pub fn subscription_succeeded(channel: String, presence: Option<PresenceData>) -> Self {
        let data = match presence {
            Some(presence) => json!({ "presence": presence }).to_string(),
            None => "{}".to_string(),
        };

        Self {
            event: Some("pusher_internal:subscription_succeeded".to_string()),
            channel: Some(channel),
            data: Some(MessageData::String(data)),
            ..Default::default()
        }
    }

    pub fn member_added(channel: String, user_id: String, user_info: Option<Value>) -> Self {
        let data = json!({
            "user_id": user_id,
            "user_info": user_info.unwrap_or_else(|| json!({})),
        });

        Self {
            event: Some("pusher_internal:member_added".to_string()),
            channel: Some(channel),
            data: Some(MessageData::String(data.to_string())),
            ..Default::default()
        }
    }

    pub fn member_removed(channel: String, user_id: String) -> Self {
        let data = json!({ "user_id": user_id });

        Self {
            event: Some("pusher_internal:member_removed".to_string()),
            channel: Some(channel),
            data: Some(MessageData::String(data.to_string())),
            ..Default::default()
        }
    }

    /// A server-to-client broadcast event. String payloads pass through as
    /// published; structured payloads are JSON-encoded onto the wire.
    pub fn channel_event(event: &str, channel: &str, data: Value) -> Self {
        let data = match data {
            Value::String(raw) => raw,
            other => other.to_string(),
        };

        Self {
            event: Some(event.to_string()),
            channel: Some(channel.to_string()),
            data: Some(MessageData::String(data)),
            ..Default::default()
        }
    }
}
