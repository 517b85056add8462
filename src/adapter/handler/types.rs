use crate::error::{Error, Result};
use crate::protocol::messages::PusherMessage;
use serde::Deserialize;

/// Payload of a `pusher:subscribe` / `pusher:unsubscribe` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionRequest {
    pub channel: String,
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub channel_data: Option<String>,
}

impl SubscriptionRequest {
    pub fn from_message(message: &PusherMessage) -> Result<Self> {
        let data = message
            .data
            .as_ref()
            .ok_or_else(|| Error::InvalidMessageFormat("subscription frame has no data".into()))?;

        let value = data.as_value().ok_or_else(|| {
            Error::InvalidMessageFormat("subscription data is not valid JSON".into())
        })?;

        serde_json::from_value(value)
            .map_err(|e| Error::InvalidMessageFormat(format!("bad subscription payload: {e}")))
    }
}
