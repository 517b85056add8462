use serde::{Deserialize, Serialize};

/// A tenant application. Loaded from configuration at startup and immutable
/// for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct App {
    pub id: String,

    /// Publishable key clients use on the WebSocket endpoint.
    pub key: String,

    /// Shared secret signing both channel subscriptions and HTTP API
    /// requests.
    pub secret: String,

    pub enabled: bool,

    /// Maximum concurrent connections; zero or negative means unlimited.
    pub max_connections: i64,

    /// Whether `client-*` events may be rebroadcast for this app.
    pub enable_client_messages: bool,

    /// Cap on a published event's serialized `data`, in KiB.
    pub max_event_payload_in_kb: Option<u32>,
}

impl Default for App {
    fn default() -> Self {
        Self {
            id: String::new(),
            key: String::new(),
            secret: String::new(),
            enabled: true,
            max_connections: -1,
            enable_client_messages: false,
            max_event_payload_in_kb: None,
        }
    }
}

impl App {
    /// Byte budget for a single published event's `data`, if capped.
    pub fn max_event_payload_bytes(&self) -> Option<usize> {
        self.max_event_payload_in_kb.map(|kb| kb as usize * 1024)
    }
}
