use crate::app::config::App;
use crate::channel::PresenceMemberInfo;
use crate::error::{Error, Result};
use crate::protocol::messages::PusherMessage;
use axum::extract::ws::Utf8Bytes;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Unique connection id, `socket_id` on the wire. Format is
/// `"<int in [0,1e9)>.<int in [0,1e14)>"`; the Namespace's idempotent
/// insertion guards the (vanishingly unlikely) collision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SocketId(pub String);

impl SocketId {
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        Self(format!(
            "{}.{}",
            rng.random_range(0..1_000_000_000u64),
            rng.random_range(0..100_000_000_000_000u64)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A frame queued for the write pump. Serialized text travels as a
/// refcounted buffer so a broadcast clones cheaply per target.
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    Message(Utf8Bytes),
    Close { code: u16, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Active,
    Closing,
}

/// Mutable per-connection state. Only the connection's own tasks (read pump
/// and close sequencer) and roster queries touch this, each briefly.
#[derive(Debug)]
pub struct ConnectionState {
    pub app: App,
    pub subscribed_channels: HashSet<String>,
    pub presence: HashMap<String, PresenceMemberInfo>,
    pub user_id: Option<String>,
    pub status: ConnectionStatus,
}

impl ConnectionState {
    fn new(app: App) -> Self {
        Self {
            app,
            subscribed_channels: HashSet::new(),
            presence: HashMap::new(),
            user_id: None,
            status: ConnectionStatus::Active,
        }
    }
}

/// Clonable handle to one live connection: the bounded send queue plus the
/// shared state. The Namespace stores these; the write pump owns the actual
/// socket sink and drains the queue.
#[derive(Clone)]
pub struct WebSocketRef {
    pub socket_id: SocketId,
    sender: mpsc::Sender<OutboundFrame>,
    pub state: Arc<Mutex<ConnectionState>>,
}

impl WebSocketRef {
    pub fn new(socket_id: SocketId, app: App, sender: mpsc::Sender<OutboundFrame>) -> Self {
        Self {
            socket_id,
            sender,
            state: Arc::new(Mutex::new(ConnectionState::new(app))),
        }
    }

    /// Serializes and enqueues a frame for this connection.
    pub fn send_message(&self, message: &PusherMessage) -> Result<()> {
        let payload = serde_json::to_string(message)?;
        self.send_broadcast(Utf8Bytes::from(payload))
    }

    /// Enqueues an already-serialized frame. Never blocks: a full queue
    /// drops the frame for this (slow) consumer, a closed queue means the
    /// connection is gone.
    pub fn send_broadcast(&self, payload: Utf8Bytes) -> Result<()> {
        self.sender
            .try_send(OutboundFrame::Message(payload))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    Error::Connection(format!("send queue full for {}", self.socket_id))
                }
                mpsc::error::TrySendError::Closed(_) => {
                    Error::ConnectionClosed(self.socket_id.to_string())
                }
            })
    }

    /// Requests a close frame with the given Pusher code; the write pump
    /// exits after sending it and the read pump then runs teardown.
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.sender.try_send(OutboundFrame::Close {
            code,
            reason: reason.to_string(),
        });
    }

    /// One-shot close guard: the first caller flips the status and gets
    /// `true`; later entrants back off.
    pub async fn begin_close(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.status == ConnectionStatus::Closing {
            return false;
        }
        state.status = ConnectionStatus::Closing;
        true
    }
}

impl fmt::Debug for WebSocketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketRef")
            .field("socket_id", &self.socket_id)
            .finish_non_exhaustive()
    }
}
