mod authentication;
mod client_event;
mod subscription;
pub mod types;

use crate::adapter::ConnectionManager;
use crate::app::config::App;
use crate::app::manager::AppManager;
use crate::protocol::constants::{
    CLIENT_EVENT_PREFIX, PING_PERIOD, PONG_WAIT, SEND_QUEUE_SIZE, WRITE_WAIT, close_codes,
};
use crate::protocol::messages::PusherMessage;
use crate::websocket::{OutboundFrame, SocketId, WebSocketRef};
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream, StreamExt};
use futures_util::SinkExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{MissedTickBehavior, timeout};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Drives every WebSocket session for the server: admission, the read and
/// write pumps, inbound dispatch, and the close sequencer.
pub struct ConnectionHandler {
    pub app_manager: Arc<dyn AppManager + Send + Sync>,
    pub connection_manager: Arc<Mutex<dyn ConnectionManager + Send + Sync>>,
    pub server_id: String,
}

impl ConnectionHandler {
    pub fn new(
        app_manager: Arc<dyn AppManager + Send + Sync>,
        connection_manager: Arc<Mutex<dyn ConnectionManager + Send + Sync>>,
    ) -> Self {
        Self {
            app_manager,
            connection_manager,
            server_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Runs one upgraded WebSocket to completion. The current task becomes
    /// the read pump; the write pump runs alongside it and drains the
    /// connection's send queue until that queue closes or a close frame
    /// goes out.
    pub async fn handle_socket(&self, socket: WebSocket, app_key: String) {
        let (sink, stream) = socket.split();
        let (sender, receiver) = mpsc::channel::<OutboundFrame>(SEND_QUEUE_SIZE);
        let write_task = tokio::spawn(write_pump(sink, receiver));

        let app = match self.admit(&app_key, &sender).await {
            Some(app) => app,
            None => {
                drop(sender);
                let _ = write_task.await;
                return;
            }
        };

        let socket_id = SocketId::generate();
        let ws = WebSocketRef::new(socket_id.clone(), app.clone(), sender);
        {
            let mut conn_mgr = self.connection_manager.lock().await;
            if let Err(e) = conn_mgr.add_socket(socket_id.clone(), ws.clone(), &app.id).await {
                warn!("failed to register connection {}: {}", socket_id, e);
                return;
            }
        }

        info!("connection {} established for app {}", socket_id, app.id);
        let established = PusherMessage::connection_established(socket_id.to_string());
        if ws.send_message(&established).is_err() {
            self.cleanup_connection(&app.id, &socket_id).await;
            drop(ws);
            let _ = write_task.await;
            return;
        }

        self.read_pump(stream, &app, &socket_id, &ws).await;

        self.cleanup_connection(&app.id, &socket_id).await;
        // the last live sender; dropping it closes the queue and lets the
        // write pump finish
        drop(ws);
        let _ = write_task.await;
    }

    /// Validates the app key and connection quota. On refusal, sends the
    /// matching `pusher:error` and a close frame through the queue and
    /// returns `None`.
    async fn admit(&self, app_key: &str, sender: &mpsc::Sender<OutboundFrame>) -> Option<App> {
        let app = match self.app_manager.find_by_key(app_key).await {
            Ok(Some(app)) => app,
            Ok(None) => {
                refuse(
                    sender,
                    close_codes::APPLICATION_DOES_NOT_EXIST,
                    "Application does not exist",
                );
                return None;
            }
            Err(e) => {
                warn!("app lookup failed for key {}: {}", app_key, e);
                refuse(
                    sender,
                    close_codes::GENERIC_RECONNECT_IMMEDIATELY,
                    "Internal server error",
                );
                return None;
            }
        };

        if !app.enabled {
            refuse(
                sender,
                close_codes::APPLICATION_DISABLED,
                "Application is disabled",
            );
            return None;
        }

        if app.max_connections > 0 {
            let connected = {
                let conn_mgr = self.connection_manager.lock().await;
                conn_mgr.get_sockets_count(&app.id).await
            };
            if connected as i64 >= app.max_connections {
                refuse(
                    sender,
                    close_codes::OVER_CONNECTION_QUOTA,
                    "Application is over its connection quota",
                );
                return None;
            }
        }

        Some(app)
    }

    /// Reads frames until error, peer close, or read-deadline expiry. Any
    /// inbound frame, pongs included, re-arms the deadline.
    async fn read_pump(
        &self,
        mut stream: SplitStream<WebSocket>,
        app: &App,
        socket_id: &SocketId,
        ws: &WebSocketRef,
    ) {
        loop {
            match timeout(PONG_WAIT, stream.next()).await {
                Err(_) => {
                    warn!("no frame from {} within pong deadline, closing", socket_id);
                    ws.close(
                        close_codes::PONG_NOT_RECEIVED,
                        "Pong reply not received in time",
                    );
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    debug!("read error on {}: {}", socket_id, e);
                    break;
                }
                Ok(Some(Ok(Message::Text(text)))) => match serde_json::from_str(&text) {
                    Ok(message) => {
                        if let Err(e) = self.handle_message(app, socket_id, message).await {
                            warn!("error handling frame from {}: {}", socket_id, e);
                        }
                    }
                    Err(e) => {
                        debug!("ignoring malformed frame from {}: {}", socket_id, e);
                    }
                },
                Ok(Some(Ok(Message::Close(_)))) => break,
                // pings, pongs, and binary frames only feed the deadline
                Ok(Some(Ok(_))) => {}
            }
        }
    }

    /// Dispatches one parsed inbound frame.
    pub async fn handle_message(
        &self,
        app: &App,
        socket_id: &SocketId,
        message: PusherMessage,
    ) -> Result<()> {
        let event = message.event.clone().unwrap_or_default();
        match event.as_str() {
            "pusher:ping" => self.handle_ping(app, socket_id).await,
            "pusher:subscribe" => self.handle_subscribe(app, socket_id, &message).await,
            "pusher:unsubscribe" => self.handle_unsubscribe(app, socket_id, &message).await,
            event if event.starts_with(CLIENT_EVENT_PREFIX) => {
                self.handle_client_event(app, socket_id, &message).await
            }
            other => {
                debug!("ignoring unknown event {:?} from {}", other, socket_id);
                Ok(())
            }
        }
    }

    async fn handle_ping(&self, app: &App, socket_id: &SocketId) -> Result<()> {
        let mut conn_mgr = self.connection_manager.lock().await;
        conn_mgr
            .send_message(&app.id, socket_id, PusherMessage::pong())
            .await
    }

    /// The close sequencer. Exactly-once per connection: unsubscribes from
    /// every channel through the channel-type path (so presence departures
    /// broadcast member_removed), drops the user association, and removes
    /// the connection from its Namespace. The Namespace releasing its
    /// handle closes the send queue, which stops the write pump.
    pub async fn cleanup_connection(&self, app_id: &str, socket_id: &SocketId) {
        let ws = {
            let mut conn_mgr = self.connection_manager.lock().await;
            conn_mgr.get_connection(socket_id, app_id).await
        };
        let Some(ws) = ws else { return };

        if !ws.begin_close().await {
            return;
        }

        let (channels, user_id) = {
            let state = ws.state.lock().await;
            (
                state.subscribed_channels.iter().cloned().collect::<Vec<_>>(),
                state.user_id.clone(),
            )
        };

        for channel in channels {
            if let Err(e) = self.unsubscribe_from_channel(app_id, socket_id, &channel).await {
                warn!(
                    "error unsubscribing {} from {} during teardown: {}",
                    socket_id, channel, e
                );
            }
        }

        let mut conn_mgr = self.connection_manager.lock().await;
        if let Some(user_id) = user_id {
            let _ = conn_mgr.remove_user(app_id, &user_id, socket_id).await;
        }
        let _ = conn_mgr.remove_connection(socket_id, app_id).await;
        debug!("connection {} removed from app {}", socket_id, app_id);
    }

    pub async fn terminate_user_connections(&self, app_id: &str, user_id: &str) -> Result<()> {
        let mut conn_mgr = self.connection_manager.lock().await;
        conn_mgr.terminate_user_connections(app_id, user_id).await
    }

    /// Closes every session on the server and waits for their read pumps
    /// to drain the registries. Callers bound the wait with a timeout.
    pub async fn close_all_connections(&self, code: u16, reason: &str) {
        let namespaces = {
            let mut conn_mgr = self.connection_manager.lock().await;
            conn_mgr.get_namespaces().await
        };

        for namespace in &namespaces {
            for entry in namespace.sockets.iter() {
                entry.value().close(code, reason);
            }
        }

        loop {
            let remaining: usize = namespaces.iter().map(|ns| ns.sockets_count()).sum();
            if remaining == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Enqueues a `pusher:error` and a close frame for a connection refused
/// before registration.
fn refuse(sender: &mpsc::Sender<OutboundFrame>, code: u16, message: &str) {
    let error = PusherMessage::error(code, message.to_string(), None);
    if let Ok(payload) = serde_json::to_string(&error) {
        let _ = sender.try_send(OutboundFrame::Message(Utf8Bytes::from(payload)));
    }
    let _ = sender.try_send(OutboundFrame::Close {
        code,
        reason: message.to_string(),
    });
}

/// The write pump: sole owner of the sink. Serializes the connection's
/// outbound stream, pings on the heartbeat ticker, and exits on queue
/// closure, an explicit close frame, or a write failure.
async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut receiver: mpsc::Receiver<OutboundFrame>,
) {
    let mut ping_timer = tokio::time::interval(PING_PERIOD);
    ping_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // an interval's first tick is immediate; swallow it
    ping_timer.tick().await;

    loop {
        tokio::select! {
            frame = receiver.recv() => match frame {
                Some(OutboundFrame::Message(payload)) => {
                    match timeout(WRITE_WAIT, sink.send(Message::Text(payload))).await {
                        Ok(Ok(())) => {}
                        _ => break,
                    }
                }
                Some(OutboundFrame::Close { code, reason }) => {
                    let frame = CloseFrame {
                        code,
                        reason: Utf8Bytes::from(reason),
                    };
                    let _ = timeout(WRITE_WAIT, sink.send(Message::Close(Some(frame)))).await;
                    break;
                }
                None => {
                    let _ = timeout(WRITE_WAIT, sink.send(Message::Close(None))).await;
                    break;
                }
            },
            _ = ping_timer.tick() => {
                match timeout(WRITE_WAIT, sink.send(Message::Ping(Bytes::new()))).await {
                    Ok(Ok(())) => {}
                    _ => break,
                }
            }
        }
    }
}
