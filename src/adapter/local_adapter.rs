use crate::adapter::ConnectionManager;
use crate::channel::PresenceMemberInfo;
use crate::error::{Error, Result};
use crate::namespace::Namespace;
use crate::protocol::messages::PusherMessage;
use crate::websocket::{SocketId, WebSocketRef};
use async_trait::async_trait;
use axum::extract::ws::Utf8Bytes;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Single-instance, in-memory connection manager: one [`Namespace`] per
/// application, broadcast fan-out bounded by a cpu-derived concurrency cap.
pub struct LocalAdapter {
    namespaces: DashMap<String, Arc<Namespace>>,
    max_concurrent: usize,
}

impl LocalAdapter {
    /// 128 concurrent enqueues per core held up well across hardware.
    const BUFFER_MULTIPLIER_PER_CPU: usize = 128;

    pub fn new() -> Self {
        let max_concurrent = num_cpus::get() * Self::BUFFER_MULTIPLIER_PER_CPU;
        info!(
            "local adapter initialized, max concurrent broadcast ops: {}",
            max_concurrent
        );

        Self {
            namespaces: DashMap::new(),
            max_concurrent,
        }
    }

    fn get_or_create_namespace(&self, app_id: &str) -> Arc<Namespace> {
        self.namespaces
            .entry(app_id.to_string())
            .or_insert_with(|| Arc::new(Namespace::new(app_id.to_string())))
            .value()
            .clone()
    }

    /// Enqueues an already-serialized frame onto every target's send queue.
    /// A full queue drops the frame for that consumer; a closed queue is a
    /// connection already on its way out. Neither stalls the broadcast.
    async fn send_payload_concurrent(&self, targets: Vec<WebSocketRef>, payload: Utf8Bytes) {
        stream::iter(targets)
            .for_each_concurrent(self.max_concurrent, |ws| {
                let payload = payload.clone();
                async move {
                    match ws.send_broadcast(payload) {
                        Ok(()) => {}
                        Err(Error::ConnectionClosed(socket_id)) => {
                            debug!("skipping broadcast to closed connection {}", socket_id);
                        }
                        Err(e) => {
                            warn!("dropping broadcast frame: {}", e);
                        }
                    }
                }
            })
            .await;
    }
}

impl Default for LocalAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionManager for LocalAdapter {
    async fn add_socket(
        &mut self,
        socket_id: SocketId,
        ws: WebSocketRef,
        app_id: &str,
    ) -> Result<()> {
        self.get_or_create_namespace(app_id).add_socket(socket_id, ws);
        Ok(())
    }

    async fn get_connection(
        &mut self,
        socket_id: &SocketId,
        app_id: &str,
    ) -> Option<WebSocketRef> {
        self.get_or_create_namespace(app_id).get_connection(socket_id)
    }

    async fn remove_connection(&mut self, socket_id: &SocketId, app_id: &str) -> Result<()> {
        match self.namespaces.get(app_id) {
            Some(namespace) => {
                namespace.remove_connection(socket_id);
                Ok(())
            }
            None => Err(Error::Connection("namespace not found".to_string())),
        }
    }

    async fn send_message(
        &mut self,
        app_id: &str,
        socket_id: &SocketId,
        message: PusherMessage,
    ) -> Result<()> {
        let connection = self
            .get_connection(socket_id, app_id)
            .await
            .ok_or_else(|| Error::Connection("connection not found".to_string()))?;

        connection.send_message(&message)
    }

    async fn send(
        &mut self,
        channel: &str,
        message: PusherMessage,
        except: Option<&SocketId>,
        app_id: &str,
    ) -> Result<()> {
        debug!("broadcasting to channel {}: {:?}", channel, message.event);

        // Serialize once; every target shares the same buffer.
        let payload = serde_json::to_string(&message)?;

        let namespace = self.get_or_create_namespace(app_id);
        let targets = namespace.get_channel_socket_refs_except(channel, except);

        self.send_payload_concurrent(targets, Utf8Bytes::from(payload))
            .await;

        Ok(())
    }

    async fn get_channel_members(
        &mut self,
        app_id: &str,
        channel: &str,
    ) -> Result<HashMap<String, PresenceMemberInfo>> {
        self.get_or_create_namespace(app_id)
            .get_channel_members(channel)
            .await
    }

    async fn get_channel_socket_count(&mut self, app_id: &str, channel: &str) -> usize {
        self.get_or_create_namespace(app_id).get_channel_socket_count(channel)
    }

    async fn get_channels_with_socket_count(
        &mut self,
        app_id: &str,
    ) -> Result<HashMap<String, usize>> {
        Ok(self
            .get_or_create_namespace(app_id)
            .get_channels_with_socket_count())
    }

    async fn is_in_channel(
        &mut self,
        app_id: &str,
        channel: &str,
        socket_id: &SocketId,
    ) -> Result<bool> {
        Ok(self
            .get_or_create_namespace(app_id)
            .is_in_channel(channel, socket_id))
    }

    async fn add_to_channel(
        &mut self,
        app_id: &str,
        channel: &str,
        socket_id: &SocketId,
    ) -> Result<bool> {
        Ok(self
            .get_or_create_namespace(app_id)
            .add_channel_to_socket(channel, socket_id))
    }

    async fn remove_from_channel(
        &mut self,
        app_id: &str,
        channel: &str,
        socket_id: &SocketId,
    ) -> Result<bool> {
        Ok(self
            .get_or_create_namespace(app_id)
            .remove_channel_from_socket(channel, socket_id))
    }

    async fn get_user_sockets(
        &mut self,
        app_id: &str,
        user_id: &str,
    ) -> Result<Vec<WebSocketRef>> {
        Ok(self.get_or_create_namespace(app_id).get_user_sockets(user_id))
    }

    async fn add_user(&mut self, app_id: &str, user_id: &str, socket_id: &SocketId) -> Result<()> {
        self.get_or_create_namespace(app_id).add_user(user_id, socket_id);
        Ok(())
    }

    async fn remove_user(
        &mut self,
        app_id: &str,
        user_id: &str,
        socket_id: &SocketId,
    ) -> Result<()> {
        self.get_or_create_namespace(app_id).remove_user(user_id, socket_id);
        Ok(())
    }

    async fn terminate_user_connections(&mut self, app_id: &str, user_id: &str) -> Result<()> {
        self.get_or_create_namespace(app_id)
            .terminate_user_connections(user_id)
            .await
    }

    async fn get_sockets_count(&self, app_id: &str) -> usize {
        self.namespaces
            .get(app_id)
            .map(|namespace| namespace.sockets_count())
            .unwrap_or(0)
    }

    async fn get_namespaces(&mut self) -> Vec<Arc<Namespace>> {
        self.namespaces.iter().map(|entry| entry.value().clone()).collect()
    }
}
