pub mod handler;
pub mod local_adapter;

pub use handler::ConnectionHandler;
pub use local_adapter::LocalAdapter;

use crate::channel::PresenceMemberInfo;
use crate::error::Result;
use crate::namespace::Namespace;
use crate::protocol::messages::PusherMessage;
use crate::websocket::{SocketId, WebSocketRef};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Connection/channel registry façade the rest of the core talks to. The
/// in-memory [`LocalAdapter`] is the single-instance implementation; a
/// cluster driver would implement the same contract.
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    async fn add_socket(
        &mut self,
        socket_id: SocketId,
        ws: WebSocketRef,
        app_id: &str,
    ) -> Result<()>;

    async fn get_connection(&mut self, socket_id: &SocketId, app_id: &str)
    -> Option<WebSocketRef>;

    async fn remove_connection(&mut self, socket_id: &SocketId, app_id: &str) -> Result<()>;

    /// Sends one frame to one connection.
    async fn send_message(
        &mut self,
        app_id: &str,
        socket_id: &SocketId,
        message: PusherMessage,
    ) -> Result<()>;

    /// Broadcasts a frame to a channel, optionally excluding one socket.
    async fn send(
        &mut self,
        channel: &str,
        message: PusherMessage,
        except: Option<&SocketId>,
        app_id: &str,
    ) -> Result<()>;

    async fn get_channel_members(
        &mut self,
        app_id: &str,
        channel: &str,
    ) -> Result<HashMap<String, PresenceMemberInfo>>;

    async fn get_channel_socket_count(&mut self, app_id: &str, channel: &str) -> usize;

    async fn get_channels_with_socket_count(
        &mut self,
        app_id: &str,
    ) -> Result<HashMap<String, usize>>;

    async fn is_in_channel(
        &mut self,
        app_id: &str,
        channel: &str,
        socket_id: &SocketId,
    ) -> Result<bool>;

    async fn add_to_channel(
        &mut self,
        app_id: &str,
        channel: &str,
        socket_id: &SocketId,
    ) -> Result<bool>;

    async fn remove_from_channel(
        &mut self,
        app_id: &str,
        channel: &str,
        socket_id: &SocketId,
    ) -> Result<bool>;

    async fn get_user_sockets(&mut self, app_id: &str, user_id: &str) -> Result<Vec<WebSocketRef>>;

    async fn add_user(&mut self, app_id: &str, user_id: &str, socket_id: &SocketId) -> Result<()>;

    async fn remove_user(
        &mut self,
        app_id: &str,
        user_id: &str,
        socket_id: &SocketId,
    ) -> Result<()>;

    async fn terminate_user_connections(&mut self, app_id: &str, user_id: &str) -> Result<()>;

    async fn get_sockets_count(&self, app_id: &str) -> usize;

    async fn get_namespaces(&mut self) -> Vec<Arc<Namespace>>;
}
