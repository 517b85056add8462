use crate::channel::PresenceMemberInfo;
use crate::error::Result;
use crate::protocol::constants::close_codes;
use crate::protocol::messages::PusherMessage;
use crate::websocket::{SocketId, WebSocketRef};
use dashmap::{DashMap, DashSet};
use std::collections::HashMap;
use tracing::debug;

/// Per-application registry: which connections exist, which channels they
/// occupy, and which user each presence-authenticated connection belongs to.
///
/// The three indices are independently sharded maps. The channel and user
/// indices hold socket ids only; `sockets` is the single owning map.
/// Writers always remove from `channels` before `sockets`, so a reader may
/// transiently see an id in a channel whose socket is already gone — every
/// read path skips such ids.
pub struct Namespace {
    pub app_id: String,
    pub sockets: DashMap<SocketId, WebSocketRef>,
    channels: DashMap<String, DashSet<SocketId>>,
    users: DashMap<String, DashSet<SocketId>>,
}

impl Namespace {
    pub fn new(app_id: String) -> Self {
        Self {
            app_id,
            sockets: DashMap::new(),
            channels: DashMap::new(),
            users: DashMap::new(),
        }
    }

    /// Registers a connection. A second insert under the same id is a no-op.
    pub fn add_socket(&self, socket_id: SocketId, ws: WebSocketRef) {
        self.sockets.entry(socket_id).or_insert(ws);
    }

    pub fn get_connection(&self, socket_id: &SocketId) -> Option<WebSocketRef> {
        self.sockets.get(socket_id).map(|entry| entry.value().clone())
    }

    /// Removes a connection and every index entry pointing at it: channel
    /// memberships first, then user associations, then the owning map.
    pub fn remove_connection(&self, socket_id: &SocketId) {
        let channels: Vec<String> = self
            .channels
            .iter()
            .filter(|entry| entry.value().contains(socket_id))
            .map(|entry| entry.key().clone())
            .collect();
        for channel in &channels {
            self.remove_channel_from_socket(channel, socket_id);
        }

        let users: Vec<String> = self
            .users
            .iter()
            .filter(|entry| entry.value().contains(socket_id))
            .map(|entry| entry.key().clone())
            .collect();
        for user_id in &users {
            self.remove_user(user_id, socket_id);
        }

        self.sockets.remove(socket_id);
    }

    /// Adds a socket to a channel, creating the channel on first reference.
    /// Returns whether the socket was newly added.
    pub fn add_channel_to_socket(&self, channel: &str, socket_id: &SocketId) -> bool {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .insert(socket_id.clone())
    }

    /// Removes a socket from a channel, deleting the channel once its last
    /// member departs. Returns whether the socket was present.
    pub fn remove_channel_from_socket(&self, channel: &str, socket_id: &SocketId) -> bool {
        let removed = match self.channels.get(channel) {
            Some(members) => members.remove(socket_id).is_some(),
            None => return false,
        };

        self.channels.remove_if(channel, |_, members| members.is_empty());
        removed
    }

    pub fn is_in_channel(&self, channel: &str, socket_id: &SocketId) -> bool {
        self.channels
            .get(channel)
            .is_some_and(|members| members.contains(socket_id))
    }

    /// Snapshot of a channel's member ids; not live.
    pub fn get_channel_sockets(&self, channel: &str) -> Vec<SocketId> {
        self.channels
            .get(channel)
            .map(|members| members.iter().map(|entry| entry.key().clone()).collect())
            .unwrap_or_default()
    }

    pub fn get_channels(&self) -> Vec<String> {
        self.channels.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn get_channels_with_socket_count(&self) -> HashMap<String, usize> {
        self.channels
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().len()))
            .collect()
    }

    pub fn get_channel_socket_count(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map(|members| members.len())
            .unwrap_or(0)
    }

    /// Live handles for a channel's members, skipping ids whose socket is
    /// already gone, optionally excluding one socket.
    pub fn get_channel_socket_refs_except(
        &self,
        channel: &str,
        except: Option<&SocketId>,
    ) -> Vec<WebSocketRef> {
        self.get_channel_sockets(channel)
            .into_iter()
            .filter(|id| except != Some(id))
            .filter_map(|id| self.sockets.get(&id).map(|entry| entry.value().clone()))
            .collect()
    }

    /// Folds each member connection's presence record for `channel` into a
    /// `user_id -> member` mapping. Two connections carrying the same user
    /// collapse to one entry, last writer wins.
    pub async fn get_channel_members(
        &self,
        channel: &str,
    ) -> Result<HashMap<String, PresenceMemberInfo>> {
        let mut members = HashMap::new();

        for ws in self.get_channel_socket_refs_except(channel, None) {
            let state = ws.state.lock().await;
            if let Some(member) = state.presence.get(channel) {
                members.insert(member.user_id.clone(), member.clone());
            }
        }

        Ok(members)
    }

    pub fn add_user(&self, user_id: &str, socket_id: &SocketId) {
        self.users
            .entry(user_id.to_string())
            .or_default()
            .insert(socket_id.clone());
    }

    pub fn remove_user(&self, user_id: &str, socket_id: &SocketId) {
        if let Some(sockets) = self.users.get(user_id) {
            sockets.remove(socket_id);
        }
        self.users.remove_if(user_id, |_, sockets| sockets.is_empty());
    }

    /// Live handles for a user's connections. Ids whose socket no longer
    /// exists are pruned on the way.
    pub fn get_user_sockets(&self, user_id: &str) -> Vec<WebSocketRef> {
        let ids: Vec<SocketId> = match self.users.get(user_id) {
            Some(sockets) => sockets.iter().map(|entry| entry.key().clone()).collect(),
            None => return Vec::new(),
        };

        let mut refs = Vec::with_capacity(ids.len());
        for id in ids {
            match self.sockets.get(&id) {
                Some(entry) => refs.push(entry.value().clone()),
                None => self.remove_user(user_id, &id),
            }
        }

        refs
    }

    /// Sends `pusher:error` 4009 to each of the user's connections and
    /// initiates their close sequences, in parallel.
    pub async fn terminate_user_connections(&self, user_id: &str) -> Result<()> {
        let refs = self.get_user_sockets(user_id);
        debug!(
            "terminating {} connection(s) for user {} in app {}",
            refs.len(),
            user_id,
            self.app_id
        );

        let closes = refs.into_iter().map(|ws| async move {
            let error = PusherMessage::error(
                close_codes::UNAUTHORIZED,
                "You got disconnected by the app".to_string(),
                None,
            );
            let _ = ws.send_message(&error);
            ws.close(close_codes::UNAUTHORIZED, "You got disconnected by the app");
        });
        futures::future::join_all(closes).await;

        Ok(())
    }

    pub fn sockets_count(&self) -> usize {
        self.sockets.len()
    }
}
