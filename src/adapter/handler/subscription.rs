use super::ConnectionHandler;
use super::types::SubscriptionRequest;
use crate::app::config::App;
use crate::channel::manager::ChannelManager;
use crate::channel::PresenceMemberInfo;
use crate::error::{Error, Result};
use crate::protocol::messages::{PresenceData, PusherMessage};
use crate::websocket::{SocketId, WebSocketRef};
use tracing::{debug, warn};

impl ConnectionHandler {
    /// Runs a `pusher:subscribe` frame. Failures surface to the peer as a
    /// `pusher:subscription_error` and leave channel membership untouched.
    pub async fn handle_subscribe(
        &self,
        app: &App,
        socket_id: &SocketId,
        message: &PusherMessage,
    ) -> Result<()> {
        let request = match SubscriptionRequest::from_message(message) {
            Ok(request) => request,
            Err(e) => {
                debug!("ignoring malformed subscribe from {}: {}", socket_id, e);
                return Ok(());
            }
        };

        if let Err(e) = self.subscribe_to_channel(app, socket_id, &request).await {
            warn!(
                "subscription to {} failed for {}: {}",
                request.channel, socket_id, e
            );
            let reply = PusherMessage::subscription_error(
                request.channel.clone(),
                e.close_code(),
                e.message(),
            );
            let mut conn_mgr = self.connection_manager.lock().await;
            return conn_mgr.send_message(&app.id, socket_id, reply).await;
        }

        Ok(())
    }

    async fn subscribe_to_channel(
        &self,
        app: &App,
        socket_id: &SocketId,
        request: &SubscriptionRequest,
    ) -> Result<()> {
        let is_authenticated = self.verify_channel_authentication(app, socket_id, request)?;

        let join = ChannelManager::subscribe(
            &self.connection_manager,
            socket_id,
            &request.channel,
            request.channel_data.as_deref(),
            is_authenticated,
            &app.id,
        )
        .await?;

        debug!(
            "socket {} subscribed to {} (newly added: {}, connections: {})",
            socket_id, request.channel, join.newly_added, join.channel_connections
        );

        let ws = {
            let mut conn_mgr = self.connection_manager.lock().await;
            conn_mgr.get_connection(socket_id, &app.id).await
        }
        .ok_or_else(|| Error::Connection(format!("connection {socket_id} not found")))?;

        {
            let mut state = ws.state.lock().await;
            state.subscribed_channels.insert(request.channel.clone());
        }

        match join.member {
            Some(member) => {
                self.finish_presence_subscribe(app, socket_id, &ws, &request.channel, member)
                    .await
            }
            None => {
                let reply =
                    PusherMessage::subscription_succeeded(request.channel.clone(), None);
                let mut conn_mgr = self.connection_manager.lock().await;
                conn_mgr.send_message(&app.id, socket_id, reply).await
            }
        }
    }

    /// Presence epilogue: roster consultation, member_added on a user's
    /// first connection, user bookkeeping, and the roster-bearing reply.
    ///
    /// The roster is read before this connection's presence record is
    /// stored, so the joiner shows up in it only through some other
    /// connection carrying the same user -- exactly the condition under
    /// which member_added must stay quiet.
    async fn finish_presence_subscribe(
        &self,
        app: &App,
        socket_id: &SocketId,
        ws: &WebSocketRef,
        channel: &str,
        member: PresenceMemberInfo,
    ) -> Result<()> {
        let mut members = {
            let mut conn_mgr = self.connection_manager.lock().await;
            conn_mgr.get_channel_members(&app.id, channel).await?
        };
        let first_join = !members.contains_key(&member.user_id);

        {
            let mut state = ws.state.lock().await;
            state.presence.insert(channel.to_string(), member.clone());
            state.user_id = Some(member.user_id.clone());
        }
        {
            let mut conn_mgr = self.connection_manager.lock().await;
            conn_mgr.add_user(&app.id, &member.user_id, socket_id).await?;
        }

        if first_join {
            let broadcast = PusherMessage::member_added(
                channel.to_string(),
                member.user_id.clone(),
                member.user_info.clone(),
            );
            let mut conn_mgr = self.connection_manager.lock().await;
            conn_mgr.send(channel, broadcast, Some(socket_id), &app.id).await?;
        }

        members.insert(member.user_id.clone(), member);
        let presence = PresenceData {
            ids: members.keys().cloned().collect(),
            hash: members
                .iter()
                .map(|(user_id, member)| (user_id.clone(), member.user_info.clone()))
                .collect(),
            count: members.len(),
        };

        let reply =
            PusherMessage::subscription_succeeded(channel.to_string(), Some(presence));
        let mut conn_mgr = self.connection_manager.lock().await;
        conn_mgr.send_message(&app.id, socket_id, reply).await
    }

    pub async fn handle_unsubscribe(
        &self,
        app: &App,
        socket_id: &SocketId,
        message: &PusherMessage,
    ) -> Result<()> {
        let request = match SubscriptionRequest::from_message(message) {
            Ok(request) => request,
            Err(e) => {
                debug!("ignoring malformed unsubscribe from {}: {}", socket_id, e);
                return Ok(());
            }
        };

        self.unsubscribe_from_channel(&app.id, socket_id, &request.channel)
            .await
    }

    /// Removes a connection from one channel. Every teardown path funnels
    /// through here so a presence departure always gets its
    /// member_removed once the user's last connection leaves the channel.
    pub async fn unsubscribe_from_channel(
        &self,
        app_id: &str,
        socket_id: &SocketId,
        channel: &str,
    ) -> Result<()> {
        let ws = {
            let mut conn_mgr = self.connection_manager.lock().await;
            conn_mgr.get_connection(socket_id, app_id).await
        };

        let member = match &ws {
            Some(ws) => {
                let mut state = ws.state.lock().await;
                state.subscribed_channels.remove(channel);
                state.presence.remove(channel)
            }
            None => None,
        };

        ChannelManager::unsubscribe(&self.connection_manager, socket_id, channel, app_id).await?;

        if let Some(member) = member {
            let members = {
                let mut conn_mgr = self.connection_manager.lock().await;
                conn_mgr.get_channel_members(app_id, channel).await?
            };
            if !members.contains_key(&member.user_id) {
                let broadcast =
                    PusherMessage::member_removed(channel.to_string(), member.user_id);
                let mut conn_mgr = self.connection_manager.lock().await;
                conn_mgr.send(channel, broadcast, Some(socket_id), app_id).await?;
            }
        }

        Ok(())
    }
}
