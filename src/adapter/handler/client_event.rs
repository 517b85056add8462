use super::ConnectionHandler;
use crate::app::config::App;
use crate::error::Result;
use crate::protocol::constants::close_codes;
use crate::protocol::messages::PusherMessage;
use crate::websocket::SocketId;
use tracing::debug;

impl ConnectionHandler {
    /// Routes a `client-*` event: allowed only when the app permits client
    /// messaging, the channel is private or presence, and the sender is
    /// currently subscribed. The first condition failing is reported to
    /// the sender; the other two drop the event silently.
    pub async fn handle_client_event(
        &self,
        app: &App,
        socket_id: &SocketId,
        message: &PusherMessage,
    ) -> Result<()> {
        let event = message.event.as_deref().unwrap_or_default();

        if !app.enable_client_messages {
            let error = PusherMessage::error(
                close_codes::CLIENT_EVENT_RATE_LIMIT,
                "client messaging disabled".to_string(),
                message.channel.clone(),
            );
            let mut conn_mgr = self.connection_manager.lock().await;
            return conn_mgr.send_message(&app.id, socket_id, error).await;
        }

        let Some(channel) = message.channel.as_deref() else {
            debug!("dropping client event {:?} with no channel", event);
            return Ok(());
        };

        if !channel.starts_with("private-") && !channel.starts_with("presence-") {
            debug!(
                "dropping client event {:?} on public channel {}",
                event, channel
            );
            return Ok(());
        }

        let in_channel = {
            let mut conn_mgr = self.connection_manager.lock().await;
            conn_mgr.is_in_channel(&app.id, channel, socket_id).await?
        };
        if !in_channel {
            debug!(
                "dropping client event {:?} from {} not subscribed to {}",
                event, socket_id, channel
            );
            return Ok(());
        }

        let forward = PusherMessage {
            event: Some(event.to_string()),
            channel: Some(channel.to_string()),
            data: message.data.clone(),
            ..Default::default()
        };

        let mut conn_mgr = self.connection_manager.lock().await;
        conn_mgr.send(channel, forward, Some(socket_id), &app.id).await
    }
}
