use super::ConnectionHandler;
use super::types::SubscriptionRequest;
use crate::app::config::App;
use crate::channel::{ChannelManager, ChannelType};
use crate::error::{Error, Result};
use crate::websocket::SocketId;

impl ConnectionHandler {
    /// Checks the subscription's `auth` signature where the channel type
    /// demands one. Public channels pass unconditionally.
    pub fn verify_channel_authentication(
        &self,
        app: &App,
        socket_id: &SocketId,
        request: &SubscriptionRequest,
    ) -> Result<bool> {
        if !ChannelType::from_name(&request.channel).requires_authentication() {
            return Ok(true);
        }

        let auth = request.auth.as_deref().ok_or_else(|| {
            Error::Auth("authentication signature required for this channel".into())
        })?;

        ChannelManager::validate_signature(
            app,
            socket_id,
            &request.channel,
            request.channel_data.as_deref(),
            auth,
        )?;

        Ok(true)
    }
}
