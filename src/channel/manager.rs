use super::{ChannelType, PresenceMemberInfo};
use crate::adapter::ConnectionManager;
use crate::app::config::App;
use crate::error::{Error, Result};
use crate::token::Token;
use crate::websocket::SocketId;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Outcome of a subscription attempt. `member` is populated for presence
/// channels with the identity parsed out of `channel_data`.
#[derive(Debug)]
pub struct JoinResponse {
    pub newly_added: bool,
    pub channel_connections: usize,
    pub member: Option<PresenceMemberInfo>,
}

#[derive(Debug)]
pub struct LeaveResponse {
    pub left: bool,
    pub remaining_connections: usize,
}

/// The channel-type state machines: signature construction and validation
/// for private/presence subscriptions, presence identity parsing, and the
/// membership mutations behind subscribe/unsubscribe.
pub struct ChannelManager;

impl ChannelManager {
    pub async fn subscribe(
        connection_manager: &Arc<Mutex<dyn ConnectionManager + Send + Sync>>,
        socket_id: &SocketId,
        channel_name: &str,
        channel_data: Option<&str>,
        is_authenticated: bool,
        app_id: &str,
    ) -> Result<JoinResponse> {
        let channel_type = ChannelType::from_name(channel_name);

        if channel_type.requires_authentication() && !is_authenticated {
            return Err(Error::Auth("channel requires authentication".into()));
        }

        // Presence identity is parsed before any mutation so a rejected
        // subscription leaves the channel untouched.
        let member = if channel_type == ChannelType::Presence {
            Some(Self::parse_presence_data(channel_data)?)
        } else {
            None
        };

        let (newly_added, channel_connections) = {
            let mut conn_mgr = connection_manager.lock().await;
            let newly_added = conn_mgr
                .add_to_channel(app_id, channel_name, socket_id)
                .await?;
            let total = conn_mgr.get_channel_socket_count(app_id, channel_name).await;
            (newly_added, total)
        };

        Ok(JoinResponse {
            newly_added,
            channel_connections,
            member,
        })
    }

    pub async fn unsubscribe(
        connection_manager: &Arc<Mutex<dyn ConnectionManager + Send + Sync>>,
        socket_id: &SocketId,
        channel_name: &str,
        app_id: &str,
    ) -> Result<LeaveResponse> {
        let mut conn_mgr = connection_manager.lock().await;
        let left = conn_mgr
            .remove_from_channel(app_id, channel_name, socket_id)
            .await?;
        let remaining_connections = conn_mgr.get_channel_socket_count(app_id, channel_name).await;

        Ok(LeaveResponse {
            left,
            remaining_connections,
        })
    }

    /// Validates the `auth` field of a private/presence subscription.
    ///
    /// The field carries `"<appKey>:<hexSignature>"`; the signature is
    /// HMAC-SHA-256 over [`Self::get_data_to_sign`] under the app secret.
    pub fn validate_signature(
        app: &App,
        socket_id: &SocketId,
        channel_name: &str,
        channel_data: Option<&str>,
        auth: &str,
    ) -> Result<()> {
        let signature = auth
            .split_once(':')
            .map(|(_, signature)| signature)
            .ok_or_else(|| Error::Auth("invalid signature string provided".into()))?;

        if hex::decode(signature).is_err() {
            return Err(Error::Auth("invalid signature string provided".into()));
        }

        let token = Token::new(app.key.clone(), app.secret.clone());
        let data = Self::get_data_to_sign(socket_id, channel_name, channel_data);

        if !token.verify(&data, signature) {
            return Err(Error::Auth("signature does not match".into()));
        }

        Ok(())
    }

    /// The string a client library signs: `"<socketId>:<channel>"`, with
    /// `":<channel_data>"` appended whenever channel_data is non-empty.
    pub fn get_data_to_sign(
        socket_id: &SocketId,
        channel_name: &str,
        channel_data: Option<&str>,
    ) -> String {
        match channel_data {
            Some(data) if !data.is_empty() => format!("{socket_id}:{channel_name}:{data}"),
            _ => format!("{socket_id}:{channel_name}"),
        }
    }

    /// The full `auth` value a well-behaved client would present.
    pub fn get_expected_signature(
        app: &App,
        socket_id: &SocketId,
        channel_name: &str,
        channel_data: Option<&str>,
    ) -> String {
        let token = Token::new(app.key.clone(), app.secret.clone());
        format!(
            "{}:{}",
            app.key,
            token.sign(&Self::get_data_to_sign(socket_id, channel_name, channel_data))
        )
    }

    fn parse_presence_data(channel_data: Option<&str>) -> Result<PresenceMemberInfo> {
        let raw = match channel_data {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Err(Error::Channel("missing channel_data".into())),
        };

        let parsed: Value = serde_json::from_str(raw)
            .map_err(|_| Error::Channel("invalid JSON in channel_data".into()))?;

        let user_id = parsed
            .get("user_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        if user_id.is_empty() {
            return Err(Error::Auth(
                "user_id must be present in presence channel".into(),
            ));
        }

        Ok(PresenceMemberInfo {
            user_id: user_id.to_string(),
            user_info: parsed.get("user_info").cloned(),
        })
    }
}
