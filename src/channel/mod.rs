pub mod manager;

pub use manager::ChannelManager;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Channel kind, a pure function of the name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    Public,
    Private,
    Presence,
}

impl ChannelType {
    pub fn from_name(name: &str) -> Self {
        if name.starts_with("presence-") {
            ChannelType::Presence
        } else if name.starts_with("private-") {
            ChannelType::Private
        } else {
            ChannelType::Public
        }
    }

    pub fn requires_authentication(&self) -> bool {
        matches!(self, ChannelType::Private | ChannelType::Presence)
    }
}

/// Identity carried by one connection on one presence channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceMemberInfo {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_info: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_type_from_name() {
        assert_eq!(ChannelType::from_name("news"), ChannelType::Public);
        assert_eq!(ChannelType::from_name("private-x"), ChannelType::Private);
        assert_eq!(
            ChannelType::from_name("presence-room"),
            ChannelType::Presence
        );
        // prefix must be exact, not merely contained
        assert_eq!(
            ChannelType::from_name("not-private-thing"),
            ChannelType::Public
        );
    }

    #[test]
    fn authentication_requirements() {
        assert!(!ChannelType::Public.requires_authentication());
        assert!(ChannelType::Private.requires_authentication());
        assert!(ChannelType::Presence.requires_authentication());
    }
}
