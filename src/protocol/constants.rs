use std::time::Duration;

/// Maximum time allowed to write a single frame to the peer.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Maximum time to wait for the next inbound frame (any frame, including a
/// pong, re-arms the deadline).
pub const PONG_WAIT: Duration = Duration::from_secs(120);

/// Interval on which the server pings the peer. Must be shorter than
/// [`PONG_WAIT`]; fixed at 0.6x for Pusher compatibility.
pub const PING_PERIOD: Duration = Duration::from_secs(72);

/// Activity timeout advertised to clients in `pusher:connection_established`.
pub const ACTIVITY_TIMEOUT: u64 = 120;

/// Largest inbound WebSocket message accepted, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 100 * 1024;

/// Depth of each connection's outbound send queue. Broadcasts to a full
/// queue drop the frame for that consumer rather than block the publisher.
pub const SEND_QUEUE_SIZE: usize = 256;

/// Event-name prefix marking client-originated events.
pub const CLIENT_EVENT_PREFIX: &str = "client-";

/// Pusher protocol close/error codes.
///
/// 4000-4009: the connection was closed by the server and reconnecting with
/// the same parameters will not succeed. 4100-4199: reconnect after a
/// backoff. 4200-4299: reconnect immediately. 4300-4399: other.
pub mod close_codes {
    pub const SSL_ONLY: u16 = 4000;
    pub const APPLICATION_DOES_NOT_EXIST: u16 = 4001;
    pub const APPLICATION_DISABLED: u16 = 4003;
    pub const OVER_CONNECTION_QUOTA: u16 = 4004;
    pub const PATH_NOT_FOUND: u16 = 4005;
    pub const INVALID_VERSION_STRING_FORMAT: u16 = 4006;
    pub const UNSUPPORTED_PROTOCOL_VERSION: u16 = 4007;
    pub const NO_PROTOCOL_VERSION_SUPPLIED: u16 = 4008;
    pub const UNAUTHORIZED: u16 = 4009;

    pub const OVER_CAPACITY: u16 = 4100;

    pub const GENERIC_RECONNECT_IMMEDIATELY: u16 = 4200;
    pub const PONG_NOT_RECEIVED: u16 = 4201;
    pub const CLOSED_AFTER_INACTIVITY: u16 = 4202;

    pub const CLIENT_EVENT_RATE_LIMIT: u16 = 4301;
}
