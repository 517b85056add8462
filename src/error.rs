use crate::protocol::constants::close_codes;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("authentication error: {0}")]
    Auth(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("application error: {0}")]
    Application(String),

    #[error("invalid message format: {0}")]
    InvalidMessageFormat(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Pusher close/error code carried in `pusher:error` and
    /// `pusher:subscription_error` frames for this error.
    pub fn close_code(&self) -> u16 {
        match self {
            Error::Auth(_) => close_codes::UNAUTHORIZED,
            _ => close_codes::GENERIC_RECONNECT_IMMEDIATELY,
        }
    }

    /// The bare message as it goes onto the wire, without the variant
    /// prefix `Display` adds for logs.
    pub fn message(&self) -> String {
        match self {
            Error::Auth(message)
            | Error::Channel(message)
            | Error::Connection(message)
            | Error::ConnectionClosed(message)
            | Error::Application(message)
            | Error::InvalidMessageFormat(message)
            | Error::Config(message)
            | Error::Internal(message) => message.clone(),
            other => other.to_string(),
        }
    }
}
