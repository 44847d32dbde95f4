//! Lounge client error types.

use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, LoungeError>;

/// Errors that can occur while talking to a lounge screen.
#[derive(Error, Debug)]
pub enum LoungeError {
    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response status
    #[error("Unexpected HTTP status {status} from {endpoint}")]
    HttpStatus { status: u16, endpoint: String },

    /// The lounge token for the screen is no longer accepted
    #[error("Lounge token expired for screen {0}")]
    TokenExpired(String),

    /// The bound session was dropped by the remote side
    #[error("Session invalidated for screen {0}")]
    SessionInvalidated(String),

    /// A command was sent before the screen was bound
    #[error("No active session for screen {0}")]
    NotConnected(String),

    /// Malformed frames or missing handshake values
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON decoding errors
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Invalid endpoint URL
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoungeError {
    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Map a bind endpoint status code to an error.
    pub fn from_status(status: u16, endpoint: impl Into<String>, screen_id: &str) -> Self {
        match status {
            401 => Self::TokenExpired(screen_id.to_string()),
            400 | 404 | 410 => Self::SessionInvalidated(screen_id.to_string()),
            _ => Self::HttpStatus {
                status,
                endpoint: endpoint.into(),
            },
        }
    }

    /// Whether the failure requires a fresh lounge token before retrying.
    pub fn is_token_expired(&self) -> bool {
        matches!(self, Self::TokenExpired(_))
    }
}
