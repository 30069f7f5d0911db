//! Error types for the connector.
//!
//! Errors fall into three groups: transient network faults (recovered by
//! reconnecting), recoverable lookup anomalies (the event is dropped), and
//! everything else, which is fatal to the connector.

/// Failures of the streaming socket.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No transport installed, or it was used after being discarded.
    #[error("transport is not open")]
    InvalidState,
    #[error("connection closed")]
    Closed,
    #[error("send timed out")]
    Timeout,
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl TransportError {
    /// Network-layer faults. URL, upgrade and protocol failures are not.
    pub fn is_transient(&self) -> bool {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match self {
            TransportError::Closed | TransportError::Timeout => true,
            TransportError::InvalidState => false,
            TransportError::WebSocket(e) => matches!(
                e,
                WsError::Io(_) | WsError::ConnectionClosed | WsError::AlreadyClosed
            ),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing required config key `{0}`")]
    MissingConfig(&'static str),

    #[error("bad config file: {0}")]
    Config(String),

    #[error("{method} request failed: {source}")]
    Http {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} returned HTTP {status}")]
    Status {
        method: &'static str,
        status: reqwest::StatusCode,
    },

    /// The Web API answered `ok: false`.
    #[error("{method} rejected: {error}")]
    Api { method: &'static str, error: String },

    #[error("handshake response has no streaming url")]
    MissingUrl,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("malformed frame: {0}")]
    MalformedFrame(#[source] serde_json::Error),

    /// `users.info` answered with something that is not a user record.
    #[error("lookup of {0} returned a non-record payload")]
    NotARecord(String),
}

impl Error {
    /// Network-level faults worth retrying with a reconnect.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http { source, .. } => {
                source.is_connect() || source.is_timeout() || source.is_request()
            }
            Error::Status { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            Error::Transport(e) => e.is_transient(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
