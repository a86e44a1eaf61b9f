use thiserror::Error;

use crate::websocket::EndpointError;

/// Errors returned by the observer API.
///
/// Transport failures after construction are never returned here; they are
/// delivered as `Errored` events through the connection's handlers.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] EndpointError),

    #[error("WebSocket is not open")]
    NotOpen,

    #[error("close code {0} cannot be sent; use 1000 or 3000-4999")]
    InvalidCloseCode(u16),

    #[error("close reason is {0} bytes; the limit is 123")]
    CloseReasonTooLong(usize),

    #[error("host event loop is not running")]
    HostUnavailable,

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
