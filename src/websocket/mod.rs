//! WebSocket connection lifecycle
//!
//! A [`ConnectionObserver`] opens one connection through tokio-tungstenite
//! and reports `Opened`, `MessageReceived`, `Closed` and `Errored` events to
//! its [`Handlers`].
//!
//! Events are pushed from the connection task to the host event loop via
//! `HostClient::dispatch()`, which runs the handlers one at a time.

mod connection;
mod dispatcher;
mod endpoint;
mod event;
mod handlers;
mod observer;

pub(crate) use dispatcher::Dispatcher;

pub use connection::{Connection, ConnectionId, MAX_CLOSE_REASON_LEN, ReadyState};
pub use endpoint::{DEFAULT_ENDPOINT, Endpoint, EndpointError};
pub use event::{
    CLOSE_ABNORMAL, CLOSE_NO_STATUS, CloseReason, ErrorKind, Event, Payload, TransportError,
};
pub use handlers::Handlers;
pub use observer::ConnectionObserver;
