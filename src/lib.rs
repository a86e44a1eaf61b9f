//! # WebSocket connection lifecycle observer
//!
//! Opens a single WebSocket connection to a configured endpoint and reports
//! its lifecycle (open, message, close, error) to caller-supplied handlers.
//! Handlers run one at a time on a dedicated host event loop, in the order
//! the transport delivered the events.
//!
//! ## Example
//!
//! ```no_run
//! use ws_observer::{ConnectionObserver, Handlers, HostBuilder, ObserverConfig};
//!
//! # fn main() -> ws_observer::Result<()> {
//! let host = HostBuilder::new().build()?;
//!
//! let config = ObserverConfig::default()
//!     .with_endpoint("ws://localhost:8888")
//!     .with_greeting("Socket echo");
//!
//! let observer = ConnectionObserver::connect(&host.client(), &config, Handlers::logging())?;
//! log::info!("connection {} is {:?}", observer.id(), observer.ready_state());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod server;
pub mod websocket;

pub use config::ObserverConfig;
pub use error::{Error, Result};
pub use host::{Host, HostBuilder, HostClient};
pub use server::EchoServer;
pub use websocket::*;
