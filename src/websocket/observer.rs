//! Public entry point
//!
//! [`ConnectionObserver::connect`] wires a connection, its dispatcher and the
//! connection task together.

use crate::config::ObserverConfig;
use crate::error::Result;
use crate::host::HostClient;
use crate::websocket::connection::{self, Connection, ConnectionId, ConnectOptions, ReadyState};
use crate::websocket::dispatcher::Dispatcher;
use crate::websocket::endpoint::Endpoint;
use crate::websocket::event::Payload;
use crate::websocket::handlers::Handlers;

/// Observes the lifecycle of exactly one WebSocket connection.
///
/// The connection attempt starts as soon as the observer is constructed.
/// Once the connection is closed it stays closed; reconnecting means
/// constructing a new observer.
#[derive(Debug)]
pub struct ConnectionObserver {
    connection: Connection,
}

impl ConnectionObserver {
    /// Start connecting to `config.endpoint`.
    ///
    /// Returns as soon as the attempt is scheduled. Success or failure is
    /// reported later through `handlers` on the host event loop.
    pub fn connect(host: &HostClient, config: &ObserverConfig, handlers: Handlers) -> Result<Self> {
        let endpoint = Endpoint::parse(&config.endpoint)?;
        let id = host.next_connection_id();
        let (connection, outbound) = Connection::new(id, endpoint);

        log::info!("[Connection {}] Connecting to {}", id, connection.endpoint());

        let dispatcher = Dispatcher::new(connection.clone(), handlers);
        host.register(id, dispatcher)?;

        let options = ConnectOptions {
            origin: config.origin.clone(),
            protocols: config.protocols.clone(),
            greeting: config.greeting.clone(),
        };
        host.spawn(connection::run(connection.clone(), options, outbound, host.clone()));

        Ok(Self { connection })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn id(&self) -> ConnectionId {
        self.connection.id()
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.connection.endpoint()
    }

    pub fn ready_state(&self) -> ReadyState {
        self.connection.ready_state()
    }

    pub fn send(&self, text: impl Into<String>) -> Result<()> {
        self.connection.send(Payload::Text(text.into()))
    }

    pub fn send_binary(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.connection.send(Payload::Binary(data.into()))
    }

    pub fn close(&self, code: u16, reason: impl Into<String>) -> Result<()> {
        self.connection.close(code, reason)
    }
}
