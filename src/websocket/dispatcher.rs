//! Handler dispatch
//!
//! The host loop keeps one [`Dispatcher`] per live connection and removes it
//! once `Closed` has been delivered.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::websocket::connection::Connection;
use crate::websocket::event::Event;
use crate::websocket::handlers::Handlers;

/// Per-connection state kept on the host event loop.
///
/// Guards the lifecycle ordering seen by handlers: `Opened` at most once,
/// nothing after `Closed`.
pub(crate) struct Dispatcher {
    connection: Connection,
    handlers: Handlers,
    opened: bool,
    closed: bool,
}

impl Dispatcher {
    pub(crate) fn new(connection: Connection, handlers: Handlers) -> Self {
        Self {
            connection,
            handlers,
            opened: false,
            closed: false,
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn deliver(&mut self, event: Event) {
        let id = self.connection.id();

        if self.closed {
            log::warn!("[Connection {}] Dropping {} event after close", id, event.name());
            return;
        }

        match event {
            Event::Opened if self.opened => {
                log::warn!("[Connection {}] Ignoring duplicate open event", id);
                return;
            }
            Event::Opened => self.opened = true,
            Event::Closed(_) => self.closed = true,
            _ => {}
        }

        log::info!("[Connection {}] Dispatching {} event", id, event.name());
        self.invoke(&event);
    }

    fn invoke(&mut self, event: &Event) {
        let handlers = &mut self.handlers;
        if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| handlers.invoke(event))) {
            log::error!(
                "[Connection {}] on{} handler panicked: {}",
                self.connection.id(),
                event.name(),
                panic_message(&*panic)
            );
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
