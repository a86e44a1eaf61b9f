//! Host event loop
//!
//! Runs every handler on one dedicated thread, one command at a time, in the
//! order commands were queued.

use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender};
use std::thread::JoinHandle;

use crate::host::HostClient;
use crate::websocket::{ConnectionId, Dispatcher, Event};

/// Commands that can be sent to the event loop thread.
pub(crate) enum HostCommand {
    /// Start routing events for `id` to `dispatcher`.
    Register {
        id: ConnectionId,
        dispatcher: Dispatcher,
    },
    /// Deliver one lifecycle event.
    Dispatch { id: ConnectionId, event: Event },
    /// Reply once every command queued before this one has run.
    Flush { done: Sender<()> },
    /// Stop the event loop.
    Shutdown,
}

/// The environment observers live in: an event loop thread for handlers and
/// a tokio runtime for socket I/O.
///
/// Dropping the host stops the loop and cancels any connection still running.
pub struct Host {
    pub(super) client: HostClient,
    pub(super) runtime: Option<tokio::runtime::Runtime>,
    pub(super) _handle: JoinHandle<()>,
}

impl Host {
    /// Get a client handle for constructing observers.
    pub fn client(&self) -> HostClient {
        self.client.clone()
    }

    /// The runtime that drives connection tasks.
    pub fn runtime(&self) -> &tokio::runtime::Handle {
        self.client.runtime()
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.client.shutdown();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Main loop for the event loop thread.
pub(super) fn run_event_loop(receiver: Receiver<HostCommand>) {
    log::info!("Host event loop started");

    let mut observers: HashMap<ConnectionId, Dispatcher> = HashMap::new();

    loop {
        match receiver.recv() {
            Ok(HostCommand::Register { id, dispatcher }) => {
                log::debug!("[Connection {}] Registered", id);
                observers.insert(id, dispatcher);
            }
            Ok(HostCommand::Dispatch { id, event }) => {
                let Some(dispatcher) = observers.get_mut(&id) else {
                    log::warn!("[Connection {}] No observer found for {} event", id, event.name());
                    continue;
                };
                dispatcher.deliver(event);
                if dispatcher.is_closed() {
                    observers.remove(&id);
                    log::debug!("[Connection {}] Unregistered", id);
                }
            }
            Ok(HostCommand::Flush { done }) => {
                let _ = done.send(());
            }
            Ok(HostCommand::Shutdown) => {
                log::info!("Host event loop shutting down");
                break;
            }
            Err(e) => {
                log::error!("Host event loop channel error: {}", e);
                break;
            }
        }
    }

    log::info!("Host event loop stopped ({} observers still open)", observers.len());
}

#[cfg(test)]
mod tests {
    use crate::host::HostBuilder;
    use crate::websocket::{CloseReason, Event, Handlers};
    use crate::{ConnectionObserver, Error, ObserverConfig};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_flush_after_start() {
        let host = HostBuilder::new().build().unwrap();
        host.client().flush().unwrap();
    }

    #[test]
    fn test_flush_after_shutdown_fails() {
        let host = HostBuilder::new().build().unwrap();
        let client = host.client();
        client.shutdown();
        assert!(matches!(client.flush(), Err(Error::HostUnavailable)));
    }

    #[test]
    fn test_unknown_connection_is_ignored() {
        let host = HostBuilder::new().build().unwrap();
        let client = host.client();
        client.dispatch(999, Event::Closed(CloseReason::clean(1000, "")));
        client.flush().unwrap();
    }

    #[test]
    fn test_handlers_run_on_loop_thread() {
        let host = HostBuilder::new().thread_name("loop-under-test").build().unwrap();
        let client = host.client();
        let names = Arc::new(Mutex::new(Vec::new()));
        let seen = names.clone();

        // Nothing listens on a port that was just released, so only error and close fire.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let config = ObserverConfig::default().with_endpoint(format!("ws://127.0.0.1:{}", port));
        let handlers = Handlers::new()
            .on_error(move |_| {
                let name = std::thread::current().name().map(str::to_string);
                seen.lock().unwrap().push(name);
            });
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let handlers = handlers.on_closed(move |_| {
            let _ = done_tx.send(());
        });

        ConnectionObserver::connect(&client, &config, handlers).unwrap();
        done_rx
            .recv_timeout(std::time::Duration::from_secs(10))
            .unwrap();

        assert_eq!(
            *names.lock().unwrap(),
            vec![Some("loop-under-test".to_string())]
        );
    }
}
