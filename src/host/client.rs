use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, mpsc};

use crate::error::{Error, Result};
use crate::host::engine::HostCommand;
use crate::websocket::{ConnectionId, Dispatcher, Event};

/// Client handle for communicating with the host event loop.
///
/// This is cheap to clone and can be shared across threads.
#[derive(Clone)]
pub struct HostClient {
    sender: mpsc::Sender<HostCommand>,
    runtime: tokio::runtime::Handle,
    next_id: Arc<AtomicU32>,
}

impl HostClient {
    pub(super) fn new(sender: mpsc::Sender<HostCommand>, runtime: tokio::runtime::Handle) -> Self {
        Self {
            sender,
            runtime,
            next_id: Arc::new(AtomicU32::new(1)),
        }
    }

    pub(crate) fn next_connection_id(&self) -> ConnectionId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn register(&self, id: ConnectionId, dispatcher: Dispatcher) -> Result<()> {
        self.sender
            .send(HostCommand::Register { id, dispatcher })
            .map_err(|_| Error::HostUnavailable)
    }

    /// Queue a lifecycle event for the observer registered under `id`.
    pub fn dispatch(&self, id: ConnectionId, event: Event) {
        if let Err(e) = self.sender.send(HostCommand::Dispatch { id, event }) {
            log::error!("[Connection {}] Failed to send dispatch command: {}", id, e);
        }
    }

    /// Block until every command queued so far has run.
    ///
    /// Must not be called from a handler: the loop would wait on itself.
    pub fn flush(&self) -> Result<()> {
        let (done, wait) = mpsc::channel();
        self.sender
            .send(HostCommand::Flush { done })
            .map_err(|_| Error::HostUnavailable)?;
        wait.recv().map_err(|_| Error::HostUnavailable)
    }

    /// Stop the event loop. Events queued after this are dropped.
    pub fn shutdown(&self) {
        let _ = self.sender.send(HostCommand::Shutdown);
    }

    pub fn runtime(&self) -> &tokio::runtime::Handle {
        &self.runtime
    }

    pub(crate) fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.runtime.spawn(future);
    }
}

impl std::fmt::Debug for HostClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostClient")
            .field("next_id", &self.next_id.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
