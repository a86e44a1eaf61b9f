use std::sync::mpsc;
use std::thread;

use crate::host::engine::{Host, run_event_loop};
use crate::host::HostClient;

const DEFAULT_WORKER_THREADS: usize = 2;
const DEFAULT_THREAD_NAME: &str = "ws-observer-host";

pub struct HostBuilder {
    worker_threads: usize,
    thread_name: String,
}

impl HostBuilder {
    pub fn new() -> Self {
        Self {
            worker_threads: DEFAULT_WORKER_THREADS,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }

    /// Worker threads for the I/O runtime. Handlers never run there.
    pub fn worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads.max(1);
        self
    }

    /// Name of the event loop thread.
    pub fn thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    pub fn build(self) -> std::io::Result<Host> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .worker_threads(self.worker_threads)
            .thread_name(format!("{}-io", self.thread_name))
            .build()?;

        let (sender, receiver) = mpsc::channel();
        let client = HostClient::new(sender, runtime.handle().clone());

        let handle = thread::Builder::new()
            .name(self.thread_name)
            .spawn(move || {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    run_event_loop(receiver);
                }));

                if let Err(e) = result {
                    log::error!("Host event loop panicked: {:?}", e);
                }
            })?;

        Ok(Host {
            client,
            runtime: Some(runtime),
            _handle: handle,
        })
    }
}

impl Default for HostBuilder {
    fn default() -> Self {
        Self::new()
    }
}
