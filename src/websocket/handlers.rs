//! Handler slots
//!
//! One optional closure per lifecycle event.

use crate::websocket::event::{CloseReason, Event, Payload, TransportError};

type OpenedFn = Box<dyn FnMut() + Send>;
type MessageFn = Box<dyn FnMut(&Payload) + Send>;
type ClosedFn = Box<dyn FnMut(&CloseReason) + Send>;
type ErrorFn = Box<dyn FnMut(&TransportError) + Send>;

/// The four handler slots of an observer.
///
/// Every slot is optional. Handlers always run on the host event loop thread,
/// never concurrently with another handler of the same connection.
#[derive(Default)]
pub struct Handlers {
    on_opened: Option<OpenedFn>,
    on_message: Option<MessageFn>,
    on_closed: Option<ClosedFn>,
    on_error: Option<ErrorFn>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handlers that write every event to the log sink.
    pub fn logging() -> Self {
        Self::new()
            .on_opened(|| {
                log::info!("on open");
                log::info!("{}", Event::Opened.to_json());
            })
            .on_message(|data| {
                log::info!("On message");
                log::info!("{}", Event::MessageReceived { data: data.clone() }.to_json());
            })
            .on_closed(|reason| {
                log::info!("on close");
                log::info!("{}", Event::Closed(reason.clone()).to_json());
            })
            .on_error(|error| {
                log::warn!("on error");
                log::warn!("{}", Event::Errored(error.clone()).to_json());
            })
    }

    pub fn on_opened(mut self, handler: impl FnMut() + Send + 'static) -> Self {
        self.on_opened = Some(Box::new(handler));
        self
    }

    pub fn on_message(mut self, handler: impl FnMut(&Payload) + Send + 'static) -> Self {
        self.on_message = Some(Box::new(handler));
        self
    }

    pub fn on_closed(mut self, handler: impl FnMut(&CloseReason) + Send + 'static) -> Self {
        self.on_closed = Some(Box::new(handler));
        self
    }

    pub fn on_error(mut self, handler: impl FnMut(&TransportError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(handler));
        self
    }

    /// Invoke the slot matching `event`, if one is set.
    pub(crate) fn invoke(&mut self, event: &Event) {
        match event {
            Event::Opened => {
                if let Some(handler) = self.on_opened.as_mut() {
                    handler();
                }
            }
            Event::MessageReceived { data } => {
                if let Some(handler) = self.on_message.as_mut() {
                    handler(data);
                }
            }
            Event::Closed(reason) => {
                if let Some(handler) = self.on_closed.as_mut() {
                    handler(reason);
                }
            }
            Event::Errored(error) => {
                if let Some(handler) = self.on_error.as_mut() {
                    handler(error);
                }
            }
        }
    }
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handlers")
            .field("on_opened", &self.on_opened.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_closed", &self.on_closed.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
