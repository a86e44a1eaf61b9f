//! The single socket owned by an observer, and the task that drives it.
//!
//! The task never calls handlers itself. Every lifecycle event is queued on
//! the host event loop via [`HostClient::dispatch`], which delivers them one
//! at a time in the order they were queued.

use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{self, HeaderValue, header};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message, error::ProtocolError};

use crate::error::{Error, Result};
use crate::host::HostClient;
use crate::websocket::endpoint::Endpoint;
use crate::websocket::event::{
    CLOSE_NO_STATUS, CloseReason, ErrorKind, Event, Payload, TransportError,
};

/// How long to keep reading after a close frame so the closing handshake can finish.
const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest payload prefix written to debug logs.
const PREVIEW_LEN: usize = 100;

/// A close frame body is capped at 125 bytes, two of which hold the code.
pub const MAX_CLOSE_REASON_LEN: usize = 123;

pub type ConnectionId = u32;

/// Connection lifecycle state. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closed = 2,
}

impl ReadyState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            _ => ReadyState::Closed,
        }
    }
}

#[derive(Debug)]
pub(crate) enum Outbound {
    Message(Payload),
    Close { code: u16, reason: String },
}

/// Per-connection settings beyond the endpoint itself.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConnectOptions {
    pub origin: Option<String>,
    pub protocols: Vec<String>,
    /// Written by the connection task right after the handshake.
    pub greeting: Option<String>,
}

/// Codes an application may put in its own close frame.
fn is_sendable_close_code(code: u16) -> bool {
    code == 1000 || (3000..=4999).contains(&code)
}

/// A handle to one WebSocket connection.
///
/// Cloning yields another handle to the same socket; the socket itself is
/// never reused once it reaches [`ReadyState::Closed`].
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    endpoint: Endpoint,
    sender: mpsc::UnboundedSender<Outbound>,
    ready_state: Arc<AtomicU8>,
}

impl Connection {
    pub(crate) fn new(
        id: ConnectionId,
        endpoint: Endpoint,
    ) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let connection = Self {
            id,
            endpoint,
            sender,
            ready_state: Arc::new(AtomicU8::new(ReadyState::Connecting as u8)),
        };
        (connection, receiver)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.ready_state.load(Ordering::SeqCst))
    }

    /// Queue a message for the peer. Fails unless the connection is open.
    pub fn send(&self, payload: impl Into<Payload>) -> Result<()> {
        if self.ready_state() != ReadyState::Open {
            return Err(Error::NotOpen);
        }
        let payload = payload.into();
        log::debug!("[Connection {}] send({} bytes)", self.id, payload.len());
        self.sender
            .send(Outbound::Message(payload))
            .map_err(|_| Error::NotOpen)
    }

    /// Ask the peer to close. The `Closed` event arrives later through the
    /// event loop. Closing a connection that is already closed does nothing.
    ///
    /// `code` must be 1000 or in 3000..=4999, and `reason` at most
    /// [`MAX_CLOSE_REASON_LEN`] bytes of UTF-8.
    pub fn close(&self, code: u16, reason: impl Into<String>) -> Result<()> {
        if !is_sendable_close_code(code) {
            return Err(Error::InvalidCloseCode(code));
        }
        let reason = reason.into();
        if reason.len() > MAX_CLOSE_REASON_LEN {
            return Err(Error::CloseReasonTooLong(reason.len()));
        }

        match self.ready_state() {
            ReadyState::Closed => Ok(()),
            ReadyState::Connecting => Err(Error::NotOpen),
            ReadyState::Open => {
                log::info!("[Connection {}] Closing ({} {})", self.id, code, reason);
                self.sender
                    .send(Outbound::Close { code, reason })
                    .map_err(|_| Error::NotOpen)
            }
        }
    }

    /// Move to `to`. Returns false if the connection was already closed.
    pub(crate) fn advance(&self, to: ReadyState) -> bool {
        self.ready_state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (ReadyState::from_u8(current) != ReadyState::Closed).then_some(to as u8)
            })
            .is_ok()
    }

    /// Report a failure that ends the connection: one error event, then an
    /// abnormal close.
    fn fail(&self, host: &HostClient, error: TransportError, reason: &str) {
        self.advance(ReadyState::Closed);
        host.dispatch(self.id, Event::Errored(error));
        host.dispatch(self.id, Event::Closed(CloseReason::abnormal(reason)));
    }
}

fn build_request(endpoint: &Endpoint, options: &ConnectOptions) -> tungstenite::Result<Request> {
    let mut request = endpoint.as_str().into_client_request()?;

    if let Some(origin) = &options.origin {
        let value = HeaderValue::from_str(origin).map_err(http::Error::from)?;
        request.headers_mut().insert(header::ORIGIN, value);
    }

    if !options.protocols.is_empty() {
        let value =
            HeaderValue::from_str(&options.protocols.join(", ")).map_err(http::Error::from)?;
        request
            .headers_mut()
            .insert(header::SEC_WEBSOCKET_PROTOCOL, value);
    }

    Ok(request)
}

fn to_message(outbound: Outbound) -> Message {
    match outbound {
        Outbound::Message(Payload::Text(text)) => Message::Text(text.into()),
        Outbound::Message(Payload::Binary(data)) => Message::Binary(data.into()),
        Outbound::Close { code, reason } => Message::Close(Some(CloseFrame {
            code: CloseCode::from(code),
            reason: reason.into(),
        })),
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(PREVIEW_LEN) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Drive one connection from TCP connect to close.
pub(crate) async fn run(
    connection: Connection,
    options: ConnectOptions,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    host: HostClient,
) {
    let id = connection.id();
    let endpoint = connection.endpoint().clone();

    log::info!("[Connection {}] Connecting TCP to {}", id, endpoint.authority());

    let tcp_stream = match TcpStream::connect(endpoint.authority()).await {
        Ok(stream) => {
            log::info!("[Connection {}] TCP connected", id);
            stream
        }
        Err(e) => {
            log::error!("[Connection {}] TCP connection failed: {}", id, e);
            connection.fail(
                &host,
                TransportError::new(
                    ErrorKind::HandshakeFailure,
                    format!("TCP connection failed: {}", e),
                ),
                "Connection failed",
            );
            return;
        }
    };

    let request = match build_request(&endpoint, &options) {
        Ok(request) => request,
        Err(e) => {
            log::error!("[Connection {}] Failed to create request: {}", id, e);
            connection.fail(
                &host,
                TransportError::new(ErrorKind::HandshakeFailure, format!("Invalid request: {}", e)),
                "Invalid request",
            );
            return;
        }
    };

    log::info!("[Connection {}] Performing WebSocket handshake", id);

    let mut ws_stream = match tokio_tungstenite::client_async(request, tcp_stream).await {
        Ok((stream, response)) => {
            log::info!(
                "[Connection {}] Connected successfully (status: {})",
                id,
                response.status()
            );
            stream
        }
        Err(e) => {
            log::error!("[Connection {}] Handshake failed: {}", id, e);
            connection.fail(
                &host,
                TransportError::new(ErrorKind::HandshakeFailure, format!("Handshake failed: {}", e)),
                "Handshake failed",
            );
            return;
        }
    };

    connection.advance(ReadyState::Open);
    host.dispatch(id, Event::Opened);

    // Written before the writer task starts, so it precedes anything a
    // handler queues from on_opened.
    if let Some(greeting) = options.greeting {
        log::info!("[Connection {}] Sending greeting ({} bytes)", id, greeting.len());
        if let Err(e) = ws_stream.send(Message::Text(greeting.into())).await {
            log::error!("[Connection {}] Failed to send greeting: {}", id, e);
            host.dispatch(
                id,
                Event::Errored(TransportError::new(
                    ErrorKind::TransportError,
                    format!("Failed to send greeting: {}", e),
                )),
            );
        }
    }

    let (mut write, mut read) = ws_stream.split();

    let writer_host = host.clone();
    let send_task = tokio::spawn(async move {
        while let Some(next) = outbound.recv().await {
            if let Err(e) = write.send(to_message(next)).await {
                log::error!("[Connection {}] Send error: {}", id, e);
                writer_host.dispatch(
                    id,
                    Event::Errored(TransportError::new(
                        ErrorKind::TransportError,
                        format!("Send failed: {}", e),
                    )),
                );
                break;
            }
        }
    });

    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                log::debug!("[Connection {}] Received: {}", id, preview(text.as_str()));
                host.dispatch(
                    id,
                    Event::MessageReceived {
                        data: Payload::Text(text.to_string()),
                    },
                );
            }
            Some(Ok(Message::Binary(data))) => {
                log::debug!("[Connection {}] Received binary ({} bytes)", id, data.len());
                host.dispatch(
                    id,
                    Event::MessageReceived {
                        data: Payload::Binary(data.to_vec()),
                    },
                );
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                // Answered by tungstenite
            }
            Some(Ok(Message::Frame(_))) => {}
            Some(Ok(Message::Close(frame))) => {
                let reason = frame
                    .map(|f| CloseReason::clean(f.code.into(), f.reason.to_string()))
                    .unwrap_or_else(|| CloseReason::clean(CLOSE_NO_STATUS, ""));
                log::info!(
                    "[Connection {}] Received close: {} {}",
                    id,
                    reason.code,
                    reason.reason
                );
                connection.advance(ReadyState::Closed);
                host.dispatch(id, Event::Closed(reason));

                // Keep polling so tungstenite flushes its close reply.
                let drain = async { while read.next().await.is_some() {} };
                if tokio::time::timeout(CLOSE_DRAIN_TIMEOUT, drain).await.is_err() {
                    log::debug!("[Connection {}] Peer did not finish the close handshake", id);
                }
                break;
            }
            Some(Err(tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake)))
            | None => {
                log::warn!("[Connection {}] Stream ended without a close frame", id);
                connection.fail(
                    &host,
                    TransportError::new(
                        ErrorKind::UnexpectedClose,
                        "Connection closed without a close frame",
                    ),
                    "Connection lost",
                );
                break;
            }
            Some(Err(e)) => {
                log::error!("[Connection {}] Read error: {}", id, e);
                connection.fail(
                    &host,
                    TransportError::new(ErrorKind::TransportError, e.to_string()),
                    "Connection error",
                );
                break;
            }
        }
    }

    send_task.abort();
    log::info!("[Connection {}] Connection ended", id);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> (Connection, mpsc::UnboundedReceiver<Outbound>) {
        Connection::new(7, Endpoint::parse("ws://localhost:8888").unwrap())
    }

    #[test]
    fn test_closed_is_terminal() {
        let (connection, _rx) = connection();
        assert_eq!(connection.ready_state(), ReadyState::Connecting);
        assert!(connection.advance(ReadyState::Open));
        assert!(connection.advance(ReadyState::Closed));
        assert!(!connection.advance(ReadyState::Open));
        assert_eq!(connection.ready_state(), ReadyState::Closed);
    }

    #[test]
    fn test_send_requires_open() {
        let (connection, mut rx) = connection();
        assert!(matches!(connection.send("early"), Err(Error::NotOpen)));

        connection.advance(ReadyState::Open);
        connection.send("hello").unwrap();
        match rx.try_recv().unwrap() {
            Outbound::Message(payload) => assert_eq!(payload, Payload::from("hello")),
            other => panic!("unexpected {:?}", other),
        }

        connection.advance(ReadyState::Closed);
        assert!(matches!(connection.send("late"), Err(Error::NotOpen)));
    }

    #[test]
    fn test_close_queues_frame_once_open() {
        let (connection, mut rx) = connection();
        assert!(matches!(connection.close(1000, "bye"), Err(Error::NotOpen)));

        connection.advance(ReadyState::Open);
        connection.close(1000, "bye").unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            Outbound::Close { code: 1000, .. }
        ));

        connection.advance(ReadyState::Closed);
        connection.close(1000, "again").unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_close_rejects_reserved_codes() {
        let (connection, mut rx) = connection();
        connection.advance(ReadyState::Open);

        for code in [0, 5, 999, 1001, 1005, 1006, 2999, 5000] {
            assert!(
                matches!(connection.close(code, "x"), Err(Error::InvalidCloseCode(c)) if c == code),
                "code {} accepted",
                code
            );
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(connection.ready_state(), ReadyState::Open);

        connection.close(3000, "app").unwrap();
        connection.close(4999, "app").unwrap();
        assert!(matches!(rx.try_recv().unwrap(), Outbound::Close { code: 3000, .. }));
        assert!(matches!(rx.try_recv().unwrap(), Outbound::Close { code: 4999, .. }));
    }

    #[test]
    fn test_close_rejects_long_reason() {
        let (connection, mut rx) = connection();
        connection.advance(ReadyState::Open);

        let too_long = "r".repeat(MAX_CLOSE_REASON_LEN + 1);
        assert!(matches!(
            connection.close(1000, too_long),
            Err(Error::CloseReasonTooLong(124))
        ));
        // Counted in bytes, not chars.
        assert!(matches!(
            connection.close(1000, "é".repeat(62)),
            Err(Error::CloseReasonTooLong(124))
        ));
        assert!(rx.try_recv().is_err());

        connection
            .close(1000, "r".repeat(MAX_CLOSE_REASON_LEN))
            .unwrap();
        assert!(matches!(rx.try_recv().unwrap(), Outbound::Close { code: 1000, .. }));
    }

    #[test]
    fn test_request_headers() {
        let endpoint = Endpoint::parse("ws://localhost:8888").unwrap();
        let options = ConnectOptions {
            origin: Some("http://localhost:5173".to_string()),
            protocols: vec!["chat".to_string(), "echo".to_string()],
            greeting: None,
        };
        let request = build_request(&endpoint, &options).unwrap();
        assert_eq!(request.headers()[header::ORIGIN], "http://localhost:5173");
        assert_eq!(request.headers()[header::SEC_WEBSOCKET_PROTOCOL], "chat, echo");
    }

    #[test]
    fn test_request_rejects_bad_header() {
        let endpoint = Endpoint::parse("ws://localhost:8888").unwrap();
        let options = ConnectOptions {
            origin: Some("bad\norigin".to_string()),
            ..Default::default()
        };
        assert!(build_request(&endpoint, &options).is_err());
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(150);
        assert_eq!(preview(&long).chars().count(), PREVIEW_LEN);
        assert_eq!(preview("short"), "short");
    }
}
