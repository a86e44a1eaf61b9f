//! Echo peer
//!
//! A small WebSocket server that echoes frames back to the client and then
//! closes the connection itself. Useful as the far end of an observer.

use futures_util::{SinkExt, StreamExt};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::error::Result;

pub const DEFAULT_CLOSE_REASON: &str = "Close Socket!";

/// How long to wait for the client's close reply.
const CLOSE_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
struct Session {
    echo_limit: Option<usize>,
    greeting: Option<String>,
    close_reason: String,
}

pub struct EchoServer {
    listener: TcpListener,
    session: Session,
}

impl EchoServer {
    /// Bind the listener. Echoes one message per client unless changed with
    /// [`EchoServer::with_echo_limit`].
    pub async fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        log::info!("Echo server listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            session: Session {
                echo_limit: Some(1),
                greeting: None,
                close_reason: DEFAULT_CLOSE_REASON.to_string(),
            },
        })
    }

    /// Messages to echo before closing. `None` echoes until the client leaves.
    pub fn with_echo_limit(mut self, limit: Option<usize>) -> Self {
        self.session.echo_limit = limit;
        self
    }

    /// Text frame pushed to each client right after the handshake.
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.session.greeting = Some(greeting.into());
        self
    }

    pub fn with_close_reason(mut self, reason: impl Into<String>) -> Self {
        self.session.close_reason = reason.into();
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept clients until the listener fails. Each client gets its own task.
    pub async fn run(self) -> Result<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            log::info!("[Echo {}] Accepted TCP connection", peer);
            let session = self.session.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_client(stream, peer, session).await {
                    log::error!("[Echo {}] Session failed: {}", peer, e);
                }
            });
        }
    }

    /// Run the accept loop on the current runtime.
    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }
}

async fn handle_client(stream: TcpStream, peer: SocketAddr, session: Session) -> Result<()> {
    let mut ws = tokio_tungstenite::accept_async(stream).await?;
    log::info!("[Echo {}] Handshake complete", peer);

    if let Some(greeting) = session.greeting {
        ws.send(Message::Text(greeting.into())).await?;
    }

    let mut echoed = 0;
    while session.echo_limit.is_none_or(|limit| echoed < limit) {
        match ws.next().await {
            Some(Ok(message @ (Message::Text(_) | Message::Binary(_)))) => {
                log::debug!("[Echo {}] Echoing {} bytes", peer, message.len());
                ws.send(message).await?;
                echoed += 1;
            }
            Some(Ok(Message::Close(frame))) => {
                log::info!("[Echo {}] Client closed: {:?}", peer, frame);
                // tungstenite queues the close reply; drive it out.
                finish(&mut ws).await;
                return Ok(());
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
            None => {
                log::info!("[Echo {}] Client went away", peer);
                return Ok(());
            }
        }
    }

    log::info!("[Echo {}] Closing after {} echoes", peer, echoed);
    ws.send(Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: session.close_reason.into(),
    })))
    .await?;
    finish(&mut ws).await;
    Ok(())
}

/// Read until the closing handshake completes or the client stalls.
async fn finish(ws: &mut WebSocketStream<TcpStream>) {
    let drain = async { while let Some(Ok(_)) = ws.next().await {} };
    if tokio::time::timeout(CLOSE_REPLY_TIMEOUT, drain).await.is_err() {
        log::debug!("Client did not answer the close frame in time");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::connect_async;

    async fn start(server: EchoServer) -> String {
        let addr = server.local_addr().unwrap();
        server.spawn();
        format!("ws://{}", addr)
    }

    #[tokio::test]
    async fn test_echo_then_close() {
        let url = start(EchoServer::bind("127.0.0.1:0").await.unwrap()).await;
        let (mut ws, _) = connect_async(url).await.unwrap();

        ws.send(Message::Text("Socket echo".into())).await.unwrap();
        assert_eq!(ws.next().await.unwrap().unwrap(), Message::Text("Socket echo".into()));

        match ws.next().await.unwrap().unwrap() {
            Message::Close(Some(frame)) => {
                assert_eq!(frame.code, CloseCode::Normal);
                assert_eq!(frame.reason.as_str(), "Close Socket!");
            }
            other => panic!("expected close, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_greeting_and_unlimited_echo() {
        let server = EchoServer::bind("127.0.0.1:0")
            .await
            .unwrap()
            .with_greeting("Hello Sock!")
            .with_echo_limit(None);
        let url = start(server).await;
        let (mut ws, _) = connect_async(url).await.unwrap();

        assert_eq!(ws.next().await.unwrap().unwrap(), Message::Text("Hello Sock!".into()));
        for text in ["one", "two", "three"] {
            ws.send(Message::Text(text.into())).await.unwrap();
            assert_eq!(ws.next().await.unwrap().unwrap(), Message::Text(text.into()));
        }
        ws.send(Message::Binary(vec![1u8, 2, 3].into())).await.unwrap();
        assert_eq!(
            ws.next().await.unwrap().unwrap(),
            Message::Binary(vec![1u8, 2, 3].into())
        );

        ws.close(None).await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_reports_io_error() {
        let first = EchoServer::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = first.local_addr().unwrap();

        let err: io::Error = match EchoServer::bind(addr).await {
            Ok(_) => panic!("second bind on {} succeeded", addr),
            Err(e) => e,
        };
        assert_eq!(err.kind(), io::ErrorKind::AddrInUse);
    }

    #[tokio::test]
    async fn test_zero_limit_closes_immediately() {
        let server = EchoServer::bind("127.0.0.1:0")
            .await
            .unwrap()
            .with_echo_limit(Some(0))
            .with_close_reason("bye");
        let url = start(server).await;
        let (mut ws, _) = connect_async(url).await.unwrap();

        match ws.next().await.unwrap().unwrap() {
            Message::Close(Some(frame)) => assert_eq!(frame.reason.as_str(), "bye"),
            other => panic!("expected close, got {:?}", other),
        }
    }
}
