use serde::Serialize;

/// Close code reported when the connection ended without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Close code reported when the peer's close frame carried no status.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Inbound or outbound message body. Never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Binary(_) => None,
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Payload::Binary(data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
    /// Whether a close frame was received, i.e. the closing handshake happened.
    pub was_clean: bool,
}

impl CloseReason {
    pub fn clean(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            was_clean: true,
        }
    }

    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: CLOSE_ABNORMAL,
            reason: reason.into(),
            was_clean: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// TCP connect, request construction or the upgrade handshake failed.
    HandshakeFailure,
    /// Read or write failed on an open connection.
    TransportError,
    /// The stream ended without a close frame.
    UnexpectedClose,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A lifecycle event for one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Opened,
    MessageReceived { data: Payload },
    Closed(CloseReason),
    Errored(TransportError),
}

impl Event {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Opened => "open",
            Event::MessageReceived { .. } => "message",
            Event::Closed(_) => "close",
            Event::Errored(_) => "error",
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{ \"error\": \"{}\" }}", e))
    }
}
