use serde::Deserialize;
use std::path::Path;

use crate::error::Result;
use crate::websocket::DEFAULT_ENDPOINT;

/// Greeting sent on open unless configured otherwise.
pub const DEFAULT_GREETING: &str = "Socket echo";

/// Everything an observer needs besides its handlers.
///
/// Loadable from JSON; missing fields fall back to [`ObserverConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObserverConfig {
    pub endpoint: String,
    /// Text frame sent once right after the connection opens.
    pub greeting: Option<String>,
    /// `Origin` header for the upgrade request.
    pub origin: Option<String>,
    /// Offered `Sec-WebSocket-Protocol` values.
    pub protocols: Vec<String>,
}

impl ObserverConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = Some(greeting.into());
        self
    }

    pub fn without_greeting(mut self) -> Self {
        self.greeting = None;
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json(&contents)?;
        log::debug!("Loaded observer config from {}", path.display());
        Ok(config)
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            greeting: Some(DEFAULT_GREETING.to_string()),
            origin: None,
            protocols: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ObserverConfig::default();
        assert_eq!(config.endpoint, "ws://localhost:8888");
        assert_eq!(config.greeting.as_deref(), Some("Socket echo"));
        assert!(config.protocols.is_empty());
    }

    #[test]
    fn test_builder() {
        let config = ObserverConfig::default()
            .with_endpoint("ws://127.0.0.1:9000")
            .without_greeting()
            .with_origin("http://localhost:5173")
            .with_protocol("chat");
        assert_eq!(config.endpoint, "ws://127.0.0.1:9000");
        assert_eq!(config.greeting, None);
        assert_eq!(config.origin.as_deref(), Some("http://localhost:5173"));
        assert_eq!(config.protocols, vec!["chat"]);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ObserverConfig::from_json(r#"{ "endpoint": "ws://example.com" }"#).unwrap();
        assert_eq!(config.endpoint, "ws://example.com");
        assert_eq!(config.greeting.as_deref(), Some("Socket echo"));
    }

    #[test]
    fn test_null_greeting_disables_it() {
        let config = ObserverConfig::from_json(r#"{ "greeting": null }"#).unwrap();
        assert_eq!(config.greeting, None);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ObserverConfig::from_json(r#"{ "endpiont": "ws://x" }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "endpoint": "ws://localhost:1234", "protocols": ["a", "b"] }}"#).unwrap();

        let config = ObserverConfig::load(file.path()).unwrap();
        assert_eq!(config.endpoint, "ws://localhost:1234");
        assert_eq!(config.protocols, vec!["a", "b"]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ObserverConfig::load("/nonexistent/observer.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
