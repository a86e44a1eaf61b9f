use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

/// Address used when nothing else is configured.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8888";

const DEFAULT_PORT: u16 = 80;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("cannot parse {input:?}: {source}")]
    Parse {
        input: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported scheme {0:?}, expected \"ws\"")]
    UnsupportedScheme(String),

    #[error("missing host in {0:?}")]
    MissingHost(String),
}

/// The remote peer a connection is opened against.
///
/// Immutable once parsed. Only plain `ws://` endpoints are accepted since the
/// transport runs directly over TCP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn parse(input: &str) -> Result<Self, EndpointError> {
        let url = Url::parse(input).map_err(|source| EndpointError::Parse {
            input: input.to_string(),
            source,
        })?;

        if url.scheme() != "ws" {
            return Err(EndpointError::UnsupportedScheme(url.scheme().to_string()));
        }

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(EndpointError::MissingHost(input.to_string())),
        };
        let port = url.port().unwrap_or(DEFAULT_PORT);

        Ok(Self { url, host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, suitable for a TCP connect.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}
