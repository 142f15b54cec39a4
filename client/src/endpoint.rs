use std::fmt;

use thiserror::Error;

/// Errors raised while parsing a host-supplied endpoint string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// Endpoint string had no host part
    #[error("Endpoint '{endpoint}' has no host")]
    MissingHost { endpoint: String },

    /// Port part was not a valid port number
    #[error("Invalid port '{port}' in endpoint '{endpoint}'")]
    InvalidPort { endpoint: String, port: String },
}

// Endpoint
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
    secure: bool,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, secure: bool) -> Self {
        Self {
            host: host.into(),
            port,
            secure,
        }
    }

    /// Parses `host`, `host:port` or a full `ws(s)://` / `http(s)://` URL.
    /// A scheme overrides `secure`; a missing port defaults to 443 when
    /// secure and 80 otherwise.
    pub fn parse(endpoint: &str, secure: bool) -> Result<Self, EndpointError> {
        let trimmed = endpoint.trim();
        let (secure, rest) = match trimmed.split_once("://") {
            Some(("wss" | "https", rest)) => (true, rest),
            Some(("ws" | "http", rest)) => (false, rest),
            _ => (secure, trimmed),
        };
        let authority = rest.split('/').next().unwrap_or_default();

        let (host, port) = match authority.rsplit_once(':') {
            // a bracketed IPv6 literal without a port
            Some((_, tail)) if tail.ends_with(']') => (authority, None),
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        };

        if host.is_empty() {
            return Err(EndpointError::MissingHost {
                endpoint: endpoint.to_string(),
            });
        }

        let port = match port {
            Some(port) => port.parse::<u16>().map_err(|_| EndpointError::InvalidPort {
                endpoint: endpoint.to_string(),
                port: port.to_string(),
            })?,
            None => Self::default_port(secure),
        };

        Ok(Self::new(host, port, secure))
    }

    pub fn default_port(secure: bool) -> u16 {
        if secure {
            443
        } else {
            80
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn ws_url(&self) -> String {
        self.url(if self.secure { "wss" } else { "ws" })
    }

    pub fn http_url(&self) -> String {
        self.url(if self.secure { "https" } else { "http" })
    }

    // 80 and 443 are left implicit whatever the scheme
    fn url(&self, scheme: &str) -> String {
        match self.port {
            80 | 443 => format!("{}://{}", scheme, self.host),
            port => format!("{}://{}:{}", scheme, self.host, port),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ws_url())
    }
}
