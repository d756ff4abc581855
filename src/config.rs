use std::{env, net::SocketAddr, time::Duration};

use thiserror::Error;

use crate::transport::TransportOptions;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HANDLER_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
    /// Upper bound for one `/mcp` exchange; `None` waits for the handler indefinitely.
    pub handler_timeout: Option<Duration>,
    pub json_response: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PORT must be a valid u16")]
    InvalidPort,
    #[error("MCP_HANDLER_TIMEOUT_MS must be a non-negative integer")]
    InvalidHandlerTimeout,
    #[error("MCP_JSON_RESPONSE must be true or false")]
    InvalidJsonResponse,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let bind_addr = read("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = read("PORT")
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(DEFAULT_PORT);
        let handler_timeout_ms = read("MCP_HANDLER_TIMEOUT_MS")
            .map(|value| {
                value
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidHandlerTimeout)
            })
            .transpose()?
            .unwrap_or(DEFAULT_HANDLER_TIMEOUT_MS);
        let json_response = match read("MCP_JSON_RESPONSE")
            .map(|value| value.to_ascii_lowercase())
            .as_deref()
        {
            None | Some("true" | "1") => true,
            Some("false" | "0") => false,
            Some(_) => return Err(ConfigError::InvalidJsonResponse),
        };

        let config = Self {
            bind_addr,
            port,
            handler_timeout: (handler_timeout_ms > 0)
                .then(|| Duration::from_millis(handler_timeout_ms)),
            json_response,
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            json_response: self.json_response,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            handler_timeout: Some(Duration::from_millis(DEFAULT_HANDLER_TIMEOUT_MS)),
            json_response: true,
        }
    }
}
