//! Relay configuration
//!
//! The lobby's bind address comes from the process environment; anything
//! unset falls back to the documented defaults.

use std::env;

use crate::error::{RelayError, Result};

/// Environment variable naming the lobby bind host
pub const HOST_ENV: &str = "TCP_SERVER_HOST";
/// Environment variable naming the lobby bind port
pub const PORT_ENV: &str = "TCP_SERVER_PORT";
/// Environment variable capping concurrent connections per listener
pub const MAX_CONNECTIONS_ENV: &str = "TCP_SERVER_MAX_CONNECTIONS";

/// Relay configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayConfig {
    /// Host the lobby listener binds to; rooms bind ephemeral ports on the
    /// same host
    pub host: String,
    /// Port the lobby listener binds to
    pub port: u16,
    /// Maximum concurrent in-flight connections per listener
    pub max_connections: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_connections: 1024,
        }
    }
}

impl RelayConfig {
    /// Load the configuration from the process environment.
    ///
    /// Unset variables fall back to defaults; values that fail to parse are
    /// a fatal configuration error.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let host = env::var(HOST_ENV).unwrap_or(defaults.host);
        let port = match env::var(PORT_ENV) {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|e| RelayError::config(format!("invalid {}: {}", PORT_ENV, e)))?,
            Err(_) => defaults.port,
        };
        let max_connections = match env::var(MAX_CONNECTIONS_ENV) {
            Ok(raw) => raw.parse::<usize>().map_err(|e| {
                RelayError::config(format!("invalid {}: {}", MAX_CONNECTIONS_ENV, e))
            })?,
            Err(_) => defaults.max_connections,
        };

        Ok(Self {
            host,
            port,
            max_connections,
        })
    }

    /// The lobby bind address as `host:port`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment variables are process-global, so defaults, overrides and
    // parse failures are exercised in one sequential test.
    #[test]
    fn test_env_loading() {
        env::remove_var(HOST_ENV);
        env::remove_var(PORT_ENV);
        env::remove_var(MAX_CONNECTIONS_ENV);

        let config = RelayConfig::from_env().unwrap();
        assert_eq!(config, RelayConfig::default());
        assert_eq!(config.bind_addr(), "127.0.0.1:8000");

        env::set_var(HOST_ENV, "0.0.0.0");
        env::set_var(PORT_ENV, "9100");
        env::set_var(MAX_CONNECTIONS_ENV, "16");

        let config = RelayConfig::from_env().unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9100);
        assert_eq!(config.max_connections, 16);
        assert_eq!(config.bind_addr(), "0.0.0.0:9100");

        env::set_var(PORT_ENV, "not-a-port");
        assert!(RelayConfig::from_env().is_err());

        env::remove_var(HOST_ENV);
        env::remove_var(PORT_ENV);
        env::remove_var(MAX_CONNECTIONS_ENV);
    }
}
