//! Server configuration
//!
//! Read from the process environment (after `.env` has been loaded by the
//! binary). Unset or empty variables fall back to their defaults.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::executor::DEFAULT_STORE_TIMEOUT;

/// Port used when `API_PORT` is unset
pub const DEFAULT_PORT: u16 = 4000;

/// Runtime settings for the API server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listening port (`API_PORT`)
    pub port: u16,

    /// Database to serve from (`DATABASE_URL`); the in-memory demo store is
    /// used when absent
    pub database_url: Option<String>,

    /// Bound on each entity store read
    pub store_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to read variables
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let port = match read("API_PORT") {
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(0) => DEFAULT_PORT,
                Ok(port) => port,
                Err(_) => {
                    return Err(ConfigError::InvalidValue {
                        name: "API_PORT",
                        value: raw,
                    });
                }
            },
            None => DEFAULT_PORT,
        };

        Ok(Self {
            port,
            database_url: read("DATABASE_URL"),
            ..Self::default()
        })
    }

    /// Address to bind: all interfaces on the configured port
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}
