//! Client-side error types

use std::fmt;

use crate::operation::GraphQLError;

/// Failure to get a GraphQL response body from the server
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent or the connection failed
    #[error("network: {0}")]
    Http(String),

    /// The server answered with a non-success status and no GraphQL body
    #[error("HTTP {status}")]
    Status { status: u16 },

    /// The body was not a GraphQL response
    #[error("decode: {0}")]
    Decode(String),

    /// No answer within the request timeout
    #[error("request timed out")]
    Timeout,
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

/// Errors returned directly to callers of the client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The fetch was cancelled before it completed
    #[error("operation cancelled")]
    Cancelled,
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue {
        /// Variable name
        name: &'static str,
        /// Raw value as found in the environment
        value: String,
    },
}

/// Errors stored with a cached result
///
/// A network failure and GraphQL errors are kept side by side; either may be
/// present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombinedError {
    pub network: Option<TransportError>,
    pub graphql: Vec<GraphQLError>,
}

impl CombinedError {
    pub fn network(err: TransportError) -> Self {
        Self {
            network: Some(err),
            graphql: Vec::new(),
        }
    }

    pub fn graphql(errors: Vec<GraphQLError>) -> Self {
        Self {
            network: None,
            graphql: errors,
        }
    }
}

impl fmt::Display for CombinedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(network) = &self.network {
            parts.push(format!("[Network] {network}"));
        }
        for error in &self.graphql {
            parts.push(format!("[GraphQL] {}", error.message));
        }
        f.write_str(&parts.join("\n"))
    }
}

impl std::error::Error for CombinedError {}
