//! Transport abstraction for testability
//!
//! The client only needs "send this operation, give me the response body".
//! [`HttpTransport`] does that over `POST /graphql`; tests substitute their
//! own implementations.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::error::TransportError;
use crate::operation::{Operation, ResponseBody};

/// Sends operations to a GraphQL endpoint
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one operation and decode the response body
    async fn send(&self, operation: &Operation) -> Result<ResponseBody, TransportError>;
}

/// GraphQL-over-HTTP transport using reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl HttpTransport {
    /// Create a transport posting to `url`, giving up on a request after
    /// `timeout`
    pub fn new(url: reqwest::Url, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("missive-client/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, operation: &Operation) -> Result<ResponseBody, TransportError> {
        debug!(url = %self.url, "sending operation");

        let response = self
            .client
            .post(self.url.clone())
            .json(operation)
            .send()
            .await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        trace!(%status, len = bytes.len(), "response received");

        // GraphQL servers may answer errors with 4xx and a regular body
        match serde_json::from_slice::<ResponseBody>(&bytes) {
            Ok(body) => Ok(body),
            Err(_) if !status.is_success() => Err(TransportError::Status {
                status: status.as_u16(),
            }),
            Err(err) => Err(TransportError::Decode(err.to_string())),
        }
    }
}
