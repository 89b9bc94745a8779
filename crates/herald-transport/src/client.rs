//! Outbound JSON-RPC calls over HTTP.

use async_trait::async_trait;
use herald_protocol::codec::MAX_BODY_SIZE;
use herald_protocol::{ProtocolError, Request, Response};
use reqwest::Client;
use std::time::Duration;
use tracing::trace;

use crate::traits::{RpcClient, TransportError};

/// Client timeouts and limits.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bound on establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Bound on the whole call, from connect to the last body byte.
    pub call_timeout: Duration,
    /// Maximum response body size in bytes.
    pub max_body_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            call_timeout: Duration::from_secs(5),
            max_body_size: MAX_BODY_SIZE,
        }
    }
}

/// `POST`s each request to `http://<address>/`.
///
/// Idle connections are not pooled: every call gets its own connection, as
/// the broker and agents close theirs after one response.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: ClientConfig,
}

impl HttpClient {
    /// Build a client with the given timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.call_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self { client, config })
    }

    fn classify(&self, address: &str, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            let limit = if error.is_connect() {
                self.config.connect_timeout
            } else {
                self.config.call_timeout
            };
            TransportError::Timeout(limit.as_millis() as u64)
        } else if error.is_connect() {
            TransportError::Connect {
                address: address.to_string(),
                source: error,
            }
        } else {
            TransportError::Http(error)
        }
    }

    fn check_size(&self, size: usize) -> Result<(), TransportError> {
        let max = self.config.max_body_size;
        if size > max {
            return Err(ProtocolError::BodyTooLarge { size, max }.into());
        }
        Ok(())
    }
}

#[async_trait]
impl RpcClient for HttpClient {
    async fn call(&self, address: &str, request: &Request) -> Result<Response, TransportError> {
        let url = format!("http://{address}/");
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(address, e))?;

        let status = response.status();
        trace!(%address, method = %request.method, status = status.as_u16(), "Call answered");
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        if let Some(length) = response.content_length() {
            self.check_size(usize::try_from(length).unwrap_or(usize::MAX))?;
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.classify(address, e))?;
        self.check_size(body.len())?;
        Ok(Response::from_slice(&body)?)
    }
}
