//! Transport abstraction traits for Herald.
//!
//! The broker and agents both serve JSON-RPC calls and both make them. These
//! traits keep the accept loop and the push path independent of how a call
//! travels.

use async_trait::async_trait;
use herald_protocol::{ProtocolError, Request, Response};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(0);

/// Identifier for an inbound connection, used in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Generate a process-unique connection id.
    #[must_use]
    pub fn generate() -> Self {
        let n = NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed);
        Self(format!("conn_{n:x}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection or call timed out.
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    /// Could not connect to the peer.
    #[error("Failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: reqwest::Error,
    },

    /// Peer answered with a non-2xx status.
    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    /// Outbound HTTP failure other than connect or timeout.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Framing or body error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Protocol(ProtocolError::Json(e))
    }
}

/// A transport that accepts inbound calls.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Accept a new connection.
    ///
    /// Blocks until a connection is available or an error occurs.
    async fn accept(&self) -> Result<Box<dyn Connection>, TransportError>;

    /// Transport name, for logs.
    fn name(&self) -> &'static str;
}

/// One inbound connection carrying a request and its response.
#[async_trait]
pub trait Connection: Send + Sync {
    /// The connection's identifier.
    fn id(&self) -> &ConnectionId;

    /// Receive the next request.
    ///
    /// Returns `None` if the peer closed the connection before sending
    /// anything.
    async fn recv(&mut self) -> Result<Option<Request>, TransportError>;

    /// Send the response to the last request.
    async fn send(&mut self, response: &Response) -> Result<(), TransportError>;

    /// Close the connection.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Remote address of the connection, if available.
    fn remote_addr(&self) -> Option<String> {
        None
    }
}

/// Outbound calls.
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Send `request` to `address` (`host:port`) and wait for its response.
    async fn call(&self, address: &str, request: &Request) -> Result<Response, TransportError>;
}
