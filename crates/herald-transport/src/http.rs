//! HTTP/1.1 listener serving one JSON-RPC call per TCP connection.

use async_trait::async_trait;
use bytes::BytesMut;
use herald_protocol::codec::{self, MAX_BODY_SIZE};
use herald_protocol::{Request, Response};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::traits::{Connection, ConnectionId, Transport, TransportError};

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
    /// How long a peer may take to deliver its request.
    pub read_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 9091)),
            max_body_size: MAX_BODY_SIZE,
            read_timeout: Duration::from_secs(30),
        }
    }
}

/// TCP listener speaking the HTTP framing.
pub struct HttpTransport {
    listener: TcpListener,
    config: HttpConfig,
}

impl HttpTransport {
    /// Bind with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn new(config: HttpConfig) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        info!(addr = %listener.local_addr()?, "HTTP transport listening");
        Ok(Self { listener, config })
    }

    /// Bind to `addr` with default limits.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails.
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        Self::new(HttpConfig {
            bind_addr: addr,
            ..Default::default()
        })
        .await
    }

    /// The bound address. Useful after binding port 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept the next connection as its concrete type.
    ///
    /// # Errors
    ///
    /// Returns an error if accepting fails.
    pub async fn accept_http(&self) -> Result<HttpConnection, TransportError> {
        let (stream, addr) = self.listener.accept().await?;
        debug!(remote = %addr, "Accepted TCP connection");
        Ok(HttpConnection::new(stream, addr, &self.config))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn accept(&self) -> Result<Box<dyn Connection>, TransportError> {
        Ok(Box::new(self.accept_http().await?))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// An accepted connection.
pub struct HttpConnection {
    id: ConnectionId,
    stream: TcpStream,
    remote_addr: SocketAddr,
    read_buffer: BytesMut,
    max_body_size: usize,
    read_timeout: Duration,
}

impl HttpConnection {
    fn new(stream: TcpStream, remote_addr: SocketAddr, config: &HttpConfig) -> Self {
        Self {
            id: ConnectionId::generate(),
            stream,
            remote_addr,
            read_buffer: BytesMut::with_capacity(4096),
            max_body_size: config.max_body_size,
            read_timeout: config.read_timeout,
        }
    }

    async fn read_request(&mut self) -> Result<Option<Request>, TransportError> {
        loop {
            if let Some(http) =
                codec::decode_request_from(&mut self.read_buffer, false, self.max_body_size)?
            {
                return Ok(Some(Request::from_slice(&http.body)?));
            }

            let n = self.stream.read_buf(&mut self.read_buffer).await?;
            if n == 0 {
                if self.read_buffer.is_empty() {
                    return Ok(None);
                }
                return match codec::decode_request_from(
                    &mut self.read_buffer,
                    true,
                    self.max_body_size,
                )? {
                    Some(http) => Ok(Some(Request::from_slice(&http.body)?)),
                    None => Ok(None),
                };
            }
        }
    }
}

#[async_trait]
impl Connection for HttpConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    async fn recv(&mut self) -> Result<Option<Request>, TransportError> {
        let limit = self.read_timeout;
        timeout(limit, self.read_request())
            .await
            .map_err(|_| TransportError::Timeout(limit.as_millis() as u64))?
    }

    async fn send(&mut self, response: &Response) -> Result<(), TransportError> {
        let data = codec::encode_rpc_response(response)?;
        self.stream.write_all(&data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    fn remote_addr(&self) -> Option<String> {
        Some(self.remote_addr.to_string())
    }
}
