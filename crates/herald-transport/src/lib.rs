//! # herald-transport
//!
//! Transport layer for Herald JSON-RPC calls.
//!
//! Every call is a single request and a single response over its own TCP
//! connection, carried as an HTTP/1.1 `POST`:
//!
//! - **HttpTransport** - listener producing one [`Connection`] per call
//! - **HttpClient** - reqwest-backed [`RpcClient`] with connect and call
//!   timeouts
//!
//! ```rust,ignore
//! use herald_transport::{Connection, Transport};
//!
//! async fn serve_one(transport: &dyn Transport) {
//!     let mut conn = transport.accept().await?;
//!     if let Some(request) = conn.recv().await? {
//!         // Dispatch and conn.send(&response).await
//!     }
//! }
//! ```

pub mod client;
pub mod http;
pub mod traits;

pub use client::{ClientConfig, HttpClient};
pub use http::{HttpConfig, HttpConnection, HttpTransport};
pub use traits::{Connection, ConnectionId, RpcClient, Transport, TransportError};
