//! # herald-protocol
//!
//! Wire protocol definitions for the Herald broker.
//!
//! This crate defines what travels between the broker and its agents:
//!
//! - **Model** - `Topic`, `Event`, `Notification` and `Qos`
//! - **RPC** - JSON-RPC 2.0 request/response envelope and error codes
//! - **Methods** - method names and their typed parameters
//! - **Codec** - minimal HTTP/1.1 framing for serving a call
//!
//! ## Example
//!
//! ```rust
//! use herald_protocol::{codec, methods, Request};
//!
//! let request = Request::new(methods::GET_ALL_TOPICS, 1);
//! let body = serde_json::to_vec(&request).unwrap();
//! let mut raw = format!("POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n", body.len()).into_bytes();
//! raw.extend_from_slice(&body);
//!
//! let mut buf = bytes::BytesMut::from(&raw[..]);
//! let decoded = codec::decode_request_from(&mut buf, false, codec::MAX_BODY_SIZE)
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(Request::from_slice(&decoded.body).unwrap(), request);
//! ```

pub mod codec;
pub mod methods;
pub mod model;
pub mod rpc;

pub use codec::ProtocolError;
pub use model::{Event, Notification, Qos, Topic};
pub use rpc::{Outcome, Request, Response, RpcError, JSONRPC_VERSION};
