//! JSON-RPC 2.0 envelope.
//!
//! Every call between the broker and its agents is a single [`Request`]
//! answered by a single [`Response`] carrying either a result or an
//! [`RpcError`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Protocol version string carried in every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes.
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// A method call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Value,
}

impl Request {
    /// Create a request without parameters.
    #[must_use]
    pub fn new(method: impl Into<String>, id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: None,
            id: Value::from(id),
        }
    }

    /// Attach named parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` cannot be represented as JSON.
    pub fn with_params<P: Serialize>(mut self, params: &P) -> Result<Self, serde_json::Error> {
        self.params = Some(serde_json::to_value(params)?);
        Ok(self)
    }

    /// Decode the named parameters into `P`.
    ///
    /// A missing `params` member is treated as an empty object.
    ///
    /// # Errors
    ///
    /// Returns an invalid-params error if the parameters do not match `P`.
    pub fn params<P: DeserializeOwned>(&self) -> Result<P, RpcError> {
        let params = self
            .params
            .clone()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        serde_json::from_value(params).map_err(|e| RpcError::invalid_params(e.to_string()))
    }

    /// Parse a request from a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not a JSON-RPC request object.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

/// Outcome half of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Result(Value),
    Error(RpcError),
}

/// The answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(flatten)]
    pub outcome: Outcome,
    #[serde(default)]
    pub id: Value,
}

impl Response {
    /// Create a success response.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            outcome: Outcome::Result(result),
            id,
        }
    }

    /// Create an error response.
    #[must_use]
    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            outcome: Outcome::Error(error),
            id,
        }
    }

    /// Whether the call succeeded.
    #[must_use]
    pub fn indicates_success(&self) -> bool {
        matches!(self.outcome, Outcome::Result(_))
    }

    /// Split into the result value or the error.
    ///
    /// # Errors
    ///
    /// Returns the carried [`RpcError`] for failure responses.
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.outcome {
            Outcome::Result(value) => Ok(value),
            Outcome::Error(error) => Err(error),
        }
    }

    /// Parse a response from a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not a JSON-RPC response object.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Serialize to a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if a result value cannot be serialized.
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// A structured JSON-RPC error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: codes::METHOD_NOT_FOUND,
            message: "Method not found".to_string(),
            data: Some(Value::from(method)),
        }
    }

    #[must_use]
    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::new(
            codes::INVALID_PARAMS,
            format!("Invalid params: {}", details.into()),
        )
    }

    #[must_use]
    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(
            codes::INTERNAL_ERROR,
            format!("Internal error: {}", details.into()),
        )
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl std::error::Error for RpcError {}
