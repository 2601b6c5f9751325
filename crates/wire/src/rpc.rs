// SPDX-License-Identifier: MIT

//! JSON-RPC 2.0 request/response envelopes and error codes.

use serde::{Deserialize, Serialize};

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INTERNAL_ERROR: i32 = -32603;

/// Request id: integer or string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: serde_json::Value, id: RequestId) -> Self {
        Self { jsonrpc: "2.0".to_string(), method: method.into(), params, id: Some(id) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn parse_error() -> Self {
        Self::new(PARSE_ERROR, "parse error")
    }

    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, detail)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("method not found: {method}"))
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, detail)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Option<RequestId>,
}

impl RpcResponse {
    pub fn success(id: Option<RequestId>, result: serde_json::Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), result: Some(result), error: None, id }
    }

    pub fn failure(id: Option<RequestId>, error: RpcError) -> Self {
        Self { jsonrpc: "2.0".to_string(), result: None, error: Some(error), id }
    }
}

/// Parse a frame into a request.
///
/// Distinguishes malformed JSON (−32700) from a well-formed value that
/// is not a valid request envelope (−32600), per the error taxonomy.
pub fn parse_request(bytes: &[u8]) -> Result<RpcRequest, RpcError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|_| RpcError::parse_error())?;
    let request: RpcRequest = serde_json::from_value(value)
        .map_err(|e| RpcError::invalid_request(format!("invalid request: {e}")))?;
    if request.jsonrpc != "2.0" {
        return Err(RpcError::invalid_request("invalid request: jsonrpc must be \"2.0\""));
    }
    Ok(request)
}

#[cfg(test)]
#[path = "rpc_tests.rs"]
mod tests;
