// SPDX-License-Identifier: MIT

//! Minimal control-socket client.
//!
//! Used by the bootstrapper's readiness probe and by integration tests;
//! the user-facing CLI builds on the same surface.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

use crate::frame::{read_frame, write_frame, ProtocolError};
use crate::rpc::{RequestId, RpcRequest, RpcResponse};

/// Default connection timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("daemon error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("malformed response: {0}")]
    BadResponse(String),
}

/// One connection to the control socket.
pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_id: i64,
    request_timeout: Duration,
}

impl Client {
    /// Connect with the default timeouts.
    pub async fn connect(socket_path: &Path) -> Result<Self, ClientError> {
        Self::connect_with_timeout(socket_path, DEFAULT_CONNECT_TIMEOUT).await
    }

    pub async fn connect_with_timeout(
        socket_path: &Path,
        connect_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let stream = tokio::time::timeout(connect_timeout, UnixStream::connect(socket_path))
            .await
            .map_err(|_| ProtocolError::Timeout)?
            .map_err(ProtocolError::Io)?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            next_id: 1,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn set_request_timeout(&mut self, timeout: Duration) {
        self.request_timeout = timeout;
    }

    /// Issue one request and wait for the matching response.
    pub async fn request(
        &mut self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ClientError> {
        let id = self.next_id;
        self.next_id += 1;
        let request = RpcRequest::new(method, params, RequestId::Number(id));
        let payload = serde_json::to_vec(&request).map_err(ProtocolError::Json)?;
        write_frame(&mut self.writer, &payload).await?;

        let frame = tokio::time::timeout(self.request_timeout, read_frame(&mut self.reader))
            .await
            .map_err(|_| ProtocolError::Timeout)??
            .ok_or(ProtocolError::ConnectionClosed)?;

        let response: RpcResponse =
            serde_json::from_slice(&frame).map_err(ProtocolError::Json)?;
        if let Some(error) = response.error {
            return Err(ClientError::Rpc { code: error.code, message: error.message });
        }
        response
            .result
            .ok_or_else(|| ClientError::BadResponse("response carries neither result nor error".to_string()))
    }

    /// `ping` round-trip; used as the daemon liveness probe.
    pub async fn ping(&mut self) -> Result<(), ClientError> {
        self.request("ping", serde_json::Value::Null).await.map(|_| ())
    }
}
