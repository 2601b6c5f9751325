// SPDX-License-Identifier: MIT

//! Control-socket listener.
//!
//! Accepts connections and runs a read loop per client without blocking
//! the engine loop. Each parsed request is forwarded over the
//! control-plane channel and answered in arrival order; requests never
//! interleave mid-handler.

use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::{unix::OwnedWriteHalf, UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use clier_wire::{
    parse_request, read_frame, write_frame, ProtocolError, RequestId, RpcError, RpcRequest,
    RpcResponse,
};

/// One request paired with its response slot, delivered to the engine
/// loop.
pub struct ControlMsg {
    pub request: RpcRequest,
    pub respond: oneshot::Sender<RpcResponse>,
}

/// Accept loop over the bound control socket.
pub struct ControlServer {
    listener: UnixListener,
    control_tx: mpsc::UnboundedSender<ControlMsg>,
}

impl ControlServer {
    pub fn new(listener: UnixListener, control_tx: mpsc::UnboundedSender<ControlMsg>) -> Self {
        Self { listener, control_tx }
    }

    /// Run until the daemon exits, spawning a task per connection.
    pub async fn run(self) {
        let control_tx = Arc::new(self.control_tx);
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    let control_tx = Arc::clone(&control_tx);
                    tokio::spawn(async move {
                        handle_connection(stream, &control_tx).await;
                    });
                }
                Err(e) => error!(error = %e, "accept failed"),
            }
        }
    }
}

/// Serve one client: read frames, dispatch, write responses, until the
/// client disconnects.
async fn handle_connection(stream: UnixStream, control_tx: &mpsc::UnboundedSender<ControlMsg>) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) | Err(ProtocolError::ConnectionClosed) => {
                debug!("client disconnected");
                return;
            }
            Err(e) => {
                warn!(error = %e, "connection read failed");
                return;
            }
        };

        let response = match parse_request(&frame) {
            Ok(request) => dispatch(request, control_tx).await,
            Err(rpc_error) => RpcResponse::failure(salvage_id(&frame), rpc_error),
        };

        if let Err(e) = send_response(&mut write_half, &response).await {
            debug!(error = %e, "response write failed; dropping connection");
            return;
        }
    }
}

/// Forward a request to the engine loop and await its response.
async fn dispatch(
    request: RpcRequest,
    control_tx: &mpsc::UnboundedSender<ControlMsg>,
) -> RpcResponse {
    let id = request.id.clone();
    let (respond, response_rx) = oneshot::channel();
    if control_tx.send(ControlMsg { request, respond }).is_err() {
        return RpcResponse::failure(id, RpcError::internal("daemon is shutting down"));
    }
    match response_rx.await {
        Ok(response) => response,
        // The engine dropped the slot mid-shutdown
        Err(_) => RpcResponse::failure(id, RpcError::internal("daemon is shutting down")),
    }
}

async fn send_response(
    writer: &mut OwnedWriteHalf,
    response: &RpcResponse,
) -> Result<(), ProtocolError> {
    let payload = serde_json::to_vec(response)?;
    write_frame(writer, &payload).await
}

/// Best-effort extraction of the request id from an invalid frame so
/// the error response still correlates.
fn salvage_id(frame: &[u8]) -> Option<RequestId> {
    let value: serde_json::Value = serde_json::from_slice(frame).ok()?;
    serde_json::from_value(value.get("id")?.clone()).ok()
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
