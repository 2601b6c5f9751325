// SPDX-License-Identifier: MIT

//! Control-socket protocol for daemon communication.
//!
//! Wire format: newline-delimited JSON-RPC 2.0 over a Unix socket.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod frame;
mod rpc;
mod types;

pub use client::{Client, ClientError, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
pub use frame::{read_frame, write_frame, ProtocolError, MAX_FRAME_SIZE};
pub use rpc::{
    parse_request, RequestId, RpcError, RpcRequest, RpcResponse, INTERNAL_ERROR, INVALID_REQUEST,
    METHOD_NOT_FOUND, PARSE_ERROR,
};
pub use types::{
    ClearReloadParams, DaemonLogsParams, DaemonLogsResult, EmitParams, EventsQueryParams,
    EventsResult, InputEnabledResult, InputParams, LogsClearParams, LogsQueryParams, LogsResult,
    ProcessAddParams, ProcessListResult, ProcessParams, StagesMapResult, StatusResult, StopParams,
};
