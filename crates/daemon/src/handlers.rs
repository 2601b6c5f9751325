// SPDX-License-Identifier: MIT

//! Request dispatch: one function per control-surface method, executed
//! on the engine loop so handlers are atomic with respect to each other.

use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::info;

use clier_process::ProcessEvent;
use clier_wire::{
    ClearReloadParams, DaemonLogsParams, DaemonLogsResult, EmitParams, EventsQueryParams,
    EventsResult, InputEnabledResult, InputParams, LogsClearParams, LogsQueryParams, LogsResult,
    ProcessAddParams, ProcessListResult, ProcessParams, RpcError, RpcRequest, RpcResponse,
    StagesMapResult, StatusResult, StopParams,
};

use crate::lifecycle::Daemon;
use crate::supervisor::SupervisorError;

/// Handle one request against the daemon state.
///
/// `events_rx` is threaded in so `config.reload` can discard buffered
/// events from the generation it tears down.
pub async fn handle(
    daemon: &mut Daemon,
    events_rx: &mut mpsc::Receiver<ProcessEvent>,
    request: RpcRequest,
) -> RpcResponse {
    let id = request.id.clone();
    match handle_inner(daemon, events_rx, &request).await {
        Ok(result) => RpcResponse::success(id, result),
        Err(error) => RpcResponse::failure(id, error),
    }
}

async fn handle_inner(
    daemon: &mut Daemon,
    events_rx: &mut mpsc::Receiver<ProcessEvent>,
    request: &RpcRequest,
) -> Result<serde_json::Value, RpcError> {
    match request.method.as_str() {
        "ping" => Ok(json!("pong")),

        "daemon.status" => {
            let result = StatusResult {
                project: daemon.supervisor.project_name().to_string(),
                pid: std::process::id(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                uptime_ms: daemon.start_time.elapsed().as_millis() as u64,
                process_count: daemon.supervisor.list_processes().len(),
                running_count: daemon.supervisor.running_count(),
            };
            to_result(result)
        }

        "daemon.shutdown" => {
            info!("shutdown requested over control socket");
            daemon.shutdown.notify_one();
            Ok(json!({ "ok": true }))
        }

        "daemon.logs" => {
            let params: DaemonLogsParams = parse_params(&request.params)?;
            let lines = read_tail(&daemon.paths.combined_log, params.lines.unwrap_or(100))
                .map_err(|e| RpcError::internal(e.to_string()))?;
            to_result(DaemonLogsResult { lines })
        }

        "daemon.logs.clear" => {
            daemon
                .combined_writer
                .truncate()
                .and_then(|()| daemon.error_writer.truncate())
                .map_err(|e| RpcError::internal(e.to_string()))?;
            Ok(json!({ "ok": true }))
        }

        "process.list" => {
            to_result(ProcessListResult { processes: daemon.supervisor.list_processes() })
        }

        "process.start" => {
            let params: ProcessParams = parse_params(&request.params)?;
            daemon.supervisor.start_item(&params.name).await.map_err(internal)?;
            Ok(json!({ "ok": true }))
        }

        "process.stop" => {
            let params: StopParams = parse_params(&request.params)?;
            daemon.supervisor.stop_process(&params.name, params.force).await.map_err(internal)?;
            Ok(json!({ "ok": true }))
        }

        "process.restart" => {
            let params: StopParams = parse_params(&request.params)?;
            daemon
                .supervisor
                .restart_process(&params.name, params.force)
                .await
                .map_err(internal)?;
            Ok(json!({ "ok": true }))
        }

        "process.add" => {
            let params: ProcessAddParams = parse_params(&request.params)?;
            let step: clier_config::StepEntry = serde_json::from_value(params.item)
                .map_err(|e| RpcError::invalid_request(format!("invalid item: {e}")))?;
            daemon.supervisor.add_item(&step).map_err(internal)?;
            Ok(json!({ "ok": true }))
        }

        "process.delete" => {
            let params: ProcessParams = parse_params(&request.params)?;
            daemon.supervisor.delete_process(&params.name, false).await.map_err(internal)?;
            Ok(json!({ "ok": true }))
        }

        "process.input" => {
            let params: InputParams = parse_params(&request.params)?;
            daemon
                .supervisor
                .write_input(&params.name, params.data.as_bytes())
                .await
                .map_err(internal)?;
            Ok(json!({ "ok": true }))
        }

        "process.inputEnabled" => {
            let params: ProcessParams = parse_params(&request.params)?;
            let enabled = daemon.supervisor.input_enabled(&params.name).map_err(internal)?;
            to_result(InputEnabledResult { enabled })
        }

        "logs.query" => {
            let params: LogsQueryParams = parse_params(&request.params)?;
            let entries = daemon
                .supervisor
                .query_logs(params.name.as_deref(), params.lines, params.since.as_deref())
                .map_err(internal)?;
            to_result(LogsResult { entries })
        }

        "logs.clear" => {
            let params: LogsClearParams = parse_params(&request.params)?;
            daemon.supervisor.clear_logs(params.name.as_deref());
            Ok(json!({ "ok": true }))
        }

        "config.reload" => {
            daemon.supervisor.reload(events_rx).await.map_err(internal)?;
            Ok(json!({ "ok": true }))
        }

        "config.clearReload" => {
            let params: ClearReloadParams = parse_params(&request.params)?;
            daemon.supervisor.clear_reload(params.restart_manual_services).await;
            Ok(json!({ "ok": true }))
        }

        "stages.map" => to_result(StagesMapResult { stages: daemon.supervisor.stages_map() }),

        "stage.trigger" => {
            let params: ProcessParams = parse_params(&request.params)?;
            daemon.supervisor.trigger_stage(&params.name).await.map_err(internal)?;
            Ok(json!({ "ok": true }))
        }

        "event.emit" => {
            let params: EmitParams = parse_params(&request.params)?;
            daemon.supervisor.emit(params.name, params.data).await;
            Ok(json!({ "ok": true }))
        }

        "events.query" => {
            let params: EventsQueryParams = parse_params(&request.params)?;
            let events =
                daemon.supervisor.query_events(params.since.as_deref()).map_err(internal)?;
            to_result(EventsResult { events })
        }

        other => Err(RpcError::method_not_found(other)),
    }
}

fn parse_params<T: DeserializeOwned>(params: &serde_json::Value) -> Result<T, RpcError> {
    serde_json::from_value(params.clone())
        .map_err(|e| RpcError::invalid_request(format!("invalid params: {e}")))
}

fn to_result<T: serde::Serialize>(value: T) -> Result<serde_json::Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::internal(e.to_string()))
}

fn internal(error: SupervisorError) -> RpcError {
    RpcError::internal(error.to_string())
}

/// Last `limit` lines of a log file.
fn read_tail(path: &std::path::Path, limit: usize) -> std::io::Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    let lines: Vec<&str> = content.lines().collect();
    let skip = lines.len().saturating_sub(limit);
    Ok(lines[skip..].iter().map(|s| s.to_string()).collect())
}
