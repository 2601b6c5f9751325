// SPDX-License-Identifier: MIT

//! Per-process log store.
//!
//! Rings are mutated on the caller's (control-plane) side; file writes
//! drain through a single background task so the files see entries in
//! FIFO order and the control plane never blocks on disk I/O.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use clier_core::{paths, LogEntry};

use crate::ring::RingLog;
use crate::rotate::{RotatingFile, DEFAULT_MAX_FILES, DEFAULT_MAX_FILE_SIZE};

/// Default in-memory entries kept per process.
pub const DEFAULT_MAX_MEMORY_ENTRIES: usize = 1000;

#[derive(Debug, Clone)]
pub struct LogStoreConfig {
    pub max_memory_entries: usize,
    pub max_file_size: u64,
    pub max_files: u32,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        Self {
            max_memory_entries: DEFAULT_MAX_MEMORY_ENTRIES,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

#[derive(Debug, Error)]
pub enum LogStoreError {
    #[error("log writer task is gone")]
    WriterGone,
}

enum WriterMsg {
    Entry(LogEntry),
    Flush(oneshot::Sender<()>),
    Delete { name: String, done: oneshot::Sender<()> },
}

/// Bounded per-process rings plus rotating file persistence.
pub struct LogStore {
    config: LogStoreConfig,
    rings: Arc<Mutex<HashMap<String, RingLog>>>,
    writer_tx: mpsc::UnboundedSender<WriterMsg>,
}

impl LogStore {
    /// Create a store persisting under `logs_dir` and spawn its writer task.
    pub fn new(logs_dir: PathBuf, config: LogStoreConfig) -> Self {
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let writer_config = config.clone();
        tokio::spawn(run_writer(logs_dir, writer_config, writer_rx));
        Self { config, rings: Arc::new(Mutex::new(HashMap::new())), writer_tx }
    }

    /// Append an entry to the emitter's ring and queue the file write.
    pub fn add(&self, entry: LogEntry) {
        {
            let mut rings = self.rings.lock();
            let ring = rings
                .entry(entry.process_name.clone())
                .or_insert_with(|| RingLog::new(self.config.max_memory_entries));
            ring.add(entry.clone());
        }
        if self.writer_tx.send(WriterMsg::Entry(entry)).is_err() {
            warn!("log writer task is gone; dropping file write");
        }
    }

    /// Last `n` entries for one process, oldest-first.
    pub fn last_n(&self, name: &str, n: usize) -> Vec<LogEntry> {
        self.rings.lock().get(name).map(|r| r.last_n(n)).unwrap_or_default()
    }

    /// Entries for one process with `timestamp >= since_ms`.
    pub fn since(&self, name: &str, since_ms: u64) -> Vec<LogEntry> {
        self.rings.lock().get(name).map(|r| r.since(since_ms)).unwrap_or_default()
    }

    /// All buffered entries for one process.
    pub fn all(&self, name: &str) -> Vec<LogEntry> {
        self.rings.lock().get(name).map(|r| r.all()).unwrap_or_default()
    }

    /// Entries across every process, interleaved by timestamp.
    pub fn merged(&self, since_ms: Option<u64>, limit: usize) -> Vec<LogEntry> {
        let mut entries: Vec<LogEntry> = {
            let rings = self.rings.lock();
            rings
                .values()
                .flat_map(|r| match since_ms {
                    Some(ts) => r.since(ts),
                    None => r.all(),
                })
                .collect()
        };
        entries.sort_by_key(|e| e.timestamp);
        let skip = entries.len().saturating_sub(limit);
        entries.split_off(skip)
    }

    /// Clear the in-memory ring for one process, or all rings.
    pub fn clear(&self, name: Option<&str>) {
        let mut rings = self.rings.lock();
        match name {
            Some(name) => {
                if let Some(ring) = rings.get_mut(name) {
                    ring.clear();
                }
            }
            None => rings.clear(),
        }
    }

    /// Drop the ring, close the stream, and unlink the current file plus
    /// all rotations for `name`.
    pub async fn delete_logs(&self, name: &str) -> Result<(), LogStoreError> {
        self.rings.lock().remove(name);
        let (done, ack) = oneshot::channel();
        self.writer_tx
            .send(WriterMsg::Delete { name: name.to_string(), done })
            .map_err(|_| LogStoreError::WriterGone)?;
        ack.await.map_err(|_| LogStoreError::WriterGone)
    }

    /// Wait for queued writes, then close all file handles.
    pub async fn flush(&self) -> Result<(), LogStoreError> {
        let (done, ack) = oneshot::channel();
        self.writer_tx.send(WriterMsg::Flush(done)).map_err(|_| LogStoreError::WriterGone)?;
        ack.await.map_err(|_| LogStoreError::WriterGone)
    }
}

/// Drain entries to per-process rotating files in FIFO order.
async fn run_writer(
    logs_dir: PathBuf,
    config: LogStoreConfig,
    mut rx: mpsc::UnboundedReceiver<WriterMsg>,
) {
    let mut files: HashMap<String, RotatingFile> = HashMap::new();

    while let Some(msg) = rx.recv().await {
        match msg {
            WriterMsg::Entry(entry) => {
                let file = files.entry(entry.process_name.clone()).or_insert_with(|| {
                    RotatingFile::new(
                        paths::process_log_path(&logs_dir, &entry.process_name),
                        config.max_file_size,
                        config.max_files,
                    )
                });
                if let Err(e) = file.append_entry(&entry) {
                    warn!(process = %entry.process_name, error = %e, "log file write failed");
                }
            }
            WriterMsg::Flush(done) => {
                for (name, file) in files.iter_mut() {
                    if let Err(e) = file.close() {
                        warn!(process = %name, error = %e, "log file close failed");
                    }
                }
                let _ = done.send(());
            }
            WriterMsg::Delete { name, done } => {
                let mut file = files.remove(&name).unwrap_or_else(|| {
                    RotatingFile::new(
                        paths::process_log_path(&logs_dir, &name),
                        config.max_file_size,
                        config.max_files,
                    )
                });
                if let Err(e) = file.delete() {
                    warn!(process = %name, error = %e, "log file delete failed");
                }
                let _ = done.send(());
            }
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
