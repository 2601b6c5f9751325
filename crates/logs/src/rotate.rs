// SPDX-License-Identifier: MIT

//! Rotating append-only log file.
//!
//! On reaching `max_size` the current file is shifted through
//! `<path>.1 … <path>.<max_files>`, deleting the oldest. Rotation closes
//! the current handle before renaming.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clier_core::LogEntry;

/// Default per-file size limit (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Default number of rotated copies to keep.
pub const DEFAULT_MAX_FILES: u32 = 3;

/// An append-only file with size-triggered shift rotation.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    max_size: u64,
    max_files: u32,
    file: Option<File>,
    written: u64,
}

impl RotatingFile {
    /// Create a rotating file. The file is opened lazily on first write.
    pub fn new(path: PathBuf, max_size: u64, max_files: u32) -> Self {
        Self { path, max_size, max_files, file: None, written: 0 }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&mut self) -> std::io::Result<&mut File> {
        if self.file.is_none() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
            self.written = file.metadata()?.len();
            self.file = Some(file);
        }
        // Freshly assigned above when absent
        match self.file.as_mut() {
            Some(file) => Ok(file),
            None => Err(std::io::Error::other("log file closed during open")),
        }
    }

    /// Append raw bytes, rotating first if they would exceed `max_size`.
    pub fn append(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.open()?;
        if self.written > 0 && self.written + data.len() as u64 > self.max_size {
            self.rotate()?;
        }
        let file = self.open()?;
        file.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Append a formatted log entry line.
    pub fn append_entry(&mut self, entry: &LogEntry) -> std::io::Result<()> {
        self.append(format_line(entry).as_bytes())
    }

    /// Shift `<path>.k → <path>.k+1` for k from `max_files - 1` down to 1,
    /// deleting the oldest, then move the current file to `.1`.
    fn rotate(&mut self) -> std::io::Result<()> {
        // Close before renaming
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        self.written = 0;

        let base = self.path.display().to_string();
        let oldest = format!("{base}.{}", self.max_files);
        let _ = std::fs::remove_file(&oldest);
        for k in (1..self.max_files).rev() {
            let from = format!("{base}.{k}");
            let to = format!("{base}.{}", k + 1);
            let _ = std::fs::rename(&from, &to);
        }
        std::fs::rename(&self.path, format!("{base}.1"))
    }

    /// Flush and close the current handle. Subsequent writes reopen.
    pub fn close(&mut self) -> std::io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            file.sync_all()?;
        }
        Ok(())
    }

    /// Close the handle and unlink the current file plus all rotations.
    pub fn delete(&mut self) -> std::io::Result<()> {
        self.file = None;
        self.written = 0;
        let base = self.path.display().to_string();
        let _ = std::fs::remove_file(&self.path);
        for k in 1..=self.max_files {
            let _ = std::fs::remove_file(format!("{base}.{k}"));
        }
        Ok(())
    }

    /// Truncate the current file in place, keeping rotations.
    pub fn truncate(&mut self) -> std::io::Result<()> {
        self.close()?;
        if self.path.exists() {
            std::fs::write(&self.path, b"")?;
        }
        Ok(())
    }
}

/// `YYYY-MM-DDThh:mm:ss.sssZ [OUT|ERR|CMD] <data>\n`
pub fn format_line(entry: &LogEntry) -> String {
    let ts = DateTime::<Utc>::from_timestamp_millis(entry.timestamp as i64)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    format!(
        "{} [{}] {}\n",
        ts.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
        entry.stream.as_tag(),
        entry.data
    )
}

#[cfg(test)]
#[path = "rotate_tests.rs"]
mod tests;
