// SPDX-License-Identifier: MIT

//! `MakeWriter` adapter so the daemon's own `combined.log` and
//! `error.log` rotate exactly like per-process logs.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;

use crate::rotate::RotatingFile;

/// Cloneable writer over a shared rotating file.
#[derive(Clone)]
pub struct RotatingWriter {
    inner: Arc<Mutex<RotatingFile>>,
}

impl RotatingWriter {
    pub fn new(path: PathBuf, max_size: u64, max_files: u32) -> Self {
        Self { inner: Arc::new(Mutex::new(RotatingFile::new(path, max_size, max_files))) }
    }

    /// Truncate the current file, keeping rotations (`daemon.logs.clear`).
    pub fn truncate(&self) -> io::Result<()> {
        self.inner.lock().truncate()
    }

    /// Flush and close the underlying handle.
    pub fn close(&self) -> io::Result<()> {
        self.inner.lock().close()
    }
}

impl io::Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().append(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for RotatingWriter {
    type Writer = RotatingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
