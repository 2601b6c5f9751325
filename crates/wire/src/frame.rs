// SPDX-License-Identifier: MIT

//! Newline-delimited framing.
//!
//! Incoming bytes may be split across reads or batched; the buffered
//! reader accumulates until a full line is available.

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame size (8 MiB).
pub const MAX_FRAME_SIZE: usize = 8 * 1024 * 1024;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,
}

/// Read one newline-terminated frame.
///
/// Returns `None` on clean end-of-stream (no partial frame pending).
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    // The +1 lets an oversized frame be detected rather than truncated
    let mut limited = reader.take((MAX_FRAME_SIZE + 1) as u64);
    let n = limited.read_until(b'\n', &mut buf).await?;

    if n == 0 {
        return Ok(None);
    }
    if buf.last() != Some(&b'\n') {
        if buf.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::MessageTooLarge { size: buf.len(), max: MAX_FRAME_SIZE });
        }
        // EOF in the middle of a frame
        return Err(ProtocolError::ConnectionClosed);
    }
    buf.pop();
    Ok(Some(buf))
}

/// Write one frame followed by the newline delimiter.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::MessageTooLarge { size: payload.len(), max: MAX_FRAME_SIZE });
    }
    writer.write_all(payload).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
