//! Newline-delimited JSON framing.
//!
//! A frame is one JSON-RPC message serialized on a single line and
//! terminated by `\n`. [`FrameReader`] and [`FrameWriter`] own the two
//! halves of a byte stream so that a reader task and any number of
//! writers (behind a lock) can work independently.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use super::message::JsonRpcMessage;
use super::{TransportError, TransportResult};

/// Largest frame accepted from a peer.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Reads whole JSON-RPC messages from a buffered byte stream.
pub struct FrameReader<R> {
    reader: R,
    line: String,
    max_frame_len: usize,
}

impl<R> FrameReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            max_frame_len: MAX_FRAME_LEN,
        }
    }

    /// Override the maximum frame length.
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Wait for the next complete message.
    ///
    /// Blank lines are skipped. End of stream yields [`TransportError::Closed`];
    /// oversized, truncated or undecodable frames yield
    /// [`TransportError::Malformed`].
    pub async fn receive(&mut self) -> TransportResult<JsonRpcMessage> {
        loop {
            self.line.clear();
            let limit = self.max_frame_len as u64 + 1;
            let read = (&mut self.reader)
                .take(limit)
                .read_line(&mut self.line)
                .await?;

            if read == 0 {
                return Err(TransportError::closed("end of stream"));
            }
            if read > self.max_frame_len {
                return Err(TransportError::malformed(format!(
                    "frame exceeds {} bytes",
                    self.max_frame_len
                )));
            }
            if !self.line.ends_with('\n') {
                return Err(TransportError::malformed(
                    "stream ended in the middle of a frame",
                ));
            }

            let frame = self.line.trim();
            if frame.is_empty() {
                continue;
            }

            trace!(frame, "Received frame");
            return serde_json::from_str(frame)
                .map_err(|e| TransportError::malformed(format!("{e}: {frame}")));
        }
    }
}

/// Writes whole JSON-RPC messages to a byte stream.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W> FrameWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Serialize and flush one message as a single line.
    pub async fn send(&mut self, message: &JsonRpcMessage) -> TransportResult<()> {
        let mut frame = serde_json::to_string(message)?;
        trace!(frame = %frame, "Sending frame");
        frame.push('\n');
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Flush and shut down the outbound half.
    pub async fn close(&mut self) -> TransportResult<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
