//! STDIO transport implementation.
//!
//! Serves one session over the process's own stdin/stdout. Logs must go to
//! stderr because stdout carries the frames.

use tokio::io::BufReader;
use tracing::info;

use super::TransportResult;
use super::framing::{FrameReader, FrameWriter};
use crate::core::McpServer;

/// STDIO transport handler.
pub struct StdioTransport;

impl StdioTransport {
    /// Run the STDIO transport until the client closes stdin.
    pub async fn run(server: McpServer) -> TransportResult<()> {
        info!("Ready - communicating via stdin/stdout");

        let reader = FrameReader::new(BufReader::new(tokio::io::stdin()));
        let writer = FrameWriter::new(tokio::io::stdout());

        server.serve(reader, writer).await?;

        info!("STDIO transport finished");
        Ok(())
    }
}
