//! stdio transport for the MCP server.
//!
//! Messages are newline-delimited UTF-8 JSON-RPC: requests arrive on stdin,
//! responses leave on stdout. Logging goes to stderr only.

use std::{io, sync::Arc};

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::mcp::rpc::{json_rpc_error, PARSE_ERROR};
use crate::mcp::server::ProtocolServer;

pub struct StdioServer<R, W> {
    server: Arc<ProtocolServer>,
    reader: R,
    writer: W,
}

impl StdioServer<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    pub fn from_process(server: Arc<ProtocolServer>) -> Self {
        Self::new(server, BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> StdioServer<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(server: Arc<ProtocolServer>, reader: R, writer: W) -> Self {
        Self {
            server,
            reader,
            writer,
        }
    }

    /// Serves messages until stdin is closed.
    pub async fn run(&mut self) -> io::Result<()> {
        info!("stdio transport ready");

        let mut line = Vec::new();
        loop {
            line.clear();
            if self.reader.read_until(b'\n', &mut line).await? == 0 {
                info!("stdin closed, stopping stdio transport");
                return Ok(());
            }

            let message = line.trim_ascii();
            if message.is_empty() {
                continue;
            }

            debug!(bytes = message.len(), "stdio message received");
            // Non-UTF-8 input is rejected by the JSON parser like any other malformed line.
            let response = match serde_json::from_slice::<Value>(message) {
                Ok(payload) => self.server.handle_payload(payload).await,
                Err(_) => Some(json_rpc_error(None, PARSE_ERROR, "Parse error")),
            };

            if let Some(response) = response {
                self.write_message(&response).await?;
            }
        }
    }

    async fn write_message(&mut self, message: &Value) -> io::Result<()> {
        // Compact serialization never contains raw newlines.
        let json = serde_json::to_string(message)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }
}
