//! MCP stdio Transport
//!
//! Line-delimited JSON-RPC over stdin/stdout. Each line is one message.
//!
//! Every request is handled on its own tokio task so a slow command does not
//! block the others; a single writer task owns stdout and serialises the
//! responses, which may therefore arrive out of request order. Logs must go
//! to stderr while this transport is active.

use crate::mcp::server::McpServer;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Responses queued for the writer before request tasks wait
const RESPONSE_QUEUE: usize = 64;

pub struct StdioTransport {
    server: Arc<McpServer>,
}

impl StdioTransport {
    pub fn new(server: Arc<McpServer>) -> Self {
        Self { server }
    }

    /// Serve the process's stdin/stdout until stdin closes
    pub async fn run(self) -> Result<()> {
        info!("Serving MCP over stdio");
        self.run_with(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve an arbitrary reader/writer pair
    ///
    /// Returns once the reader hits EOF and every in-flight request has been
    /// answered.
    pub async fn run_with<R, W>(self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<String>(RESPONSE_QUEUE);
        let writer_task = tokio::spawn(write_responses(writer, rx));

        let mut lines = BufReader::new(reader).lines();
        let mut in_flight = JoinSet::new();

        while let Some(line) = lines.next_line().await.context("Failed to read from stdin")? {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }

            let server = self.server.clone();
            let tx = tx.clone();
            in_flight.spawn(async move {
                let Some(response) = server.handle_text(&line).await else {
                    return;
                };
                match serde_json::to_string(&response) {
                    Ok(json) => {
                        if tx.send(json).await.is_err() {
                            error!("Response writer closed; dropping response");
                        }
                    }
                    Err(e) => error!("Failed to serialize response: {}", e),
                }
            });

            // Reap finished tasks so the set does not grow without bound
            while in_flight.try_join_next().is_some() {}
        }

        debug!("stdin closed, waiting for {} in-flight requests", in_flight.len());
        while in_flight.join_next().await.is_some() {}
        drop(tx);

        writer_task.await.context("Response writer task panicked")?
    }
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::Receiver<String>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(json) = rx.recv().await {
        writer
            .write_all(json.as_bytes())
            .await
            .context("Failed to write response")?;
        writer.write_all(b"\n").await.context("Failed to write response")?;
        writer.flush().await.context("Failed to flush response")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::registry::RegistryOptions;
    use crate::policy::{CommandFamily, PolicyConfig};
    use crate::tools::{ExecutorConfig, Gateway};
    use serde_json::Value;

    fn transport() -> StdioTransport {
        let config = ExecutorConfig::default().binary(CommandFamily::Kubectl, "echo");
        let gateway = Arc::new(Gateway::new(Arc::new(PolicyConfig::default()), config));
        StdioTransport::new(Arc::new(McpServer::new(gateway, RegistryOptions::default())))
    }

    async fn exchange(input: &str) -> Vec<Value> {
        let (mut client, server_end) = tokio::io::duplex(64 * 1024);

        transport()
            .run_with(input.as_bytes(), server_end)
            .await
            .unwrap();

        let mut output = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut client, &mut output)
            .await
            .unwrap();
        output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_one_response_per_request() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );
        let responses = exchange(input).await;
        assert_eq!(responses.len(), 2);

        let mut ids: Vec<i64> = responses.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_concurrent_tool_calls_all_answered() {
        let input: String = (0..8)
            .map(|i| {
                format!(
                    "{{\"jsonrpc\":\"2.0\",\"id\":{},\"method\":\"tools/call\",\"params\":{{\"name\":\"call_kubectl\",\"arguments\":{{\"args\":\"get pod p{}\"}}}}}}\n",
                    i, i
                )
            })
            .collect();
        let responses = exchange(&input).await;
        assert_eq!(responses.len(), 8);
        for response in responses {
            let id = response["id"].as_i64().unwrap();
            assert_eq!(
                response["result"]["content"][0]["text"],
                format!("get pod p{}\n", id)
            );
        }
    }

    #[tokio::test]
    async fn test_malformed_line_answered_with_parse_error() {
        let responses = exchange("this is not json\n").await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["code"], -32700);
    }
}
