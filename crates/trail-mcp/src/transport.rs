//! Newline-delimited JSON-RPC over a byte stream (stdio in production).
//!
//! Each request is handled on its own task so a long Lake query poll does
//! not hold up other requests; responses are funnelled through one writer.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{McpError, Result};
use crate::protocol::{JsonRpcResponse, PARSE_ERROR};
use crate::server::McpServer;

/// Serve MCP on the process's stdin/stdout until stdin closes.
pub async fn serve_stdio(server: Arc<McpServer>) -> Result<()> {
    info!("MCP server listening on stdio");
    serve(server, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve MCP over any reader/writer pair. Returns once the reader reaches EOF
/// or fails, after every in-flight request has been answered. Lines that are
/// not valid UTF-8 get a parse error response.
pub async fn serve<R, W>(server: Arc<McpServer>, reader: R, writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();

    let writer_task = tokio::spawn(async move {
        let mut writer = BufWriter::new(writer);
        while let Some(response) = rx.recv().await {
            let mut line = serde_json::to_string(&response)?;
            line.push('\n');
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await?;
            debug!("Sent response for id {}", response.id);
        }
        Ok::<(), McpError>(())
    });

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let read_result = loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break Ok(()),
            Ok(_) => {}
            Err(e) => {
                error!("Failed to read from input: {}", e);
                break Err(McpError::from(e));
            }
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim().to_string(),
            Err(e) => {
                warn!("Discarding input line that is not valid UTF-8: {}", e);
                let response = JsonRpcResponse::failure(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: input is not valid UTF-8: {}", e),
                );
                if tx.send(response).is_err() {
                    error!("Response dropped: writer has stopped");
                }
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        let server = Arc::clone(&server);
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Some(response) = server.handle_message(&line).await {
                if tx.send(response).is_err() {
                    error!("Response dropped: writer has stopped");
                }
            }
        });
    };

    info!("Input closed; waiting for in-flight requests");
    // The writer drains once every request task has dropped its sender.
    drop(tx);
    let written = writer_task
        .await
        .map_err(|e| McpError::Transport(format!("writer task failed: {}", e)))?;
    read_result.and(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use trail_core::mock::MockCloudTrail;
    use trail_core::{PollSettings, QueryStatus, StaticClientProvider};
    use trail_tools::{register_cloudtrail_tools, ToolContext, ToolRegistry};

    fn server(mock: Arc<MockCloudTrail>) -> Arc<McpServer> {
        let provider = Arc::new(StaticClientProvider::new(mock, "us-east-1"));
        let context = ToolContext::new(provider)
            .with_poll_settings(PollSettings::from_millis(1_000, 60_000));
        let registry = Arc::new(ToolRegistry::new());
        register_cloudtrail_tools(&registry, Arc::new(context)).unwrap();
        Arc::new(McpServer::new(registry))
    }

    async fn run(server: Arc<McpServer>, input: &[u8]) -> Vec<Value> {
        let (client_end, server_end) = tokio::io::duplex(1 << 20);
        serve(server, input, server_end).await.unwrap();

        let mut output = String::new();
        let mut client_end = client_end;
        client_end.read_to_string(&mut output).await.unwrap();
        output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn answers_each_request_line() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );
        let responses = run(server(Arc::new(MockCloudTrail::new())), input.as_bytes()).await;

        assert_eq!(responses.len(), 2);
        let mut ids: Vec<i64> = responses.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_query_does_not_block_other_requests() {
        let mock = Arc::new(MockCloudTrail::new());
        mock.script_next_query(
            vec![QueryStatus::Running, QueryStatus::Running, QueryStatus::Finished],
            Vec::new(),
            None,
        );
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":"slow","method":"tools/call","params":{"name":"lake_query","arguments":{"sql":"SELECT 1"}}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":"fast","method":"ping"}"#,
            "\n",
        );
        let responses = run(server(mock), input.as_bytes()).await;

        let order: Vec<&str> = responses.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(order, vec!["fast", "slow"]);
        assert!(responses[1]["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Status: FINISHED"));
    }

    #[tokio::test]
    async fn undecodable_line_does_not_stop_the_server() {
        let input = b"\xff\xfe\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n";
        let responses = run(server(Arc::new(MockCloudTrail::new())), input).await;

        assert_eq!(responses.len(), 2);
        let parse_error = responses
            .iter()
            .find(|r| r["id"].is_null())
            .expect("undecodable line is answered");
        assert_eq!(parse_error["error"]["code"], PARSE_ERROR);
        let ping = responses
            .iter()
            .find(|r| r["id"] == 1)
            .expect("ping after the bad line is answered");
        assert_eq!(ping["result"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn final_line_without_newline_is_handled() {
        let input = br#"{"jsonrpc":"2.0","id":9,"method":"ping"}"#;
        let responses = run(server(Arc::new(MockCloudTrail::new())), input).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 9);
    }
}
