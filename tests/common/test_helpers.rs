//! Test helper functions and utilities

use mcp_server_splunk_es::splunk::{SplunkAuth, SplunkClient, SplunkConfig};
use mcp_server_splunk_es::SplunkEsToolsServer;
use rmcp::{model::*, service::ServiceExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use super::MockSplunkServer;

/// Test wrapper around SplunkEsToolsServer for integration testing
pub struct TestSplunkServer {
    server: SplunkEsToolsServer,
    _mock_splunk: MockSplunkServer,
}

impl TestSplunkServer {
    /// Points a real `SplunkClient` at the mock. The config is built directly so
    /// parallel tests do not race on process environment.
    pub async fn new_with_mock(mock_splunk: &MockSplunkServer) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let config = SplunkConfig {
            endpoint: mock_splunk.base_url.clone(),
            auth: SplunkAuth::Token("test-token".to_string()),
            verify_ssl: true,
            timeout: Duration::from_secs(5),
        };
        let client = SplunkClient::new(config)?;

        Ok(TestSplunkServer {
            server: SplunkEsToolsServer::with_transport(Arc::new(client)),
            _mock_splunk: mock_splunk.clone(),
        })
    }

    pub async fn serve<T>(&self, transport: T) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let server = self.server.clone().serve(transport).await?;
        server.waiting().await?;
        Ok(())
    }
}

/// Simple MCP client for testing tool invocations
pub struct TestMcpClient {
    writer: tokio::io::WriteHalf<tokio::io::DuplexStream>,
    reader: tokio::io::ReadHalf<tokio::io::DuplexStream>,
    next_id: u64,
    cancellation_token: CancellationToken,
}

impl TestMcpClient {
    pub fn new(stream: tokio::io::DuplexStream) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            writer,
            reader,
            next_id: 1,
            cancellation_token: CancellationToken::new(),
        }
    }

    pub async fn initialize(&mut self) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let init_request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": self.next_id,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {
                    "tools": {}
                },
                "clientInfo": {
                    "name": "test-client",
                    "version": "1.0.0"
                }
            }
        });

        self.send_request(init_request).await?;
        let response = self.read_response().await?;

        let initialized_notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        });
        self.send_request(initialized_notification).await?;

        Ok(response)
    }

    pub async fn list_tools(&mut self) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": self.next_id,
            "method": "tools/list",
            "params": {}
        });
        self.send_request(request).await?;
        self.read_response().await
    }

    pub async fn call_tool(&mut self, tool_name: &str, arguments: Value) -> Result<CallToolResult, Box<dyn std::error::Error + Send + Sync>> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": self.next_id,
            "method": "tools/call",
            "params": {
                "name": tool_name,
                "arguments": arguments
            }
        });

        self.send_request(request).await?;
        let response = self.read_response().await?;

        if let Some(result) = response.get("result") {
            if let Some(content) = result.get("content") {
                let content: Vec<Content> = content
                    .as_array()
                    .unwrap_or(&vec![])
                    .iter()
                    .map(|v| {
                        if let Some(text) = v.get("text") {
                            Content::text(text.as_str().unwrap_or(""))
                        } else {
                            Content::json(v.clone()).unwrap_or(Content::text(""))
                        }
                    })
                    .collect();
                let is_error = result.get("isError").and_then(Value::as_bool).unwrap_or(false);
                return Ok(if is_error {
                    CallToolResult::error(content)
                } else {
                    CallToolResult::success(content)
                });
            }
        }

        if let Some(error) = response.get("error") {
            return Ok(CallToolResult::error(vec![
                Content::text(error.get("message").and_then(|m| m.as_str()).unwrap_or("Unknown error"))
            ]));
        }

        Ok(CallToolResult::error(vec![Content::text("Invalid response format")]))
    }

    async fn send_request(&mut self, request: Value) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        use tokio::io::AsyncWriteExt;

        let request_str = serde_json::to_string(&request)?;
        self.writer.write_all(request_str.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        self.next_id += 1;

        Ok(())
    }

    async fn read_response(&mut self) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        use tokio::io::AsyncBufReadExt;

        let mut reader = tokio::io::BufReader::new(&mut self.reader);
        let mut line = String::new();
        reader.read_line(&mut line).await?;

        let response: Value = serde_json::from_str(&line)?;
        Ok(response)
    }

    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }
}

/// First text content of a tool result.
pub fn result_text(result: &CallToolResult) -> String {
    serde_json::to_value(result)
        .ok()
        .and_then(|v| v["content"][0]["text"].as_str().map(str::to_string))
        .unwrap_or_default()
}

/// First text content of a tool result parsed as JSON.
pub fn result_json(result: &CallToolResult) -> Value {
    serde_json::from_str(&result_text(result)).unwrap_or(Value::Null)
}

pub fn is_error(result: &CallToolResult) -> bool {
    serde_json::to_value(result)
        .ok()
        .and_then(|v| v["isError"].as_bool())
        .unwrap_or(false)
}

/// Test data generators
pub mod test_data {
    use serde_json::{json, Value};

    pub fn new_investigation_params() -> Value {
        json!({
            "name": "Suspicious PowerShell activity",
            "description": "Encoded command observed on several hosts",
            "status": "new",
            "urgency": "high",
            "sensitivity": "amber"
        })
    }

    pub fn invalid_status_params() -> Value {
        json!({
            "name": "Bad status",
            "status": "waiting"
        })
    }

    pub fn investigation_update_params(ref_id: &str) -> Value {
        json!({
            "investigation_ref_id": ref_id,
            "status": "in_progress",
            "owner": "analyst1"
        })
    }

    pub fn apply_plan_params(ref_id: &str) -> Value {
        json!({
            "investigation_ref_id": ref_id,
            "response_plan": "Ransomware Response"
        })
    }
}
