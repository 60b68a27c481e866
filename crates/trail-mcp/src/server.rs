//! Request dispatch for the MCP methods this server supports.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use trail_tools::{ToolError, ToolRegistry};

use crate::protocol::{
    Implementation, JsonRpcRequest, JsonRpcResponse, McpInitializeRequest, McpInitializeResult,
    McpToolCallRequest, McpToolCallResult, McpToolInfo, McpToolListResult, ServerCapabilities,
    ToolsCapability, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
    PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS,
};

const INSTRUCTIONS: &str = "Query AWS CloudTrail. Use lookup_events for recent management \
events, list_event_data_stores to discover CloudTrail Lake stores, lake_query to run SQL \
against a store, and get_query_status / get_query_results to follow asynchronous queries.";

pub struct McpServer {
    registry: Arc<ToolRegistry>,
    info: Implementation,
}

impl McpServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            info: Implementation {
                name: "cloudtrail-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handle one raw JSON-RPC line. Returns `None` for notifications.
    pub async fn handle_message(&self, raw: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(raw) {
            Ok(request) => request,
            Err(e) => {
                warn!("Unparseable JSON-RPC message: {}", e);
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
            }
        };
        self.handle_request(request).await
    }

    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::failure(
                request.id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                "jsonrpc must be \"2.0\"",
            ));
        }

        let Some(id) = request.id else {
            debug!("Notification: {}", request.method);
            return None;
        };

        debug!("Request {}: {}", id, request.method);
        let outcome = match request.method.as_str() {
            "initialize" => self.initialize(request.params),
            "ping" => Ok(json!({})),
            "tools/list" => self.list_tools(),
            "tools/call" => self.call_tool(request.params).await,
            other => Err((METHOD_NOT_FOUND, format!("Method not found: {}", other))),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err((code, message)) => JsonRpcResponse::failure(id, code, message),
        })
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value, (i32, String)> {
        let request: McpInitializeRequest = parse_params(params)?;
        if let Some(client) = &request.client_info {
            info!("Client connected: {} {}", client.name, client.version);
        }

        let result = McpInitializeResult {
            protocol_version: negotiate_version(request.protocol_version.as_deref()),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: self.info.clone(),
            instructions: Some(INSTRUCTIONS.to_string()),
        };
        to_value(result)
    }

    fn list_tools(&self) -> Result<Value, (i32, String)> {
        let tools = self
            .registry
            .list_tools()
            .into_iter()
            .map(|schema| McpToolInfo {
                name: schema.name,
                description: schema.description,
                input_schema: schema.input_schema,
            })
            .collect();
        to_value(McpToolListResult { tools })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, (i32, String)> {
        let request: McpToolCallRequest = parse_params(params)?;
        let args = request.arguments.unwrap_or(Value::Null);
        info!("Calling tool {}", request.name);

        let result = match self.registry.execute(&request.name, args).await {
            Ok(result) => McpToolCallResult::text(result.result, !result.success),
            Err(ToolError::NotFound(name)) => {
                return Err((INVALID_PARAMS, format!("Unknown tool: {}", name)));
            }
            Err(e) => McpToolCallResult::text(e.to_string(), true),
        };
        to_value(result)
    }
}

/// Echo the client's version when supported, otherwise offer ours.
fn negotiate_version(requested: Option<&str>) -> String {
    match requested {
        Some(version) if SUPPORTED_PROTOCOL_VERSIONS.contains(&version) => version.to_string(),
        Some(version) => {
            warn!(
                "Client requested unsupported protocol version {}; offering {}",
                version, PROTOCOL_VERSION
            );
            PROTOCOL_VERSION.to_string()
        }
        None => PROTOCOL_VERSION.to_string(),
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, (i32, String)> {
    serde_json::from_value(params.unwrap_or_else(|| json!({})))
        .map_err(|e| (INVALID_PARAMS, format!("Invalid params: {}", e)))
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, (i32, String)> {
    serde_json::to_value(value).map_err(|e| (INVALID_REQUEST, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use trail_core::mock::MockCloudTrail;
    use trail_core::StaticClientProvider;
    use trail_tools::{register_cloudtrail_tools, ToolContext};

    fn server() -> McpServer {
        let mock = Arc::new(MockCloudTrail::new());
        let provider = Arc::new(StaticClientProvider::new(mock, "us-east-1"));
        let registry = Arc::new(ToolRegistry::new());
        register_cloudtrail_tools(&registry, Arc::new(ToolContext::new(provider))).unwrap();
        McpServer::new(registry)
    }

    #[tokio::test]
    async fn initialize_advertises_tools() {
        let response = server()
            .handle_message(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26","capabilities":{},"clientInfo":{"name":"test","version":"1"}}}"#,
            )
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], "cloudtrail-mcp");
        assert_eq!(result["capabilities"]["tools"]["listChanged"], false);
    }

    #[tokio::test]
    async fn unsupported_protocol_version_falls_back() {
        let s = server();
        for request in [
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"1999-01-01"}}"#,
            r#"{"jsonrpc":"2.0","id":2,"method":"initialize","params":{}}"#,
        ] {
            let result = s.handle_message(request).await.unwrap().result.unwrap();
            assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        }
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let response = server()
            .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn lists_all_tools_with_schemas() {
        let response = server()
            .handle_message(r#"{"jsonrpc":"2.0","id":"a","method":"tools/list"}"#)
            .await
            .unwrap();

        assert_eq!(response.id, json!("a"));
        let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 5);
        assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
    }

    #[tokio::test]
    async fn tool_call_returns_text_content() {
        let response = server()
            .handle_message(
                r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"lookup_events","arguments":{}}}"#,
            )
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["isError"], false);
        assert_eq!(result["content"][0]["type"], "text");
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Found: 0 event(s)"));
    }

    #[tokio::test]
    async fn invalid_arguments_are_error_results() {
        let response = server()
            .handle_message(
                r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"get_query_status","arguments":{}}}"#,
            )
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Invalid arguments"));
    }

    #[tokio::test]
    async fn unknown_tool_and_method_are_protocol_errors() {
        let s = server();
        let unknown_tool = s
            .handle_message(
                r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"drop_table"}}"#,
            )
            .await
            .unwrap();
        assert_eq!(unknown_tool.error.unwrap().code, INVALID_PARAMS);

        let unknown_method = s
            .handle_message(r#"{"jsonrpc":"2.0","id":5,"method":"resources/list"}"#)
            .await
            .unwrap();
        assert_eq!(unknown_method.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn garbage_is_a_parse_error() {
        let response = server().handle_message("{not json").await.unwrap();
        assert_eq!(response.id, Value::Null);
        assert_eq!(response.error.unwrap().code, PARSE_ERROR);
    }
}
