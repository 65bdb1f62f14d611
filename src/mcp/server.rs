//! MCP request dispatcher
//!
//! Transport-agnostic: both the stdio and HTTP transports hand every decoded
//! message to [`McpServer::handle`]. The server holds no per-request state,
//! so one instance is shared across all concurrent requests.

use crate::mcp::protocol::{
    InitializeResult, McpError, McpMethod, McpRequest, McpResponse, ServerInfo, ToolCallParams,
    ToolResult, JSONRPC_VERSION, PROTOCOL_VERSION,
};
use crate::mcp::registry::{self, RegistryOptions};
use crate::metrics;
use crate::tools::gateway::canonical_tool_name;
use crate::tools::Gateway;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Server name reported during `initialize`
pub const SERVER_NAME: &str = "mcp-kubernetes";

pub struct McpServer {
    gateway: Arc<Gateway>,
    options: RegistryOptions,
}

impl McpServer {
    pub fn new(gateway: Arc<Gateway>, options: RegistryOptions) -> Self {
        Self { gateway, options }
    }

    /// Decode one JSON text and dispatch it
    ///
    /// Returns `None` for notifications.
    pub async fn handle_text(&self, text: &str) -> Option<McpResponse> {
        match serde_json::from_str::<McpRequest>(text) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                warn!("Rejecting malformed message: {}", e);
                Some(McpResponse::err(
                    Value::Null,
                    McpError::parse_error(format!("Parse error: {}", e)),
                ))
            }
        }
    }

    /// Dispatch a decoded request
    pub async fn handle(&self, request: McpRequest) -> Option<McpResponse> {
        let method = McpMethod::from(request.method.as_str());
        let Some(id) = request.id.clone() else {
            debug!(method = %request.method, "Notification received");
            return None;
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(McpResponse::err(
                id,
                McpError::invalid_request(format!("unsupported jsonrpc version '{}'", request.jsonrpc)),
            ));
        }

        let result = match method {
            McpMethod::Initialize => Ok(self.initialize()),
            McpMethod::Ping => Ok(json!({})),
            McpMethod::ToolsList => Ok(self.list_tools()),
            McpMethod::ToolsCall => self.call_tool(request.params).await,
            McpMethod::Initialized | McpMethod::Custom(_) => {
                Err(McpError::method_not_found(request.method.as_str()))
            }
        };

        Some(match result {
            Ok(value) => McpResponse::ok(id, value),
            Err(error) => McpResponse::err(id, error),
        })
    }

    fn initialize(&self) -> Value {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: json!({"tools": {"listChanged": false}}),
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        serde_json::to_value(result).unwrap_or(Value::Null)
    }

    fn list_tools(&self) -> Value {
        let tools = registry::list_tools(self.gateway.policy(), self.options);
        json!({ "tools": tools })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params: ToolCallParams = params
            .ok_or_else(|| McpError::invalid_params("tools/call requires params"))
            .and_then(|p| {
                serde_json::from_value(p)
                    .map_err(|e| McpError::invalid_params(format!("invalid tools/call params: {}", e)))
            })?;

        let Some(label) = canonical_tool_name(&params.name) else {
            return Err(McpError::invalid_params(format!("Unknown tool: {}", params.name)));
        };
        let Value::Object(arguments) = params.arguments else {
            return Err(McpError::invalid_params("tool arguments must be an object"));
        };

        let started = Instant::now();
        let result = match self.gateway.call(&params.name, &arguments).await {
            Ok(text) => {
                info!(tool = %params.name, elapsed_ms = started.elapsed().as_millis() as u64, "Tool call succeeded");
                metrics::record_tool_call(&label, "success");
                ToolResult::text(text)
            }
            Err(e) => {
                info!(tool = %params.name, kind = e.kind(), "Tool call failed: {}", e);
                metrics::record_tool_call(&label, e.kind());
                ToolResult::error(e.to_string())
            }
        };

        serde_json::to_value(result).map_err(|e| McpError::internal_error(e.to_string()))
    }
}
