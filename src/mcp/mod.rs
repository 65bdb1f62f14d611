//! MCP (Model Context Protocol) Server
//!
//! Exposes the command gateway to an agent over JSON-RPC 2.0.
//!
//! # Architecture
//!
//! 1. **Protocol Layer** (`protocol`): JSON-RPC 2.0 message types
//! 2. **Registry** (`registry`): tool definitions shown in `tools/list`
//! 3. **Server** (`server`): method dispatch into the gateway
//! 4. **Transports** (`transport`, `http_transport`): stdio and streamable HTTP

pub mod http_transport;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod transport;

pub use protocol::{McpError, McpMethod, McpRequest, McpResponse, Tool, ToolCallParams, ToolResult};
pub use registry::RegistryOptions;
pub use server::McpServer;
pub use transport::StdioTransport;

/// Transport the server listens on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    #[default]
    Stdio,
    StreamableHttp,
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdio" => Ok(Self::Stdio),
            "streamable-http" | "http" => Ok(Self::StreamableHttp),
            "sse" => Err("the sse transport is not supported; use streamable-http".to_string()),
            other => Err(format!(
                "invalid transport '{}'. Must be one of: stdio, streamable-http",
                other
            )),
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => f.write_str("stdio"),
            Self::StreamableHttp => f.write_str("streamable-http"),
        }
    }
}
