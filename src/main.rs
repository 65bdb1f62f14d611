// mcp-kubernetes - Main Entry Point
//
// Loads configuration, applies command line overrides, and serves the
// command gateway over the selected MCP transport.

use anyhow::{Context, Result};
use clap::Parser;
use mcp_kubernetes::config::{parse_families, parse_namespaces, Config};
use mcp_kubernetes::mcp::{http_transport, McpServer, StdioTransport, TransportKind};
use mcp_kubernetes::policy::AccessLevel;
use mcp_kubernetes::tools::Gateway;
use mcp_kubernetes::{logging, metrics, metrics_server};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// MCP server for kubectl, helm, cilium and hubble
#[derive(Parser, Debug)]
#[command(name = "mcp-kubernetes")]
#[command(version)]
#[command(about = "MCP server that runs Kubernetes CLI commands under an access policy", long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Transport: stdio or streamable-http
    #[arg(long)]
    transport: Option<TransportKind>,

    /// Bind address for streamable-http
    #[arg(long)]
    host: Option<String>,

    /// Port for streamable-http
    #[arg(long)]
    port: Option<u16>,

    /// Per-command timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Access level: readonly, readwrite or admin
    #[arg(long)]
    access_level: Option<AccessLevel>,

    /// Comma-separated namespaces commands may target
    #[arg(long)]
    allow_namespaces: Option<String>,

    /// Comma-separated optional tools to enable (helm,cilium,hubble)
    #[arg(long)]
    additional_tools: Option<String>,

    /// Also register the grouped kubectl_* tools
    #[arg(long)]
    legacy_tools: bool,

    /// Serve Prometheus metrics on this port
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Flags win over the config file and environment
    fn apply(self, mut config: Config) -> Result<(Config, bool)> {
        if let Some(transport) = self.transport {
            config.server.transport = transport;
        }
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(timeout) = self.timeout {
            config.security.timeout_secs = timeout;
        }
        if let Some(level) = self.access_level {
            config.security.access_level = level;
        }
        if let Some(namespaces) = self.allow_namespaces {
            config.security.allowed_namespaces = parse_namespaces(&namespaces);
        }
        if let Some(tools) = self.additional_tools {
            config.security.additional_tools = parse_families(&tools)?;
        }
        if self.legacy_tools {
            config.security.legacy_tools = true;
        }
        if let Some(port) = self.metrics_port {
            config.metrics.enabled = true;
            config.metrics.port = port;
        }

        config.validate()?;
        Ok((config, self.verbose))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    let (config, verbose) = args.apply(config)?;

    logging::init(&config.logging, verbose)?;
    metrics::init().context("Failed to initialize metrics")?;

    let policy = Arc::new(config.policy());
    info!(
        access_level = %policy.access_level(),
        timeout_secs = policy.timeout_secs(),
        families = ?policy.enabled_families().collect::<Vec<_>>(),
        namespaces = ?policy.allowed_namespaces(),
        "mcp-kubernetes v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if config.metrics.enabled {
        let port = config.metrics.port;
        tokio::spawn(async move {
            if let Err(e) = metrics_server::start_metrics_server([127, 0, 0, 1], port).await {
                error!("Metrics server stopped: {:#}", e);
            }
        });
    }

    let gateway = Arc::new(Gateway::new(policy, config.executor_config()));
    let server = Arc::new(McpServer::new(gateway, config.registry_options()));

    match config.server.transport {
        TransportKind::Stdio => StdioTransport::new(server).run().await,
        TransportKind::StreamableHttp => http_transport::serve(server, config.socket_addr()?).await,
    }
}
