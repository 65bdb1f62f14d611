// Configuration File Support
//
// TOML configuration for the mcp-kubernetes server with environment variable
// overrides. The default location is the XDG config directory:
// ~/.config/mcp-kubernetes/config.toml. Command line flags are applied on
// top by main.rs.

use crate::mcp::{RegistryOptions, TransportKind};
use crate::policy::{AccessLevel, CommandFamily, PolicyConfig};
use crate::tools::{ExecutorConfig, ShellMode, DEFAULT_TIMEOUT_SECS, MAX_OUTPUT_SIZE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub execution: ExecutionConfig,

    /// Binary path per CLI family, e.g. `helm = "/usr/local/bin/helm"`
    pub binaries: BTreeMap<CommandFamily, String>,

    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: TransportKind,

    /// Bind address for streamable-http
    pub host: String,

    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Stdio,
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Access policy inputs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SecurityConfig {
    pub access_level: AccessLevel,

    /// Empty means every namespace is allowed
    pub allowed_namespaces: Vec<String>,

    /// Per-command deadline in seconds
    pub timeout_secs: u64,

    /// Optional CLI families to enable (helm, cilium, hubble)
    pub additional_tools: Vec<CommandFamily>,

    /// Also register the grouped `kubectl_*` tools
    pub legacy_tools: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            access_level: AccessLevel::ReadOnly,
            allowed_namespaces: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            additional_tools: Vec::new(),
            legacy_tools: false,
        }
    }
}

/// Process execution options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    pub shell_mode: ShellMode,

    /// Return stderr as the tool result when a command fails
    pub return_err_output: bool,

    pub strip_newlines: bool,

    pub max_output_bytes: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            shell_mode: ShellMode::Direct,
            return_err_output: true,
            strip_newlines: false,
            max_output_bytes: MAX_OUTPUT_SIZE,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse a comma-separated list of optional CLI families
pub fn parse_families(value: &str) -> Result<Vec<CommandFamily>> {
    split_list(value)
        .map(|name| name.parse::<CommandFamily>().map_err(anyhow::Error::msg))
        .collect()
}

/// Parse a comma-separated namespace list
pub fn parse_namespaces(value: &str) -> Vec<String> {
    split_list(value).collect()
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// A missing file yields the defaults (with environment overrides).
    pub fn load() -> Result<Self> {
        Self::load_from_path(Self::config_path())
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed, or if an
    /// environment override or the result fails validation.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Returns `~/.config/mcp-kubernetes/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        match dirs::config_dir() {
            Some(dir) => dir.join("mcp-kubernetes").join("config.toml"),
            None => {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home)
                    .join(".config")
                    .join("mcp-kubernetes")
                    .join("config.toml")
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Environment variables take precedence over config file values:
    /// - MCP_KUBERNETES_ACCESS_LEVEL
    /// - MCP_KUBERNETES_ALLOWED_NAMESPACES (comma-separated)
    /// - MCP_KUBERNETES_TIMEOUT
    /// - MCP_KUBERNETES_ADDITIONAL_TOOLS (comma-separated)
    /// - MCP_KUBERNETES_TRANSPORT, MCP_KUBERNETES_HOST, MCP_KUBERNETES_PORT
    /// - MCP_KUBERNETES_LOG_LEVEL, MCP_KUBERNETES_LOG_FORMAT
    /// - MCP_KUBERNETES_METRICS_ENABLED, MCP_KUBERNETES_METRICS_PORT
    ///
    /// Unlike numeric overrides, a malformed access level or tool list is an
    /// error rather than silently ignored.
    fn apply_env_overrides(mut self) -> Result<Self> {
        if let Ok(level) = std::env::var("MCP_KUBERNETES_ACCESS_LEVEL") {
            self.security.access_level = level.parse().map_err(anyhow::Error::msg)?;
        }
        if let Ok(namespaces) = std::env::var("MCP_KUBERNETES_ALLOWED_NAMESPACES") {
            self.security.allowed_namespaces = parse_namespaces(&namespaces);
        }
        if let Ok(timeout) = std::env::var("MCP_KUBERNETES_TIMEOUT") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                if timeout > 0 {
                    self.security.timeout_secs = timeout;
                }
            }
        }
        if let Ok(tools) = std::env::var("MCP_KUBERNETES_ADDITIONAL_TOOLS") {
            self.security.additional_tools = parse_families(&tools)?;
        }

        if let Ok(transport) = std::env::var("MCP_KUBERNETES_TRANSPORT") {
            self.server.transport = transport.parse().map_err(anyhow::Error::msg)?;
        }
        if let Ok(host) = std::env::var("MCP_KUBERNETES_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("MCP_KUBERNETES_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }

        if let Ok(level) = std::env::var("MCP_KUBERNETES_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("MCP_KUBERNETES_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Ok(enabled) = std::env::var("MCP_KUBERNETES_METRICS_ENABLED") {
            self.metrics.enabled = enabled.parse().unwrap_or(self.metrics.enabled);
        }
        if let Ok(port) = std::env::var("MCP_KUBERNETES_METRICS_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.metrics.port = port;
            }
        }

        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        if self.security.timeout_secs == 0 {
            anyhow::bail!("Command timeout must be > 0 seconds");
        }
        if let Some(family) = self.security.additional_tools.iter().find(|f| !f.is_optional()) {
            anyhow::bail!(
                "'{}' is always enabled and cannot be listed in additional_tools",
                family
            );
        }
        if self.security.allowed_namespaces.iter().any(|ns| ns.trim().is_empty()) {
            anyhow::bail!("Allowed namespaces must not be empty strings");
        }

        if self.execution.max_output_bytes == 0 {
            anyhow::bail!("max_output_bytes must be > 0");
        }
        if let Some((family, _)) = self.binaries.iter().find(|(_, path)| path.trim().is_empty()) {
            anyhow::bail!("Binary path for {} must not be empty", family);
        }

        if self.server.transport == TransportKind::StreamableHttp {
            self.socket_addr()?;
            if self.server.port == 0 {
                anyhow::bail!("Server port must be > 0");
            }
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            anyhow::bail!("Metrics port must be > 0");
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }

    /// Bind address for the HTTP transport
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .server
            .host
            .parse()
            .with_context(|| format!("Invalid host address: {}", self.server.host))?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    /// Immutable access policy for the gateway
    pub fn policy(&self) -> PolicyConfig {
        PolicyConfig::new(self.security.access_level, self.security.timeout_secs)
            .with_allowed_namespaces(self.security.allowed_namespaces.iter().cloned())
            .with_families(self.security.additional_tools.iter().copied())
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        let mut config = ExecutorConfig::default()
            .max_output_size(self.execution.max_output_bytes)
            .return_err_output(self.execution.return_err_output)
            .strip_newlines(self.execution.strip_newlines)
            .shell_mode(self.execution.shell_mode);
        for (family, path) in &self.binaries {
            config = config.binary(*family, path.clone());
        }
        config
    }

    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            legacy_tools: self.security.legacy_tools,
        }
    }
}
