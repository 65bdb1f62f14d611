//! Command Authorization & Execution Gateway
//!
//! Turns a tool call into a bounded, authorized child process and returns
//! its output as text.
//!
//! # Pipeline
//!
//! 1. `mapper.rs`: structured parameters to a command line (catalog lookup)
//! 2. `validator.rs`: family, denylist, classification and namespace checks
//! 3. `executor.rs`: one child process under a hard deadline
//!
//! `gateway.rs` composes the three per CLI family. A command can only reach
//! the executor as a [`SafeCommand`], which only the validator constructs.
//!
//! # Example
//!
//! ```no_run
//! use mcp_kubernetes::policy::{AccessLevel, PolicyConfig};
//! use mcp_kubernetes::tools::{ExecutorConfig, Gateway};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let policy = Arc::new(PolicyConfig::new(AccessLevel::ReadOnly, 30));
//!     let gateway = Gateway::new(policy, ExecutorConfig::default());
//!
//!     let mut args = serde_json::Map::new();
//!     args.insert("args".into(), "get pods -n default".into());
//!     let output = gateway.call("call_kubectl", &args).await?;
//!     println!("{}", output);
//!
//!     Ok(())
//! }
//! ```

pub mod catalog;
mod error;
mod executor;
pub mod gateway;
pub mod mapper;
mod timeout;
pub mod validator;

pub use catalog::{ToolGroup, UnknownOperation};
pub use error::GatewayError;
pub use executor::{ExecutionResult, ExecutorConfig, ProcessExecutor, ShellMode, MAX_OUTPUT_SIZE};
pub use gateway::{CommandExecutor, FreeFormGateway, Gateway, KubectlGateway, ToolRequest};
pub use timeout::{ExecutionTimeout, DEFAULT_TIMEOUT_SECS};
pub use validator::{AccessValidator, CommandInvocation, Denial, SafeCommand};
