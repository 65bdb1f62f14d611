//! mcp-kubernetes
//!
//! An MCP server that lets an agent run `kubectl`, `helm`, `cilium` and
//! `hubble` commands under an access policy. Every command is screened by
//! [`tools::AccessValidator`] before a process is spawned.

pub mod config;
pub mod logging;
pub mod mcp;
pub mod metrics;
pub mod metrics_server;
pub mod policy;
pub mod tools;
