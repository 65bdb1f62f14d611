//! Gateway Facade
//!
//! One [`CommandExecutor`] per CLI family composes mapper, validator and
//! process executor. Tool parameters are parsed once into a [`ToolRequest`]
//! at the boundary; nothing downstream sees raw JSON.

use super::catalog::ToolGroup;
use super::error::GatewayError;
use super::executor::{ExecutorConfig, ProcessExecutor};
use super::mapper;
use super::timeout::ExecutionTimeout;
use super::validator::{AccessValidator, CommandInvocation};
use crate::metrics;
use crate::policy::{CommandFamily, PolicyConfig};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Unified kubectl tool taking the whole argument string
pub const UNIFIED_KUBECTL_TOOL: &str = "call_kubectl";

/// Tool parameters after shape validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRequest {
    /// `{command}`: helm, cilium, hubble and the legacy `kubectl` tool
    FreeForm { command: String },

    /// `{args}`: `call_kubectl`
    Unified { args: String },

    /// `{operation, resource, args}`: the grouped `kubectl_*` tools
    Structured {
        group: ToolGroup,
        operation: String,
        resource: String,
        args: String,
    },
}

/// Family that serves a tool name, if any
pub fn family_for_tool(tool_name: &str) -> Option<CommandFamily> {
    match tool_name {
        UNIFIED_KUBECTL_TOOL | "kubectl" => Some(CommandFamily::Kubectl),
        name if name.starts_with("kubectl_") => {
            ToolGroup::from_name(name).map(|_| CommandFamily::Kubectl)
        }
        name => name
            .strip_prefix("call_")
            .unwrap_or(name)
            .parse::<CommandFamily>()
            .ok(),
    }
}

/// Canonical spelling of a tool name, used as a metric label
///
/// Family tools resolve in any letter case and with or without the `call_`
/// prefix; every spelling collapses to `call_<family>`.
pub fn canonical_tool_name(tool_name: &str) -> Option<String> {
    match tool_name {
        UNIFIED_KUBECTL_TOOL | "kubectl" => Some(tool_name.to_string()),
        name if name.starts_with("kubectl_") => ToolGroup::from_name(name).map(|group| group.tool_name()),
        name => family_for_tool(name).map(|family| format!("call_{}", family)),
    }
}

fn required_string(arguments: &Map<String, Value>, key: &str) -> Result<String, GatewayError> {
    match arguments.get(key) {
        Some(Value::String(value)) => Ok(value.clone()),
        _ => Err(GatewayError::ParameterShape(format!(
            "{} parameter is required and must be a string",
            key
        ))),
    }
}

impl ToolRequest {
    /// Validate the argument map for a tool
    pub fn parse(tool_name: &str, arguments: &Map<String, Value>) -> Result<Self, GatewayError> {
        if tool_name == UNIFIED_KUBECTL_TOOL {
            return Ok(Self::Unified {
                args: required_string(arguments, "args")?,
            });
        }

        if let Some(group) = tool_name
            .strip_prefix("kubectl_")
            .and_then(ToolGroup::from_name)
        {
            return Ok(Self::Structured {
                group,
                operation: required_string(arguments, "operation")?,
                resource: required_string(arguments, "resource")?,
                args: required_string(arguments, "args")?,
            });
        }

        match family_for_tool(tool_name) {
            Some(_) => Ok(Self::FreeForm {
                command: required_string(arguments, "command")?,
            }),
            None => Err(GatewayError::ParameterShape(format!("unknown tool: {}", tool_name))),
        }
    }
}

/// Execution capability for one CLI family
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    fn family(&self) -> CommandFamily;

    async fn execute(&self, request: ToolRequest) -> Result<String, GatewayError>;
}

/// Kubectl: unified, structured and free-form requests
pub struct KubectlGateway {
    validator: AccessValidator,
    executor: Arc<ProcessExecutor>,
}

impl KubectlGateway {
    pub fn new(validator: AccessValidator, executor: Arc<ProcessExecutor>) -> Self {
        Self { validator, executor }
    }

    fn invocation(&self, request: ToolRequest) -> Result<CommandInvocation, GatewayError> {
        match request {
            ToolRequest::Unified { args } => Ok(CommandInvocation::free_form(
                CommandFamily::Kubectl,
                mapper::unified(&args),
            )),
            ToolRequest::FreeForm { command } => {
                Ok(CommandInvocation::free_form(CommandFamily::Kubectl, command))
            }
            ToolRequest::Structured {
                group,
                operation,
                resource,
                args,
            } => {
                let mapped = mapper::build_command(group.short_name(), &operation, &resource, &args)?;
                debug!(tool = %group.tool_name(), command = %mapped.command_line, "Mapped structured call");
                Ok(CommandInvocation::structured(
                    mapped.command_line,
                    mapped.classification,
                ))
            }
        }
    }
}

#[async_trait]
impl CommandExecutor for KubectlGateway {
    fn family(&self) -> CommandFamily {
        CommandFamily::Kubectl
    }

    async fn execute(&self, request: ToolRequest) -> Result<String, GatewayError> {
        let invocation = self.invocation(request)?;
        let approved = self.validator.validate(&invocation)?;
        self.executor.run(&approved).await
    }
}

/// Helm, cilium and hubble: `{command}` only
pub struct FreeFormGateway {
    family: CommandFamily,
    validator: AccessValidator,
    executor: Arc<ProcessExecutor>,
}

impl FreeFormGateway {
    pub fn new(family: CommandFamily, validator: AccessValidator, executor: Arc<ProcessExecutor>) -> Self {
        Self {
            family,
            validator,
            executor,
        }
    }
}

#[async_trait]
impl CommandExecutor for FreeFormGateway {
    fn family(&self) -> CommandFamily {
        self.family
    }

    async fn execute(&self, request: ToolRequest) -> Result<String, GatewayError> {
        let ToolRequest::FreeForm { command } = request else {
            return Err(GatewayError::ParameterShape(format!(
                "{} tools accept only a command parameter",
                self.family
            )));
        };
        let approved = self
            .validator
            .validate(&CommandInvocation::free_form(self.family, command))?;
        self.executor.run(&approved).await
    }
}

/// Family dispatch used by the MCP server
pub struct Gateway {
    executors: HashMap<CommandFamily, Arc<dyn CommandExecutor>>,
    policy: Arc<PolicyConfig>,
}

impl Gateway {
    /// Build one executor per family sharing the policy and process executor
    ///
    /// Every process runs under the policy's timeout. Disabled families are
    /// still wired up; their requests are refused by the validator with a
    /// family-disabled denial.
    pub fn new(policy: Arc<PolicyConfig>, config: ExecutorConfig) -> Self {
        let validator = AccessValidator::new(policy.clone());
        let deadline = ExecutionTimeout::from_secs(policy.timeout_secs());
        let process = Arc::new(ProcessExecutor::new(config, deadline));

        let mut executors: HashMap<CommandFamily, Arc<dyn CommandExecutor>> = HashMap::new();
        executors.insert(
            CommandFamily::Kubectl,
            Arc::new(KubectlGateway::new(validator.clone(), process.clone())),
        );
        for family in CommandFamily::OPTIONAL {
            executors.insert(
                family,
                Arc::new(FreeFormGateway::new(family, validator.clone(), process.clone())),
            );
        }

        Self { executors, policy }
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Parse, authorize and run one tool call
    pub async fn call(&self, tool_name: &str, arguments: &Map<String, Value>) -> Result<String, GatewayError> {
        let family = family_for_tool(tool_name)
            .ok_or_else(|| GatewayError::ParameterShape(format!("unknown tool: {}", tool_name)))?;
        let request = ToolRequest::parse(tool_name, arguments)?;
        let executor = self
            .executors
            .get(&family)
            .ok_or_else(|| GatewayError::ParameterShape(format!("unknown tool: {}", tool_name)))?;

        let result = executor.execute(request).await;
        if let Err(GatewayError::Denied(denial)) = &result {
            metrics::record_denial(denial.reason());
        }
        result
    }
}
