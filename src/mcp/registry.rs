//! Tool catalogue advertised through `tools/list`
//!
//! What the agent sees depends on the policy: optional families only appear
//! once enabled, and grouped kubectl tools only appear when the access level
//! admits at least one of their operations.

use crate::mcp::protocol::Tool;
use crate::policy::{CommandFamily, PolicyConfig};
use crate::tools::gateway::UNIFIED_KUBECTL_TOOL;
use crate::tools::ToolGroup;
use serde_json::{json, Value};

/// Which tool shapes are registered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryOptions {
    /// Register the grouped `kubectl_*` tools alongside `call_kubectl`
    pub legacy_tools: bool,
}

fn string_schema(properties: &[(&str, &str)]) -> Value {
    let props: serde_json::Map<String, Value> = properties
        .iter()
        .map(|(name, description)| {
            (
                name.to_string(),
                json!({"type": "string", "description": description}),
            )
        })
        .collect();
    let required: Vec<&str> = properties.iter().map(|(name, _)| *name).collect();
    json!({"type": "object", "properties": props, "required": required})
}

fn unified_kubectl_tool(policy: &PolicyConfig) -> Tool {
    Tool {
        name: UNIFIED_KUBECTL_TOOL.to_string(),
        description: format!(
            "Run kubectl commands against the current cluster. Access level: {}.",
            policy.access_level()
        ),
        input_schema: string_schema(&[(
            "args",
            "kubectl arguments without the binary name (e.g., 'get pods -n default', 'describe deployment web')",
        )]),
    }
}

fn group_description(group: ToolGroup) -> &'static str {
    match group {
        ToolGroup::Resources => "Manage Kubernetes resources: get, describe, create, delete, apply, patch, replace, cordon, uncordon, drain, taint",
        ToolGroup::Workloads => "Manage workloads: run, expose, scale, autoscale, rollout",
        ToolGroup::Metadata => "Manage resource metadata: label, annotate, set",
        ToolGroup::Diagnostics => "Diagnose workloads: logs, events, top, exec, cp",
        ToolGroup::Cluster => "Inspect the cluster: cluster-info, api-resources, api-versions, explain",
        ToolGroup::Config => "Configuration and access: diff, auth can-i, certificate approve/deny, config contexts",
    }
}

fn group_tool(group: ToolGroup) -> Tool {
    let operations: Vec<&str> = group.operations().iter().map(|spec| spec.name).collect();
    Tool {
        name: group.tool_name(),
        description: group_description(group).to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "description": "Operation to perform",
                    "enum": operations,
                },
                "resource": {
                    "type": "string",
                    "description": "Resource type, or the sub-command for multi-word operations (e.g., 'status' for rollout)",
                },
                "args": {
                    "type": "string",
                    "description": "Additional arguments (names, flags, -n namespace)",
                },
            },
            "required": ["operation", "resource", "args"],
        }),
    }
}

fn free_form_tool(family: CommandFamily) -> Tool {
    let (description, example) = match family {
        CommandFamily::Helm => (
            "Run Helm package manager commands for Kubernetes",
            "Full helm command to execute (e.g., 'helm list', 'helm install myapp ./chart', 'helm upgrade myapp ./chart')",
        ),
        CommandFamily::Cilium => (
            "Run Cilium CLI commands for network policy and connectivity management",
            "Full cilium command to execute (e.g., 'cilium status', 'cilium endpoint list', 'cilium connectivity test')",
        ),
        CommandFamily::Hubble => (
            "Run Hubble observability commands for network monitoring and debugging",
            "Full hubble command to execute (e.g., 'hubble status', 'hubble observe', 'hubble list nodes')",
        ),
        CommandFamily::Kubectl => (
            "Run kubectl commands",
            "Full kubectl command to execute (e.g., 'kubectl get pods')",
        ),
    };
    Tool {
        name: format!("call_{}", family.binary_name()),
        description: description.to_string(),
        input_schema: string_schema(&[("command", example)]),
    }
}

/// Tools visible under `policy`, in a stable order
pub fn list_tools(policy: &PolicyConfig, options: RegistryOptions) -> Vec<Tool> {
    let mut tools = vec![unified_kubectl_tool(policy)];

    if options.legacy_tools {
        let level = policy.access_level();
        tools.extend(
            ToolGroup::ALL
                .into_iter()
                .filter(|group| level.permits(group.min_classification()))
                .map(group_tool),
        );
    }

    tools.extend(
        policy
            .enabled_families()
            .filter(|family| family.is_optional())
            .map(free_form_tool),
    );
    tools
}
