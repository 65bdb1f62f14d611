//! Operation Catalog
//!
//! Static tables describing every operation the gateway knows about and
//! the risk classification attached to it.
//!
//! The kubectl tables serve two purposes:
//! 1. Structured tool calls (`operation` + `resource` + `args`) look up their
//!    command template here.
//! 2. Free-form command lines are classified by matching their leading verb
//!    (and sub-command) against the same tables.
//!
//! # Principle: Conservative Default
//!
//! A verb that appears in no table is classified [`Classification::NodeAdmin`],
//! so only an `admin` server will ever run it.

use crate::policy::{Classification, CommandFamily};
use std::fmt;

use Classification::{NodeAdmin, ReadOnly, Write};

/// A structured operation could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct UnknownOperation(pub String);

/// How the `resource` parameter of a structured call is used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceHandling {
    /// Appended after the verb (`get pods`)
    Positional,

    /// Dropped even when supplied (`logs`, `exec`, `cluster-info`, ...)
    Suppressed,

    /// Names a sub-command and becomes part of the template (`rollout status`)
    Subcommand(&'static [(&'static str, Classification)]),
}

/// One operation of a tool group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationSpec {
    pub name: &'static str,
    pub classification: Classification,
    pub resource: ResourceHandling,
}

const fn op(name: &'static str, classification: Classification) -> OperationSpec {
    OperationSpec {
        name,
        classification,
        resource: ResourceHandling::Positional,
    }
}

const fn op_no_resource(name: &'static str, classification: Classification) -> OperationSpec {
    OperationSpec {
        name,
        classification,
        resource: ResourceHandling::Suppressed,
    }
}

const fn op_with_subcommands(
    name: &'static str,
    subcommands: &'static [(&'static str, Classification)],
) -> OperationSpec {
    OperationSpec {
        name,
        classification: NodeAdmin,
        resource: ResourceHandling::Subcommand(subcommands),
    }
}

const ROLLOUT_SUBCOMMANDS: &[(&str, Classification)] = &[
    ("status", ReadOnly),
    ("history", ReadOnly),
    ("undo", Write),
    ("restart", Write),
    ("pause", Write),
    ("resume", Write),
];

const AUTH_SUBCOMMANDS: &[(&str, Classification)] = &[("can-i", ReadOnly)];

const CERTIFICATE_SUBCOMMANDS: &[(&str, Classification)] =
    &[("approve", NodeAdmin), ("deny", NodeAdmin)];

const CONFIG_SUBCOMMANDS: &[(&str, Classification)] = &[
    ("current-context", ReadOnly),
    ("get-contexts", ReadOnly),
    ("use-context", Write),
];

const RESOURCES_OPS: &[OperationSpec] = &[
    op("get", ReadOnly),
    op("describe", ReadOnly),
    op("create", Write),
    op("delete", Write),
    op("apply", Write),
    op("patch", Write),
    op("replace", Write),
    op("cordon", NodeAdmin),
    op("uncordon", NodeAdmin),
    op("drain", NodeAdmin),
    op("taint", NodeAdmin),
];

const WORKLOADS_OPS: &[OperationSpec] = &[
    op_no_resource("run", Write),
    op("expose", Write),
    op("scale", Write),
    op("autoscale", Write),
    op_with_subcommands("rollout", ROLLOUT_SUBCOMMANDS),
];

const METADATA_OPS: &[OperationSpec] = &[
    op("label", Write),
    op("annotate", Write),
    op("set", Write),
];

const DIAGNOSTICS_OPS: &[OperationSpec] = &[
    op_no_resource("logs", ReadOnly),
    op_no_resource("events", ReadOnly),
    op("top", ReadOnly),
    op_no_resource("exec", Write),
    op_no_resource("cp", Write),
];

const CLUSTER_OPS: &[OperationSpec] = &[
    op_no_resource("cluster-info", ReadOnly),
    op_no_resource("api-resources", ReadOnly),
    op_no_resource("api-versions", ReadOnly),
    op("explain", ReadOnly),
];

const CONFIG_OPS: &[OperationSpec] = &[
    op_no_resource("diff", ReadOnly),
    op_with_subcommands("auth", AUTH_SUBCOMMANDS),
    op_with_subcommands("certificate", CERTIFICATE_SUBCOMMANDS),
    op_with_subcommands("config", CONFIG_SUBCOMMANDS),
];

/// Grouped kubectl tools exposed to the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolGroup {
    Resources,
    Workloads,
    Metadata,
    Diagnostics,
    Cluster,
    Config,
}

impl ToolGroup {
    pub const ALL: [ToolGroup; 6] = [
        Self::Resources,
        Self::Workloads,
        Self::Metadata,
        Self::Diagnostics,
        Self::Cluster,
        Self::Config,
    ];

    /// Accepts both `workloads` and `kubectl_workloads`
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.strip_prefix("kubectl_").unwrap_or(name);
        match name {
            "resources" => Some(Self::Resources),
            "workloads" => Some(Self::Workloads),
            "metadata" => Some(Self::Metadata),
            "diagnostics" => Some(Self::Diagnostics),
            "cluster" => Some(Self::Cluster),
            "config" => Some(Self::Config),
            _ => None,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Resources => "resources",
            Self::Workloads => "workloads",
            Self::Metadata => "metadata",
            Self::Diagnostics => "diagnostics",
            Self::Cluster => "cluster",
            Self::Config => "config",
        }
    }

    /// MCP tool name for the group
    pub fn tool_name(&self) -> String {
        format!("kubectl_{}", self.short_name())
    }

    pub fn operations(&self) -> &'static [OperationSpec] {
        match self {
            Self::Resources => RESOURCES_OPS,
            Self::Workloads => WORKLOADS_OPS,
            Self::Metadata => METADATA_OPS,
            Self::Diagnostics => DIAGNOSTICS_OPS,
            Self::Cluster => CLUSTER_OPS,
            Self::Config => CONFIG_OPS,
        }
    }

    /// Lowest classification of any operation (or sub-command) in the group
    pub fn min_classification(&self) -> Classification {
        self.operations()
            .iter()
            .flat_map(|spec| match spec.resource {
                ResourceHandling::Subcommand(subs) => subs.iter().map(|(_, c)| *c).collect(),
                _ => vec![spec.classification],
            })
            .min()
            .unwrap_or(NodeAdmin)
    }
}

impl fmt::Display for ToolGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// A resolved structured operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Command template without the binary (`get`, `rollout status`)
    pub template: String,
    pub classification: Classification,
    /// Whether the resource parameter is appended after the template
    pub takes_resource: bool,
}

/// Resolve `(group, operation, resource)` to a command template
pub fn lookup(group: &str, operation: &str, resource: &str) -> Result<CatalogEntry, UnknownOperation> {
    let group = ToolGroup::from_name(group)
        .ok_or_else(|| UnknownOperation(format!("unknown tool: {}", group)))?;

    let spec = group
        .operations()
        .iter()
        .find(|spec| spec.name == operation)
        .ok_or_else(|| {
            let valid: Vec<&str> = group.operations().iter().map(|s| s.name).collect();
            UnknownOperation(format!(
                "invalid operation '{}' for {} tool. Valid operations: {}",
                operation,
                group,
                valid.join(", ")
            ))
        })?;

    match spec.resource {
        ResourceHandling::Positional => Ok(CatalogEntry {
            template: spec.name.to_string(),
            classification: spec.classification,
            takes_resource: true,
        }),
        ResourceHandling::Suppressed => Ok(CatalogEntry {
            template: spec.name.to_string(),
            classification: spec.classification,
            takes_resource: false,
        }),
        ResourceHandling::Subcommand(subs) => {
            let resource = resource.trim();
            let (sub, classification) = subs
                .iter()
                .find(|(name, _)| *name == resource)
                .ok_or_else(|| invalid_subcommand(spec.name, resource, subs))?;
            Ok(CatalogEntry {
                template: format!("{} {}", spec.name, sub),
                classification: *classification,
                takes_resource: false,
            })
        }
    }
}

fn invalid_subcommand(
    operation: &str,
    resource: &str,
    subs: &[(&'static str, Classification)],
) -> UnknownOperation {
    if subs.len() == 1 {
        return UnknownOperation(format!(
            "{} operation requires '{}' as resource",
            operation, subs[0].0
        ));
    }
    let valid: Vec<&str> = subs.iter().map(|(name, _)| *name).collect();
    UnknownOperation(format!(
        "invalid {} subcommand '{}'. Valid subcommands: {}",
        operation,
        resource,
        valid.join(", ")
    ))
}

/// Verb rule for free-form classification: `(verb, sub-command, classification)`
type VerbRule = (&'static str, Option<&'static str>, Classification);

// Kubectl verbs outside the grouped tools
const KUBECTL_EXTRA_VERBS: &[VerbRule] = &[
    ("version", None, ReadOnly),
    ("wait", None, ReadOnly),
    ("kustomize", None, ReadOnly),
    ("config", Some("view"), ReadOnly),
    ("config", Some("get-clusters"), ReadOnly),
    ("config", Some("get-users"), ReadOnly),
    ("port-forward", None, Write),
    ("attach", None, Write),
    ("edit", None, Write),
    ("debug", None, NodeAdmin),
];

const HELM_VERBS: &[VerbRule] = &[
    ("list", None, ReadOnly),
    ("ls", None, ReadOnly),
    ("get", None, ReadOnly),
    ("status", None, ReadOnly),
    ("history", None, ReadOnly),
    ("search", None, ReadOnly),
    ("template", None, ReadOnly),
    ("show", None, ReadOnly),
    ("verify", None, ReadOnly),
    ("env", None, ReadOnly),
    ("version", None, ReadOnly),
    ("lint", None, ReadOnly),
    ("install", None, Write),
    ("upgrade", None, Write),
    ("rollback", None, Write),
    ("uninstall", None, Write),
    ("test", None, Write),
    ("repo", None, NodeAdmin),
    ("push", None, NodeAdmin),
    ("dependency", None, NodeAdmin),
    ("package", None, NodeAdmin),
    ("registry", None, NodeAdmin),
    ("pull", None, NodeAdmin),
    ("plugin", None, NodeAdmin),
];

const CILIUM_VERBS: &[VerbRule] = &[
    ("status", None, ReadOnly),
    ("version", None, ReadOnly),
    ("context", None, ReadOnly),
    ("config", Some("view"), ReadOnly),
    ("endpoint", Some("list"), ReadOnly),
    ("endpoint", Some("get"), ReadOnly),
    ("policy", Some("get"), ReadOnly),
    ("service", Some("list"), ReadOnly),
    ("service", Some("get"), ReadOnly),
    ("identity", Some("list"), ReadOnly),
    ("identity", Some("get"), ReadOnly),
    ("node", Some("list"), ReadOnly),
    ("bgp", Some("peers"), ReadOnly),
    ("bgp", Some("routes"), ReadOnly),
    ("clustermesh", Some("status"), ReadOnly),
    ("encryption", Some("status"), ReadOnly),
    ("features", Some("status"), ReadOnly),
    ("hubble", Some("port-forward"), Write),
    ("config", Some("set"), Write),
    ("config", Some("delete"), Write),
    ("connectivity", Some("test"), Write),
    ("sysdump", None, Write),
    ("install", None, NodeAdmin),
    ("uninstall", None, NodeAdmin),
    ("upgrade", None, NodeAdmin),
    ("hubble", Some("enable"), NodeAdmin),
    ("hubble", Some("disable"), NodeAdmin),
    ("clustermesh", Some("enable"), NodeAdmin),
    ("clustermesh", Some("disable"), NodeAdmin),
    ("clustermesh", Some("connect"), NodeAdmin),
    ("clustermesh", Some("disconnect"), NodeAdmin),
];

const HUBBLE_VERBS: &[VerbRule] = &[
    ("observe", None, ReadOnly),
    ("status", None, ReadOnly),
    ("list", None, ReadOnly),
    ("version", None, ReadOnly),
    ("watch", None, ReadOnly),
    ("config", Some("view"), ReadOnly),
    ("config", Some("get"), ReadOnly),
    ("config", Some("set"), Write),
    ("config", Some("reset"), Write),
];

/// Global flags a family's CLI accepts before its verb
struct GlobalFlags {
    /// Flags that consume the following token (or an attached `=value`)
    with_value: &'static [&'static str],
    /// Switches that take no value
    switches: &'static [&'static str],
}

const KUBECTL_FLAGS: GlobalFlags = GlobalFlags {
    with_value: &[
        "-n",
        "--namespace",
        "--context",
        "--kubeconfig",
        "--cluster",
        "--user",
        "-s",
        "--server",
        "--token",
        "--cache-dir",
        "--request-timeout",
        "--certificate-authority",
        "--client-certificate",
        "--client-key",
        "--tls-server-name",
        "--username",
        "--password",
        "-v",
        "--v",
    ],
    switches: &[
        "--insecure-skip-tls-verify",
        "--match-server-version",
        "--warnings-as-errors",
        "--disable-compression",
        "-h",
        "--help",
    ],
};

const HELM_FLAGS: GlobalFlags = GlobalFlags {
    with_value: &[
        "-n",
        "--namespace",
        "--kube-context",
        "--kubeconfig",
        "--kube-apiserver",
        "--kube-token",
        "--kube-ca-file",
        "--kube-tls-server-name",
        "--registry-config",
        "--repository-config",
        "--repository-cache",
        "--burst-limit",
        "--qps",
    ],
    switches: &["--debug", "--kube-insecure-skip-tls-verify", "-h", "--help"],
};

const CILIUM_FLAGS: GlobalFlags = GlobalFlags {
    with_value: &["-n", "--namespace", "--context", "--kubeconfig"],
    switches: &["--debug", "-h", "--help"],
};

const HUBBLE_FLAGS: GlobalFlags = GlobalFlags {
    with_value: &[
        "--server",
        "--config",
        "--timeout",
        "--request-timeout",
        "--tls-server-name",
    ],
    switches: &["--debug", "-D", "--tls", "--tls-allow-insecure", "-h", "--help"],
};

fn global_flags(family: CommandFamily) -> &'static GlobalFlags {
    match family {
        CommandFamily::Kubectl => &KUBECTL_FLAGS,
        CommandFamily::Helm => &HELM_FLAGS,
        CommandFamily::Cilium => &CILIUM_FLAGS,
        CommandFamily::Hubble => &HUBBLE_FLAGS,
    }
}

/// How a flag token affects the tokens after it
enum FlagArity {
    /// Value attached or none needed
    Complete,
    /// The next token is the value
    TakesNext,
    /// Not a flag we know; the next token may or may not be its value
    Unknown,
}

impl GlobalFlags {
    fn arity(&self, token: &str) -> FlagArity {
        if token.starts_with("--") && token.contains('=') {
            return FlagArity::Complete;
        }
        if self.with_value.contains(&token) {
            return FlagArity::TakesNext;
        }
        if self.switches.contains(&token) {
            return FlagArity::Complete;
        }
        // `-nweb`, `-n=web`, `-v=4`
        let attached_short = !token.starts_with("--")
            && token.len() > 2
            && token
                .get(..2)
                .is_some_and(|short| self.with_value.contains(&short));
        if attached_short {
            FlagArity::Complete
        } else {
            FlagArity::Unknown
        }
    }
}

/// Classification of a free-form command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerbClassification {
    /// The verb as matched (`get`, `rollout status`), or the raw first word
    pub verb: String,
    pub classification: Classification,
}

/// A positional word and whether its position is certain
///
/// After an unrecognised flag the word may really be that flag's value, so
/// the CLI could run a different verb than the one read here.
struct Word<'a> {
    text: &'a str,
    uncertain: bool,
}

/// Positional words of a tokenized command, skipping an optional leading
/// binary name and global flags with their values
fn positional_words<'a>(family: CommandFamily, tokens: &'a [String]) -> Vec<Word<'a>> {
    let flags = global_flags(family);
    let mut words = Vec::new();
    let mut uncertain = false;
    let mut iter = tokens.iter().map(String::as_str).peekable();

    if iter.peek() == Some(&family.binary_name()) {
        iter.next();
    }

    while let Some(token) = iter.next() {
        if token.starts_with('-') && token.len() > 1 {
            match flags.arity(token) {
                FlagArity::Complete => {}
                FlagArity::TakesNext => {
                    iter.next();
                }
                FlagArity::Unknown => uncertain = true,
            }
            continue;
        }
        words.push(Word {
            text: token,
            uncertain,
        });
        if words.len() == 2 {
            break;
        }
    }
    words
}

/// Whether any rule for `verb` depends on its sub-command
fn has_subcommand_rules(family: CommandFamily, verb: &str) -> bool {
    let in_rules = |rules: &[VerbRule]| rules.iter().any(|(v, s, _)| *v == verb && s.is_some());
    match family {
        CommandFamily::Kubectl => {
            ToolGroup::ALL
                .iter()
                .flat_map(|group| group.operations().iter())
                .any(|spec| spec.name == verb && matches!(spec.resource, ResourceHandling::Subcommand(_)))
                || in_rules(KUBECTL_EXTRA_VERBS)
        }
        CommandFamily::Helm => in_rules(HELM_VERBS),
        CommandFamily::Cilium => in_rules(CILIUM_VERBS),
        CommandFamily::Hubble => in_rules(HUBBLE_VERBS),
    }
}

fn match_rules(rules: &[VerbRule], verb: &str, sub: Option<&str>) -> Option<VerbClassification> {
    if let Some(sub) = sub {
        if let Some((_, _, class)) = rules
            .iter()
            .find(|(v, s, _)| *v == verb && *s == Some(sub))
        {
            return Some(VerbClassification {
                verb: format!("{} {}", verb, sub),
                classification: *class,
            });
        }
    }
    rules
        .iter()
        .find(|(v, s, _)| *v == verb && s.is_none())
        .map(|(_, _, class)| VerbClassification {
            verb: verb.to_string(),
            classification: *class,
        })
}

fn match_kubectl_groups(verb: &str, sub: Option<&str>) -> Option<VerbClassification> {
    let spec = ToolGroup::ALL
        .iter()
        .flat_map(|group| group.operations().iter())
        .find(|spec| spec.name == verb)?;

    match spec.resource {
        ResourceHandling::Subcommand(subs) => {
            let sub = sub?;
            subs.iter()
                .find(|(name, _)| *name == sub)
                .map(|(name, class)| VerbClassification {
                    verb: format!("{} {}", verb, name),
                    classification: *class,
                })
        }
        _ => Some(VerbClassification {
            verb: verb.to_string(),
            classification: spec.classification,
        }),
    }
}

/// Classify a tokenized free-form command by its leading verb
///
/// Unknown verbs, and verbs whose position an unrecognised flag makes
/// ambiguous, classify as NodeAdmin.
pub fn classify(family: CommandFamily, tokens: &[String]) -> VerbClassification {
    let words = positional_words(family, tokens);
    let Some(first) = words.first() else {
        // A bare binary invocation only prints usage
        return VerbClassification {
            verb: String::new(),
            classification: ReadOnly,
        };
    };
    let verb = first.text;
    let raw_verb = || match words.get(1) {
        Some(sub) => format!("{} {}", verb, sub.text),
        None => verb.to_string(),
    };

    if first.uncertain {
        return VerbClassification {
            verb: raw_verb(),
            classification: NodeAdmin,
        };
    }
    let sub = match words.get(1) {
        Some(word) if word.uncertain => {
            if has_subcommand_rules(family, verb) {
                return VerbClassification {
                    verb: raw_verb(),
                    classification: NodeAdmin,
                };
            }
            None
        }
        Some(word) => Some(word.text),
        None => None,
    };

    let matched = match family {
        CommandFamily::Kubectl => {
            match_kubectl_groups(verb, sub).or_else(|| match_rules(KUBECTL_EXTRA_VERBS, verb, sub))
        }
        CommandFamily::Helm => match_rules(HELM_VERBS, verb, sub),
        CommandFamily::Cilium => match_rules(CILIUM_VERBS, verb, sub),
        CommandFamily::Hubble => match_rules(HUBBLE_VERBS, verb, sub),
    };

    matched.unwrap_or_else(|| VerbClassification {
        verb: raw_verb(),
        classification: NodeAdmin,
    })
}
