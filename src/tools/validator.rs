//! Access Policy Validator
//!
//! Decides whether a fully built command line may run under the current
//! [`PolicyConfig`]. Approval produces a [`SafeCommand`], the only value the
//! executor accepts, so a command can never run without having been checked
//! in exactly the form it will be spawned.
//!
//! # Decision Procedure
//!
//! Checks run in order and the first failure wins:
//!
//! 1. **Family enablement**: optional CLIs must be switched on
//! 2. **Denylist**: shell chaining, recursive deletion, credential dumping and
//!    privilege escalation fragments are refused at every access level.
//!    Kubectl commands naming Secrets are then checked token by token so
//!    that no output format other than `name` or `wide` gets through
//! 3. **Classification**: the operation's risk label must be admitted by the
//!    access level
//! 4. **Namespace**: every namespace flag must name an allowed namespace
//!
//! The validator holds only an `Arc` to the immutable policy and may be shared
//! freely between concurrent requests.

use crate::policy::{AccessLevel, Classification, CommandFamily, PolicyConfig};
use crate::tools::catalog;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a command was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    #[error("Error: {family} commands are not enabled. Enable them with --additional-tools {family}")]
    FamilyDisabled { family: CommandFamily },

    #[error("Error: Command rejected by security policy: {description} (rule '{rule}', matched '{fragment}')")]
    DangerousPattern {
        rule: &'static str,
        description: &'static str,
        fragment: String,
    },

    #[error(
        "Error: Operation '{verb}' is classified {classification} and requires access level \
         '{required}'; the server is running at '{current}'"
    )]
    InsufficientAccessLevel {
        verb: String,
        classification: Classification,
        required: AccessLevel,
        current: AccessLevel,
    },

    #[error("Error: Access to namespace '{namespace}' is denied by security configuration")]
    NamespaceNotAllowed { namespace: String },
}

impl Denial {
    /// Metric label for the denial reason
    pub fn reason(&self) -> &'static str {
        match self {
            Self::FamilyDisabled { .. } => "family_disabled",
            Self::DangerousPattern { .. } => "dangerous_pattern",
            Self::InsufficientAccessLevel { .. } => "insufficient_access_level",
            Self::NamespaceNotAllowed { .. } => "namespace_not_allowed",
        }
    }
}

/// A command waiting for a verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub family: CommandFamily,
    pub command_line: String,
    /// Catalog classification for structured calls; free-form calls leave
    /// this empty and are classified by their leading verb
    pub classification: Option<Classification>,
}

impl CommandInvocation {
    pub fn free_form(family: CommandFamily, command_line: impl Into<String>) -> Self {
        Self {
            family,
            command_line: command_line.into(),
            classification: None,
        }
    }

    pub fn structured(command_line: impl Into<String>, classification: Classification) -> Self {
        Self {
            family: CommandFamily::Kubectl,
            command_line: command_line.into(),
            classification: Some(classification),
        }
    }
}

/// A command line that passed validation
///
/// Fields are private and there is no public constructor: the only way to
/// obtain one is [`AccessValidator::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeCommand {
    family: CommandFamily,
    command_line: String,
    classification: Classification,
    argv: Vec<String>,
}

impl SafeCommand {
    pub fn family(&self) -> CommandFamily {
        self.family
    }

    /// The exact string that was validated
    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    /// Shell-word split of the validated command line
    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

struct DenyRule {
    id: &'static str,
    description: &'static str,
    pattern: Regex,
}

impl DenyRule {
    fn new(id: &'static str, description: &'static str, pattern: &str) -> Self {
        Self {
            id,
            description,
            // Patterns are literals checked by the test suite
            pattern: Regex::new(pattern).unwrap_or_else(|e| panic!("invalid deny rule {}: {}", id, e)),
        }
    }
}

lazy_static! {
    static ref DENY_RULES: Vec<DenyRule> = vec![
        DenyRule::new("newline", "multi-line commands are not allowed", r"[\r\n]"),
        DenyRule::new(
            "command-substitution",
            "command substitution is not allowed",
            r"`|\$\(|\$\{",
        ),
        DenyRule::new(
            "shell-chaining",
            "command chaining and pipes are not allowed",
            r"&&|\|\||[;|&]",
        ),
        DenyRule::new("redirection", "shell redirection is not allowed", r"[<>]"),
        DenyRule::new(
            "recursive-deletion",
            "recursive or forced file deletion is not allowed",
            r"\brm(?:\s+\S+)*?\s+(?:-[A-Za-z]*[rRf]|--recursive\b|--force\b)",
        ),
        DenyRule::new(
            "raw-kubeconfig",
            "dumping raw kubeconfig credentials is not allowed",
            r"\bconfig\s+view\b.*--raw\b",
        ),
        DenyRule::new(
            "token-creation",
            "minting service account tokens is not allowed",
            r"\bcreate\s+token\b",
        ),
        DenyRule::new(
            "cluster-admin-binding",
            "binding the cluster-admin role is not allowed",
            r"--clusterrole[=\s]+cluster-admin\b",
        ),
        DenyRule::new(
            "impersonation",
            "impersonating other users or groups is not allowed",
            r"(?:^|\s)--(?:as(?:-group|-uid|-user-extra)?|kube-as-user|kube-as-group)(?:[=\s]|$)",
        ),
        DenyRule::new(
            "auth-reconcile",
            "reconciling RBAC objects is not allowed",
            r"\bauth\s+reconcile\b",
        ),
    ];
}

// Rules checked on the split argv rather than the raw line
const UNBALANCED_QUOTING: &str = "unbalanced-quoting";
const SECRET_DUMP: &str = "secret-dump";

/// Identifier of every denylist rule, in evaluation order
pub fn deny_rule_ids() -> Vec<&'static str> {
    DENY_RULES
        .iter()
        .map(|rule| rule.id)
        .chain([UNBALANCED_QUOTING, SECRET_DUMP])
        .collect()
}

/// Stateless policy check shared by all gateways
#[derive(Debug, Clone)]
pub struct AccessValidator {
    policy: Arc<PolicyConfig>,
}

impl AccessValidator {
    pub fn new(policy: Arc<PolicyConfig>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Validate a command, returning the approved form or the first denial
    pub fn validate(&self, invocation: &CommandInvocation) -> Result<SafeCommand, Denial> {
        let result = self.check(invocation);
        match &result {
            Ok(safe) => debug!(
                family = %safe.family,
                classification = %safe.classification,
                command = %safe.command_line,
                "Command approved"
            ),
            Err(denial) => warn!(
                family = %invocation.family,
                reason = denial.reason(),
                command = %invocation.command_line,
                "Command denied"
            ),
        }
        result
    }

    /// Convenience wrapper for free-form command lines
    pub fn validate_line(&self, family: CommandFamily, line: &str) -> Result<SafeCommand, Denial> {
        self.validate(&CommandInvocation::free_form(family, line))
    }

    fn check(&self, invocation: &CommandInvocation) -> Result<SafeCommand, Denial> {
        let family = invocation.family;
        if !self.policy.is_family_enabled(family) {
            return Err(Denial::FamilyDisabled { family });
        }

        let line = invocation.command_line.as_str();
        screen_denylist(line)?;

        let argv = shlex::split(line).ok_or_else(|| Denial::DangerousPattern {
            rule: UNBALANCED_QUOTING,
            description: "the command could not be split into arguments",
            fragment: line.to_string(),
        })?;
        if family == CommandFamily::Kubectl {
            screen_secret_output(&argv)?;
        }

        let verb = catalog::classify(family, &argv);
        let classification = invocation.classification.unwrap_or(verb.classification);
        let current = self.policy.access_level();
        if !current.permits(classification) {
            let verb = if verb.verb.is_empty() {
                family.binary_name().to_string()
            } else {
                verb.verb
            };
            return Err(Denial::InsufficientAccessLevel {
                verb,
                classification,
                required: classification.required_access_level(),
                current,
            });
        }

        if self.policy.is_namespace_restricted() {
            for namespace in extract_namespaces(&argv) {
                let allowed = match &namespace {
                    NamespaceRef::All => false,
                    NamespaceRef::Named(ns) => self.policy.is_namespace_allowed(ns),
                };
                if !allowed {
                    return Err(Denial::NamespaceNotAllowed {
                        namespace: namespace.to_string(),
                    });
                }
            }
        }

        Ok(SafeCommand {
            family,
            command_line: invocation.command_line.clone(),
            classification,
            argv,
        })
    }
}

fn screen_denylist(line: &str) -> Result<(), Denial> {
    for rule in DENY_RULES.iter() {
        if let Some(found) = rule.pattern.find(line) {
            return Err(Denial::DangerousPattern {
                rule: rule.id,
                description: rule.description,
                fragment: found.as_str().trim().to_string(),
            });
        }
    }
    Ok(())
}

// Output formats that print no secret data
const SECRET_SAFE_OUTPUTS: &[&str] = &["name", "wide"];

/// Whether a positional token names the Secret kind
///
/// Matches `secret`, `Secrets`, `secret/db`, `secrets.v1`, and any member
/// of a comma-separated kind list.
fn names_secret(token: &str) -> bool {
    token.split(',').any(|item| {
        let kind = item.split('/').next().unwrap_or_default();
        let kind = kind.split('.').next().unwrap_or_default();
        kind.eq_ignore_ascii_case("secret") || kind.eq_ignore_ascii_case("secrets")
    })
}

/// Output selectors on a command: `-o X`, `-oX`, `-o=X`, `--output[=] X`,
/// and `--template` in either form
fn output_selectors(argv: &[String]) -> Vec<(&str, String)> {
    let mut found = Vec::new();
    let mut iter = argv.iter().map(String::as_str);

    while let Some(token) = iter.next() {
        match token {
            "-o" | "--output" => {
                found.push((token, iter.next().unwrap_or_default().to_string()));
            }
            "--template" => found.push((token, "template".to_string())),
            _ if token.starts_with("--template=") => found.push((token, "template".to_string())),
            _ => {
                if let Some(value) = token.strip_prefix("--output=") {
                    found.push((token, value.to_string()));
                } else if let Some(rest) = token.strip_prefix("-o") {
                    found.push((token, rest.strip_prefix('=').unwrap_or(rest).to_string()));
                }
            }
        }
    }
    found
}

/// Refuse any output format that could print secret data for a command
/// touching Secrets
fn screen_secret_output(argv: &[String]) -> Result<(), Denial> {
    if !argv.iter().any(|token| !token.starts_with('-') && names_secret(token)) {
        return Ok(());
    }
    for (flag, value) in output_selectors(argv) {
        let format = value.split('=').next().unwrap_or_default().to_ascii_lowercase();
        if !SECRET_SAFE_OUTPUTS.contains(&format.as_str()) {
            return Err(Denial::DangerousPattern {
                rule: SECRET_DUMP,
                description: "printing secret contents is not allowed",
                fragment: flag.to_string(),
            });
        }
    }
    Ok(())
}

/// A namespace scope found on a command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceRef {
    Named(String),
    /// `-A` / `--all-namespaces`
    All,
}

impl std::fmt::Display for NamespaceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(ns) => f.write_str(ns),
            Self::All => f.write_str("*"),
        }
    }
}

/// Every namespace flag occurrence, in order
///
/// A `-n`/`--namespace` with no following value yields an empty name.
pub fn extract_namespaces(argv: &[String]) -> Vec<NamespaceRef> {
    let mut found = Vec::new();
    let mut iter = argv.iter().map(String::as_str);

    while let Some(token) = iter.next() {
        match token {
            "-n" | "--namespace" => {
                found.push(NamespaceRef::Named(iter.next().unwrap_or_default().to_string()));
            }
            "-A" | "--all-namespaces" | "--all-namespaces=true" => found.push(NamespaceRef::All),
            _ => {
                if let Some(ns) = token.strip_prefix("--namespace=") {
                    found.push(NamespaceRef::Named(ns.to_string()));
                } else if let Some(rest) = token.strip_prefix("-n") {
                    let ns = rest.strip_prefix('=').unwrap_or(rest);
                    found.push(NamespaceRef::Named(ns.to_string()));
                }
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn validator(level: AccessLevel) -> AccessValidator {
        AccessValidator::new(Arc::new(PolicyConfig::new(level, 60)))
    }

    fn restricted(level: AccessLevel, namespaces: &[&str]) -> AccessValidator {
        AccessValidator::new(Arc::new(
            PolicyConfig::new(level, 60).with_allowed_namespaces(namespaces.iter().copied()),
        ))
    }

    fn argv(line: &str) -> Vec<String> {
        shlex::split(line).unwrap()
    }

    #[test]
    fn test_deny_rules_compile() {
        assert_eq!(deny_rule_ids().len(), DENY_RULES.len() + 2);
        assert!(deny_rule_ids().contains(&"secret-dump"));
        assert!(deny_rule_ids().contains(&"shell-chaining"));
    }

    #[test]
    fn test_read_only_command_allowed() {
        let safe = validator(AccessLevel::ReadOnly)
            .validate_line(CommandFamily::Kubectl, "get pods -n default")
            .unwrap();
        assert_eq!(safe.command_line(), "get pods -n default");
        assert_eq!(safe.classification(), Classification::ReadOnly);
        assert_eq!(safe.argv(), &["get", "pods", "-n", "default"]);
    }

    #[test]
    fn test_chained_command_denied_at_admin() {
        let err = validator(AccessLevel::Admin)
            .validate_line(CommandFamily::Kubectl, "get pods; rm -rf /")
            .unwrap_err();
        assert!(matches!(err, Denial::DangerousPattern { rule: "shell-chaining", .. }));
    }

    #[test]
    fn test_denylist_rules() {
        let v = validator(AccessLevel::Admin);
        let cases = [
            ("get pods && echo hi", "shell-chaining"),
            ("get pods | sh", "shell-chaining"),
            ("get pods `id`", "command-substitution"),
            ("get pods $(id)", "command-substitution"),
            ("get pods ${HOME}", "command-substitution"),
            ("get pods > /tmp/out", "redirection"),
            ("get pods\ndelete pods --all", "newline"),
            ("exec web-0 -- rm -rf /data", "recursive-deletion"),
            ("exec web-0 -- rm -f /etc/passwd", "recursive-deletion"),
            ("exec web-0 -- rm --recursive --force /data", "recursive-deletion"),
            ("exec web-0 -- rm /data/x --force", "recursive-deletion"),
            ("config view --raw", "raw-kubeconfig"),
            ("create token default", "token-creation"),
            ("get secret db-creds -o yaml", "secret-dump"),
            ("get secrets -ojson", "secret-dump"),
            ("get secret/db -o=jsonpath={.data}", "secret-dump"),
            (
                "create clusterrolebinding x --clusterrole=cluster-admin --user=me",
                "cluster-admin-binding",
            ),
            ("get pods --as=system:admin", "impersonation"),
            ("get pods --as-group system:masters", "impersonation"),
            ("get pods --as-user-extra scopes=all", "impersonation"),
            ("auth reconcile -f rbac.yaml", "auth-reconcile"),
        ];
        for (line, expected) in cases {
            match v.validate_line(CommandFamily::Kubectl, line) {
                Err(Denial::DangerousPattern { rule, .. }) => {
                    assert_eq!(rule, expected, "wrong rule for {:?}", line)
                }
                other => panic!("{:?} should be denied, got {:?}", line, other),
            }
        }
    }

    #[test]
    fn test_secret_dump_forms_denied_at_admin() {
        let v = validator(AccessLevel::Admin);
        for line in [
            "get -o yaml secret x",
            "get Secret x -o yaml",
            "get SECRETS --output json",
            "get secret x --template={{.data.password}}",
            "get secret x --template {{.data}}",
            "get secret x -o template={{.data}}",
            "get secret x -o custom-columns=DATA:.data",
            "get secret x --output=go-template-file=t.tmpl",
            "get secrets.v1 x -ojsonpath={.data}",
            "get configmap/app,secret/db -o yaml",
        ] {
            match v.validate_line(CommandFamily::Kubectl, line) {
                Err(Denial::DangerousPattern { rule, .. }) => assert_eq!(rule, "secret-dump", "{:?}", line),
                other => panic!("{:?} should be denied, got {:?}", line, other),
            }
        }
    }

    #[test]
    fn test_secret_listing_without_data_allowed() {
        let v = validator(AccessLevel::Admin);
        for line in ["get secrets -o name", "get secrets -o wide", "get secret db-creds", "get configmap app -o yaml"] {
            assert!(v.validate_line(CommandFamily::Kubectl, line).is_ok(), "{:?}", line);
        }
    }

    #[test]
    fn test_helm_impersonation_denied() {
        let v = AccessValidator::new(Arc::new(
            PolicyConfig::new(AccessLevel::Admin, 60).with_family(CommandFamily::Helm),
        ));
        for line in ["list --kube-as-user admin", "list --kube-as-group=system:masters"] {
            match v.validate_line(CommandFamily::Helm, line) {
                Err(Denial::DangerousPattern { rule, .. }) => assert_eq!(rule, "impersonation"),
                other => panic!("{:?} should be denied, got {:?}", line, other),
            }
        }
    }

    #[test]
    fn test_flag_before_verb_cannot_lower_classification() {
        let v = validator(AccessLevel::ReadOnly);
        for line in [
            "--frobnicate get delete pod web-0",
            "--some-new-flag get drain node1",
        ] {
            let err = v.validate_line(CommandFamily::Kubectl, line).unwrap_err();
            assert_eq!(err.reason(), "insufficient_access_level", "{:?}", line);
        }
        // Known value flags are skipped and the real verb is classified
        let err = v
            .validate_line(CommandFamily::Kubectl, "--cache-dir get delete pod web-0")
            .unwrap_err();
        assert!(matches!(err, Denial::InsufficientAccessLevel { ref verb, .. } if verb == "delete"));
        assert!(v
            .validate_line(CommandFamily::Kubectl, "--request-timeout 5s get pods")
            .is_ok());

        let helm = AccessValidator::new(Arc::new(
            PolicyConfig::new(AccessLevel::ReadOnly, 60).with_family(CommandFamily::Helm),
        ));
        let err = helm
            .validate_line(CommandFamily::Helm, "--repository-config list uninstall web")
            .unwrap_err();
        assert_eq!(err.reason(), "insufficient_access_level");
    }

    #[test]
    fn test_benign_lookalikes_allowed() {
        let v = validator(AccessLevel::Admin);
        for line in [
            "get secrets",
            "describe secret db-creds",
            "get pods --assume-nothing",
            "get configmap -o yaml",
            "config view",
            "get pods -l app=web,tier!=cache",
        ] {
            assert!(
                v.validate_line(CommandFamily::Kubectl, line).is_ok(),
                "{:?} should be allowed",
                line
            );
        }
    }

    #[test]
    fn test_unbalanced_quotes_denied() {
        let err = validator(AccessLevel::Admin)
            .validate_line(CommandFamily::Kubectl, "get pods -l 'app=web")
            .unwrap_err();
        assert!(matches!(err, Denial::DangerousPattern { rule: "unbalanced-quoting", .. }));
    }

    #[test]
    fn test_family_disabled() {
        let err = validator(AccessLevel::Admin)
            .validate_line(CommandFamily::Helm, "list")
            .unwrap_err();
        assert_eq!(err, Denial::FamilyDisabled { family: CommandFamily::Helm });
        assert!(err.to_string().contains("--additional-tools helm"));
    }

    #[test]
    fn test_family_checked_before_denylist() {
        let err = validator(AccessLevel::Admin)
            .validate_line(CommandFamily::Cilium, "status; reboot")
            .unwrap_err();
        assert_eq!(err.reason(), "family_disabled");
    }

    #[test]
    fn test_enabled_family_allowed() {
        let v = AccessValidator::new(Arc::new(
            PolicyConfig::new(AccessLevel::ReadOnly, 60).with_family(CommandFamily::Helm),
        ));
        assert!(v.validate_line(CommandFamily::Helm, "helm list -A").is_ok());
        let err = v.validate_line(CommandFamily::Helm, "install web ./chart").unwrap_err();
        assert_eq!(err.reason(), "insufficient_access_level");
    }

    #[test]
    fn test_drain_denied_at_read_write() {
        let invocation = CommandInvocation::structured("drain node1", Classification::NodeAdmin);
        let err = validator(AccessLevel::ReadWrite).validate(&invocation).unwrap_err();
        assert_eq!(
            err,
            Denial::InsufficientAccessLevel {
                verb: "drain".to_string(),
                classification: Classification::NodeAdmin,
                required: AccessLevel::Admin,
                current: AccessLevel::ReadWrite,
            }
        );
    }

    #[test]
    fn test_supplied_classification_is_used() {
        let invocation = CommandInvocation::structured("rollout status deployment/app", Classification::ReadOnly);
        let safe = validator(AccessLevel::ReadOnly).validate(&invocation).unwrap();
        assert_eq!(safe.command_line(), "rollout status deployment/app");
    }

    #[test]
    fn test_unknown_verb_needs_admin() {
        let err = validator(AccessLevel::ReadWrite)
            .validate_line(CommandFamily::Kubectl, "alpha something")
            .unwrap_err();
        assert_eq!(err.reason(), "insufficient_access_level");
        assert!(validator(AccessLevel::Admin)
            .validate_line(CommandFamily::Kubectl, "alpha something")
            .is_ok());
    }

    #[test]
    fn test_namespace_restriction() {
        let v = restricted(AccessLevel::Admin, &["dev"]);
        assert!(v.validate_line(CommandFamily::Kubectl, "get pods -n dev").is_ok());
        assert!(v.validate_line(CommandFamily::Kubectl, "get nodes").is_ok());

        let err = v
            .validate_line(CommandFamily::Kubectl, "get pods -n kube-system")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error: Access to namespace 'kube-system' is denied by security configuration"
        );
    }

    #[test]
    fn test_namespace_restriction_independent_of_level() {
        let v = restricted(AccessLevel::ReadOnly, &["dev"]);
        let err = v
            .validate_line(CommandFamily::Kubectl, "get pods --namespace=prod")
            .unwrap_err();
        assert_eq!(err.reason(), "namespace_not_allowed");
    }

    #[test]
    fn test_every_namespace_occurrence_checked() {
        let v = restricted(AccessLevel::ReadOnly, &["dev"]);
        let err = v
            .validate_line(CommandFamily::Kubectl, "get pods -n dev -n prod")
            .unwrap_err();
        assert_eq!(err, Denial::NamespaceNotAllowed { namespace: "prod".into() });
    }

    #[test]
    fn test_all_namespaces_denied_when_restricted() {
        let v = restricted(AccessLevel::ReadOnly, &["dev"]);
        for line in ["get pods -A", "get pods --all-namespaces"] {
            let err = v.validate_line(CommandFamily::Kubectl, line).unwrap_err();
            assert_eq!(err, Denial::NamespaceNotAllowed { namespace: "*".into() });
        }
        assert!(validator(AccessLevel::ReadOnly)
            .validate_line(CommandFamily::Kubectl, "get pods -A")
            .is_ok());
    }

    #[test]
    fn test_extract_namespace_forms() {
        let named = |s: &str| NamespaceRef::Named(s.to_string());
        assert_eq!(extract_namespaces(&argv("get pods -n a")), vec![named("a")]);
        assert_eq!(extract_namespaces(&argv("get pods -nb")), vec![named("b")]);
        assert_eq!(extract_namespaces(&argv("get pods -n=c")), vec![named("c")]);
        assert_eq!(extract_namespaces(&argv("get pods --namespace d")), vec![named("d")]);
        assert_eq!(extract_namespaces(&argv("get pods --namespace=e")), vec![named("e")]);
        assert_eq!(extract_namespaces(&argv("get pods -A")), vec![NamespaceRef::All]);
        assert_eq!(extract_namespaces(&argv("get pods -n")), vec![named("")]);
        assert!(extract_namespaces(&argv("get pods --no-headers")).is_empty());
    }

    #[test]
    fn test_validator_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AccessValidator>();
        assert_send_sync::<SafeCommand>();
    }

    const LEVELS: [AccessLevel; 3] = [AccessLevel::ReadOnly, AccessLevel::ReadWrite, AccessLevel::Admin];
    const CLASSES: [Classification; 3] = [
        Classification::ReadOnly,
        Classification::Write,
        Classification::NodeAdmin,
    ];

    proptest! {
        #[test]
        fn prop_classification_gate_is_monotonic(level in 0usize..3, class in 0usize..3) {
            let level = LEVELS[level];
            let class = CLASSES[class];
            let invocation = CommandInvocation::structured("get pods", class);
            let allowed = validator(level).validate(&invocation).is_ok();
            prop_assert_eq!(allowed, class <= level.max_classification());
        }

        #[test]
        fn prop_denylisted_fragment_always_denied(
            level in 0usize..3,
            prefix in "[a-z]{1,8}",
            sep in prop::sample::select(vec![";", "&&", "||", "|", "`", "$(", ">", "<", "\n"]),
            suffix in "[a-z ]{0,8}",
        ) {
            let line = format!("get {}{}{}", prefix, sep, suffix);
            let err = validator(LEVELS[level]).validate_line(CommandFamily::Kubectl, &line);
            prop_assert!(
                matches!(err, Err(Denial::DangerousPattern { .. })),
                "{:?} was not denied as dangerous", line
            );
        }

        #[test]
        fn prop_disallowed_namespace_denied(ns in "[a-z][a-z0-9-]{0,12}") {
            prop_assume!(ns != "dev");
            let v = restricted(AccessLevel::Admin, &["dev"]);
            let with_flag = format!("get pods -n {}", ns);
            prop_assert_eq!(
                v.validate_line(CommandFamily::Kubectl, &with_flag).unwrap_err(),
                Denial::NamespaceNotAllowed { namespace: ns.clone() }
            );
            prop_assert!(v.validate_line(CommandFamily::Kubectl, "get pods").is_ok());
        }
    }
}
