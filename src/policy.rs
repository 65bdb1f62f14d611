//! Access Policy
//!
//! Immutable, process-wide policy data: the access tier the server runs at,
//! the namespace allow-list, the per-command timeout bound and the set of
//! optional CLI families that were switched on at startup.
//!
//! A [`PolicyConfig`] is built once from the loaded configuration and then
//! shared read-only (behind an `Arc`) by every request. Nothing mutates it
//! after startup, so concurrent validations never need a lock.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Risk label attached to every operation.
///
/// The derived ordering is the privilege ordering: `ReadOnly < Write < NodeAdmin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Inspection only, never mutates cluster state
    ReadOnly,

    /// Mutates namespaced workloads or objects
    Write,

    /// Node maintenance, certificate approval and unknown verbs
    NodeAdmin,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "read-only",
            Self::Write => "write",
            Self::NodeAdmin => "node-admin",
        }
    }

    /// Lowest access level that admits this classification
    pub fn required_access_level(&self) -> AccessLevel {
        match self {
            Self::ReadOnly => AccessLevel::ReadOnly,
            Self::Write => AccessLevel::ReadWrite,
            Self::NodeAdmin => AccessLevel::Admin,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Privilege tier the server runs at.
///
/// Higher tiers are strict supersets of lower ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    #[serde(alias = "read-only")]
    ReadOnly,
    #[serde(alias = "read-write")]
    ReadWrite,
    Admin,
}

impl AccessLevel {
    /// Highest classification this tier admits
    pub fn max_classification(&self) -> Classification {
        match self {
            Self::ReadOnly => Classification::ReadOnly,
            Self::ReadWrite => Classification::Write,
            Self::Admin => Classification::NodeAdmin,
        }
    }

    /// Whether an operation of the given classification may run at this tier
    pub fn permits(&self, classification: Classification) -> bool {
        classification <= self.max_classification()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "readonly",
            Self::ReadWrite => "readwrite",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "readonly" | "read-only" => Ok(Self::ReadOnly),
            "readwrite" | "read-write" => Ok(Self::ReadWrite),
            "admin" => Ok(Self::Admin),
            other => Err(format!(
                "invalid access level '{}'. Must be one of: readonly, readwrite, admin",
                other
            )),
        }
    }
}

/// Broad kind of a CLI family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FamilyKind {
    /// The orchestration CLI, always enabled
    Primary,
    /// Package manager
    Package,
    /// CNI / network observability
    Network,
}

/// One of the wrapped command line tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandFamily {
    Kubectl,
    Helm,
    Cilium,
    Hubble,
}

impl CommandFamily {
    /// Families that must be switched on explicitly
    pub const OPTIONAL: [CommandFamily; 3] = [Self::Helm, Self::Cilium, Self::Hubble];

    pub fn kind(&self) -> FamilyKind {
        match self {
            Self::Kubectl => FamilyKind::Primary,
            Self::Helm => FamilyKind::Package,
            Self::Cilium | Self::Hubble => FamilyKind::Network,
        }
    }

    /// Canonical binary name, also accepted as a leading token in free-form commands
    pub fn binary_name(&self) -> &'static str {
        match self {
            Self::Kubectl => "kubectl",
            Self::Helm => "helm",
            Self::Cilium => "cilium",
            Self::Hubble => "hubble",
        }
    }

    pub fn is_optional(&self) -> bool {
        self.kind() != FamilyKind::Primary
    }
}

impl fmt::Display for CommandFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

impl FromStr for CommandFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kubectl" => Ok(Self::Kubectl),
            "helm" => Ok(Self::Helm),
            "cilium" => Ok(Self::Cilium),
            "hubble" => Ok(Self::Hubble),
            other => Err(format!(
                "unknown tool '{}'. Must be one of: helm, cilium, hubble",
                other
            )),
        }
    }
}

/// Read-only policy shared by every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    access_level: AccessLevel,
    allowed_namespaces: BTreeSet<String>,
    timeout_secs: u64,
    enabled_families: BTreeSet<CommandFamily>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::new(AccessLevel::ReadOnly, 60)
    }
}

impl PolicyConfig {
    /// Create a policy with no namespace restriction and only kubectl enabled
    ///
    /// A zero timeout is raised to one second; a deadline of zero would
    /// reject every command before it could start.
    pub fn new(access_level: AccessLevel, timeout_secs: u64) -> Self {
        Self {
            access_level,
            allowed_namespaces: BTreeSet::new(),
            timeout_secs: timeout_secs.max(1),
            enabled_families: BTreeSet::new(),
        }
    }

    pub fn with_allowed_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_namespaces = namespaces
            .into_iter()
            .map(|ns| {
                let ns: String = ns.into();
                ns.trim().to_string()
            })
            .filter(|ns| !ns.is_empty())
            .collect();
        self
    }

    pub fn with_family(mut self, family: CommandFamily) -> Self {
        if family.is_optional() {
            self.enabled_families.insert(family);
        }
        self
    }

    pub fn with_families<I>(self, families: I) -> Self
    where
        I: IntoIterator<Item = CommandFamily>,
    {
        families.into_iter().fold(self, Self::with_family)
    }

    pub fn access_level(&self) -> AccessLevel {
        self.access_level
    }

    pub fn allowed_namespaces(&self) -> &BTreeSet<String> {
        &self.allowed_namespaces
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Kubectl is always on; the optional families only when configured
    pub fn is_family_enabled(&self, family: CommandFamily) -> bool {
        !family.is_optional() || self.enabled_families.contains(&family)
    }

    pub fn enabled_families(&self) -> impl Iterator<Item = CommandFamily> + '_ {
        std::iter::once(CommandFamily::Kubectl).chain(self.enabled_families.iter().copied())
    }

    pub fn is_namespace_restricted(&self) -> bool {
        !self.allowed_namespaces.is_empty()
    }

    /// An empty allow-list admits every namespace
    pub fn is_namespace_allowed(&self, namespace: &str) -> bool {
        self.allowed_namespaces.is_empty() || self.allowed_namespaces.contains(namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_ordering() {
        assert!(Classification::ReadOnly < Classification::Write);
        assert!(Classification::Write < Classification::NodeAdmin);
    }

    #[test]
    fn test_access_level_permits_is_monotonic() {
        let all = [
            Classification::ReadOnly,
            Classification::Write,
            Classification::NodeAdmin,
        ];

        let readonly: Vec<_> = all.iter().filter(|c| AccessLevel::ReadOnly.permits(**c)).collect();
        assert_eq!(readonly, vec![&Classification::ReadOnly]);

        let readwrite: Vec<_> = all.iter().filter(|c| AccessLevel::ReadWrite.permits(**c)).collect();
        assert_eq!(readwrite, vec![&Classification::ReadOnly, &Classification::Write]);

        assert!(all.iter().all(|c| AccessLevel::Admin.permits(*c)));
    }

    #[test]
    fn test_access_level_parsing() {
        assert_eq!("readonly".parse::<AccessLevel>().unwrap(), AccessLevel::ReadOnly);
        assert_eq!("Read-Write".parse::<AccessLevel>().unwrap(), AccessLevel::ReadWrite);
        assert_eq!(" admin ".parse::<AccessLevel>().unwrap(), AccessLevel::Admin);

        let err = "root".parse::<AccessLevel>().unwrap_err();
        assert!(err.contains("readonly, readwrite, admin"));
    }

    #[test]
    fn test_family_parsing_and_kind() {
        assert_eq!("helm".parse::<CommandFamily>().unwrap(), CommandFamily::Helm);
        assert_eq!(CommandFamily::Kubectl.kind(), FamilyKind::Primary);
        assert_eq!(CommandFamily::Helm.kind(), FamilyKind::Package);
        assert_eq!(CommandFamily::Hubble.kind(), FamilyKind::Network);
        assert!("istioctl".parse::<CommandFamily>().is_err());
    }

    #[test]
    fn test_kubectl_always_enabled() {
        let policy = PolicyConfig::default();
        assert!(policy.is_family_enabled(CommandFamily::Kubectl));
        assert!(!policy.is_family_enabled(CommandFamily::Helm));

        let policy = policy.with_family(CommandFamily::Helm);
        assert!(policy.is_family_enabled(CommandFamily::Helm));
        assert!(!policy.is_family_enabled(CommandFamily::Cilium));
        assert_eq!(
            policy.enabled_families().collect::<Vec<_>>(),
            vec![CommandFamily::Kubectl, CommandFamily::Helm]
        );
    }

    #[test]
    fn test_namespace_allow_list() {
        let open = PolicyConfig::default();
        assert!(!open.is_namespace_restricted());
        assert!(open.is_namespace_allowed("anything"));

        let restricted = PolicyConfig::default().with_allowed_namespaces(["dev", " staging ", ""]);
        assert!(restricted.is_namespace_restricted());
        assert!(restricted.is_namespace_allowed("dev"));
        assert!(restricted.is_namespace_allowed("staging"));
        assert!(!restricted.is_namespace_allowed("kube-system"));
        assert_eq!(restricted.allowed_namespaces().len(), 2);
    }

    #[test]
    fn test_zero_timeout_is_raised() {
        assert_eq!(PolicyConfig::new(AccessLevel::Admin, 0).timeout_secs(), 1);
        assert_eq!(PolicyConfig::new(AccessLevel::Admin, 30).timeout_secs(), 30);
    }
}
