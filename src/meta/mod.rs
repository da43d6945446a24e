//! Meta module - resource identity types and object metadata access.
//!
//! Objects handled by this server are opaque `serde_json::Value`
//! documents; this module owns the keys that identify them (group,
//! version, kind, namespace, name) and the accessors for the required
//! metadata block.

mod object;

pub use object::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// GroupVersionKind identifies a resource type as it appears on the
/// wire (`apiVersion` + `kind`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        GroupVersionKind {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// The `apiVersion` wire form: `group/version`, or bare `version`
    /// for the core group.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Parses an `apiVersion` + `kind` pair into a GVK.
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => GroupVersionKind::new(group, version, kind),
            None => GroupVersionKind::new("", api_version, kind),
        }
    }

    /// True if group and kind match, any version.
    pub fn is_group_kind(&self, group: &str, kind: &str) -> bool {
        self.group == group && self.kind == kind
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}, Kind={}", self.group, self.version, self.kind)
    }
}

/// GroupResource is the storage key, independent of version: all
/// versions of one registered kind share a store keyed by this.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct GroupResource {
    pub group: String,
    /// Plural resource name, e.g. `configmaps`.
    pub resource: String,
}

impl GroupResource {
    pub fn new(group: impl Into<String>, resource: impl Into<String>) -> Self {
        GroupResource {
            group: group.into(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for GroupResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.resource)
        } else {
            write!(f, "{}.{}", self.resource, self.group)
        }
    }
}

/// Whether instances of a kind live in a namespace or at cluster
/// scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceScope {
    Namespaced,
    Cluster,
}

impl ResourceScope {
    /// Parses the CRD `spec.scope` string.
    pub fn parse(s: &str) -> Option<ResourceScope> {
        match s {
            "Namespaced" => Some(ResourceScope::Namespaced),
            "Cluster" => Some(ResourceScope::Cluster),
            _ => None,
        }
    }
}

/// NamespacedName is the primary key within a store. The namespace is
/// empty for cluster-scoped kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        NamespacedName {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn cluster_scoped(name: impl Into<String>) -> Self {
        NamespacedName {
            namespace: String::new(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gvk_api_version_round_trip() {
        let gvk = GroupVersionKind::new("apps", "v1", "Deployment");
        assert_eq!(gvk.api_version(), "apps/v1");
        assert_eq!(
            GroupVersionKind::from_api_version("apps/v1", "Deployment"),
            gvk
        );

        let core = GroupVersionKind::new("", "v1", "ConfigMap");
        assert_eq!(core.api_version(), "v1");
        assert_eq!(GroupVersionKind::from_api_version("v1", "ConfigMap"), core);
    }

    #[test]
    fn test_group_kind_match() {
        let gvk = GroupVersionKind::new("apiextensions.k8s.io", "v1", "CustomResourceDefinition");
        assert!(gvk.is_group_kind("apiextensions.k8s.io", "CustomResourceDefinition"));
        assert!(!gvk.is_group_kind("apiextensions.k8s.io", "Foo"));
    }

    #[test]
    fn test_namespaced_name_display() {
        assert_eq!(NamespacedName::new("ns", "a").to_string(), "ns/a");
        assert_eq!(NamespacedName::cluster_scoped("a").to_string(), "a");
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!(
            ResourceScope::parse("Namespaced"),
            Some(ResourceScope::Namespaced)
        );
        assert_eq!(ResourceScope::parse("Cluster"), Some(ResourceScope::Cluster));
        assert_eq!(ResourceScope::parse("Regional"), None);
    }
}
