//! Core type definitions for locsync
//!
//! This module defines the identifiers used throughout the system (tenants,
//! locations, resource types, object keys) and the typed metadata model
//! shared by namespaces and the objects living inside them.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Name of a tenant (logical cluster)
///
/// Every object identity is scoped by a tenant: two objects with the same
/// name under different tenants are distinct.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[display("{_0}")]
#[serde(transparent)]
pub struct TenantName(String);

impl TenantName {
    /// Create a new tenant name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the tenant name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TenantName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TenantName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Identifier of a placement target
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[display("{_0}")]
#[serde(transparent)]
pub struct LocationId(String);

impl LocationId {
    /// Create a new location identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the location identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LocationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// API group plus resource name, without a version
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupResource {
    /// API group (empty for the core group)
    #[serde(default)]
    pub group: String,
    /// Plural resource name
    pub resource: String,
}

impl GroupResource {
    /// Create a new group/resource pair
    pub fn new(group: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
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

/// Group, version and resource of an object type
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceType {
    /// API group (empty for the core group)
    #[serde(default)]
    pub group: String,
    /// API version
    pub version: String,
    /// Plural resource name
    pub resource: String,
}

impl ResourceType {
    /// Create a new resource type
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    /// Drop the version
    #[must_use]
    pub fn group_resource(&self) -> GroupResource {
        GroupResource::new(self.group.clone(), self.resource.clone())
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.resource)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.resource)
        }
    }
}

impl FromStr for ResourceType {
    type Err = ResourceTypeError;

    /// Parse `group/version/resource`, or `version/resource` for the core group
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        let (group, version, resource) = match parts.as_slice() {
            [version, resource] => ("", *version, *resource),
            [group, version, resource] => (*group, *version, *resource),
            _ => return Err(ResourceTypeError::Malformed(s.to_string())),
        };
        if version.is_empty() || resource.is_empty() || (parts.len() == 3 && group.is_empty()) {
            return Err(ResourceTypeError::EmptySegment(s.to_string()));
        }
        Ok(Self::new(group, version, resource))
    }
}

/// Errors that can occur when parsing a resource type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceTypeError {
    #[error("expected group/version/resource or version/resource, got {0:?}")]
    Malformed(String),
    #[error("resource type has an empty segment: {0:?}")]
    EmptySegment(String),
}

/// Labels and annotations of an object
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Label key/value set
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Annotation key/value set
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl Metadata {
    /// Create empty metadata
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a label
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add an annotation
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Get a label value
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Get an annotation value
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

/// An object as mirrored by the cache
///
/// A namespace is represented by an object whose `namespace` is empty; every
/// other object names the namespace it lives in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceObject {
    /// Owning tenant
    pub tenant: TenantName,
    /// Enclosing namespace (empty for namespaces and cluster-scoped objects)
    #[serde(default)]
    pub namespace: String,
    /// Object name
    pub name: String,
    /// Labels and annotations
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl ResourceObject {
    /// Create a namespace object
    pub fn namespace(tenant: impl Into<TenantName>, name: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            namespace: String::new(),
            name: name.into(),
            metadata: Metadata::new(),
        }
    }

    /// Create an object living in a namespace
    pub fn namespaced(
        tenant: impl Into<TenantName>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            namespace: namespace.into(),
            name: name.into(),
            metadata: Metadata::new(),
        }
    }

    /// Add a label
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    /// Add an annotation
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.annotations.insert(key.into(), value.into());
        self
    }

    /// Whether the object lives inside a namespace
    #[must_use]
    pub fn is_namespaced(&self) -> bool {
        !self.namespace.is_empty()
    }

    /// Identity of this object within its resource type
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.tenant.clone(), self.namespace.clone(), self.name.clone())
    }
}

/// Identity of a cached object within one resource type
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub tenant: TenantName,
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    /// Create a new object key
    pub fn new(
        tenant: impl Into<TenantName>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}|{}", self.tenant, self.name)
        } else {
            write!(f, "{}|{}/{}", self.tenant, self.namespace, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_parse() {
        let rt: ResourceType = "apps/v1/deployments".parse().unwrap();
        assert_eq!(rt, ResourceType::new("apps", "v1", "deployments"));
        assert_eq!(rt.to_string(), "apps/v1/deployments");

        let core: ResourceType = "v1/configmaps".parse().unwrap();
        assert_eq!(core.group, "");
        assert_eq!(core.to_string(), "v1/configmaps");
    }

    #[test]
    fn test_resource_type_parse_invalid() {
        assert!("deployments".parse::<ResourceType>().is_err());
        assert!("a/b/c/d".parse::<ResourceType>().is_err());
        assert!("/v1/deployments".parse::<ResourceType>().is_err());
        assert!("apps//deployments".parse::<ResourceType>().is_err());
    }

    #[test]
    fn test_group_resource_display() {
        let rt = ResourceType::new("networking.k8s.io", "v1", "ingresses");
        assert_eq!(rt.group_resource().to_string(), "ingresses.networking.k8s.io");
        assert_eq!(GroupResource::new("", "pods").to_string(), "pods");
    }

    #[test]
    fn test_object_key_display() {
        let obj = ResourceObject::namespaced("root:org", "default", "web");
        assert_eq!(obj.key().to_string(), "root:org|default/web");
        assert!(obj.is_namespaced());

        let ns = ResourceObject::namespace("root:org", "default");
        assert_eq!(ns.key().to_string(), "root:org|default");
        assert!(!ns.is_namespaced());
    }

    #[test]
    fn test_tenants_partition_identity() {
        let a = ResourceObject::namespaced("tenant-a", "default", "web");
        let b = ResourceObject::namespaced("tenant-b", "default", "web");
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn test_object_json_shape() {
        let obj = ResourceObject::namespaced("t", "ns", "cm")
            .with_label("app", "web")
            .with_annotation("note", "x");
        let json = serde_json::to_value(&obj).unwrap();
        assert_eq!(json["labels"]["app"], "web");
        assert_eq!(json["annotations"]["note"], "x");

        let parsed: ResourceObject =
            serde_json::from_str(r#"{"tenant":"t","name":"ns"}"#).unwrap();
        assert!(parsed.metadata.labels.is_empty());
        assert!(!parsed.is_namespaced());
    }
}
