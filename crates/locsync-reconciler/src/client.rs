//! Collaborator traits
//!
//! The reconciler never owns caches or remote clients. It is handed
//! implementations of these traits at construction time: a namespace
//! lister backed by a watch cache, per-type object listers, a client able to
//! apply merge patches, and a queue to hand objects back to.

use async_trait::async_trait;
use locsync_common::{ObjectKey, ResourceObject, ResourceType, Result, TenantName};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Read access to cached namespaces
#[async_trait]
pub trait NamespaceLister: Send + Sync {
    /// Get a namespace; fails with `Error::NamespaceNotFound` when absent
    async fn get(&self, tenant: &TenantName, name: &str) -> Result<ResourceObject>;
}

/// Read access to the cached objects of one resource type
pub trait ResourceLister: Send + Sync {
    /// All cached objects, across tenants and namespaces
    fn list(&self) -> Result<Vec<ResourceObject>>;

    /// One cached object
    fn get(&self, key: &ObjectKey) -> Result<Option<ResourceObject>>;
}

/// Listers split by whether their cache has finished its initial sync
#[derive(Clone, Default)]
pub struct Listers {
    pub synced: BTreeMap<ResourceType, Arc<dyn ResourceLister>>,
    pub not_synced: Vec<ResourceType>,
}

/// Source of per-type listers
pub trait ResourceInformers: Send + Sync {
    fn listers(&self) -> Listers;
}

/// Remote store client applying JSON merge patches
#[async_trait]
pub trait PatchClient: Send + Sync {
    /// Patch `name` in `namespace` and return the updated object
    async fn patch(
        &self,
        tenant: &TenantName,
        resource: &ResourceType,
        namespace: &str,
        name: &str,
        patch: &[u8],
    ) -> Result<ResourceObject>;
}

/// Hands objects to the retry/scheduling driver
///
/// Fire-and-forget; implementations deduplicate by object identity.
pub trait Enqueue: Send + Sync {
    fn enqueue(&self, resource: &ResourceType, object: &ResourceObject);
}
