//! In-memory object store
//!
//! Implements every collaborator trait the reconciler needs on top of plain
//! maps, with real merge-patch semantics. Used by the CLI to run against a
//! fixture file and by tests to check end-to-end convergence.

use crate::client::{Listers, NamespaceLister, PatchClient, ResourceInformers, ResourceLister};
use async_trait::async_trait;
use locsync_common::{Error, ObjectKey, ResourceObject, ResourceType, Result, TenantName};
use locsync_placement::MergePatch;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Serializable store contents
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub namespaces: Vec<ResourceObject>,
    #[serde(default)]
    pub resources: Vec<FixtureResources>,
}

/// Objects of one resource type
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureResources {
    #[serde(flatten)]
    pub resource: ResourceType,
    #[serde(default)]
    pub objects: Vec<ResourceObject>,
}

/// A patch accepted by the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedPatch {
    pub resource: ResourceType,
    pub key: ObjectKey,
    pub patch: MergePatch,
}

type ObjectMap = Arc<RwLock<BTreeMap<ObjectKey, ResourceObject>>>;

struct TypeCache {
    objects: ObjectMap,
    synced: bool,
}

impl TypeCache {
    fn new() -> Self {
        Self {
            objects: Arc::default(),
            synced: true,
        }
    }
}

/// Lister over one type's objects; sees later writes to the store
struct MemoryLister {
    objects: ObjectMap,
}

impl ResourceLister for MemoryLister {
    fn list(&self) -> Result<Vec<ResourceObject>> {
        Ok(self.objects.read().values().cloned().collect())
    }

    fn get(&self, key: &ObjectKey) -> Result<Option<ResourceObject>> {
        Ok(self.objects.read().get(key).cloned())
    }
}

/// In-memory namespaces and typed objects
#[derive(Default)]
pub struct MemoryStore {
    namespaces: RwLock<BTreeMap<(TenantName, String), ResourceObject>>,
    types: RwLock<BTreeMap<ResourceType, TypeCache>>,
    patches: RwLock<Vec<AppliedPatch>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the fixture's objects; every type is synced
    #[must_use]
    pub fn from_fixture(fixture: &Fixture) -> Self {
        let store = Self::new();
        for ns in &fixture.namespaces {
            store.insert_namespace(ns.clone());
        }
        for group in &fixture.resources {
            store.register_type(&group.resource);
            for object in &group.objects {
                store.insert_object(&group.resource, object.clone());
            }
        }
        store
    }

    /// Current contents in fixture form
    #[must_use]
    pub fn to_fixture(&self) -> Fixture {
        let namespaces = self.namespaces.read().values().cloned().collect();
        let resources = self
            .types
            .read()
            .iter()
            .map(|(resource, cache)| FixtureResources {
                resource: resource.clone(),
                objects: cache.objects.read().values().cloned().collect(),
            })
            .collect();
        Fixture {
            namespaces,
            resources,
        }
    }

    /// Insert or replace a namespace
    pub fn insert_namespace(&self, namespace: ResourceObject) {
        let key = (namespace.tenant.clone(), namespace.name.clone());
        self.namespaces.write().insert(key, namespace);
    }

    /// Remove a namespace, returning it if present
    pub fn remove_namespace(&self, tenant: &TenantName, name: &str) -> Option<ResourceObject> {
        self.namespaces
            .write()
            .remove(&(tenant.clone(), name.to_string()))
    }

    /// Make a resource type known to the store (synced, no objects)
    pub fn register_type(&self, resource: &ResourceType) {
        self.types
            .write()
            .entry(resource.clone())
            .or_insert_with(TypeCache::new);
    }

    /// Mark a type's cache as synced or not
    pub fn set_synced(&self, resource: &ResourceType, synced: bool) {
        self.types
            .write()
            .entry(resource.clone())
            .or_insert_with(TypeCache::new)
            .synced = synced;
    }

    /// Insert or replace an object
    pub fn insert_object(&self, resource: &ResourceType, object: ResourceObject) {
        let objects = Arc::clone(
            &self
                .types
                .write()
                .entry(resource.clone())
                .or_insert_with(TypeCache::new)
                .objects,
        );
        objects.write().insert(object.key(), object);
    }

    /// Get an object
    #[must_use]
    pub fn object(&self, resource: &ResourceType, key: &ObjectKey) -> Option<ResourceObject> {
        let types = self.types.read();
        let cache = types.get(resource)?;
        let objects = cache.objects.read();
        objects.get(key).cloned()
    }

    /// All objects of a type
    #[must_use]
    pub fn objects(&self, resource: &ResourceType) -> Vec<ResourceObject> {
        self.types
            .read()
            .get(resource)
            .map(|cache| cache.objects.read().values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every patch accepted so far, oldest first
    #[must_use]
    pub fn applied_patches(&self) -> Vec<AppliedPatch> {
        self.patches.read().clone()
    }
}

#[async_trait]
impl NamespaceLister for MemoryStore {
    async fn get(&self, tenant: &TenantName, name: &str) -> Result<ResourceObject> {
        self.namespaces
            .read()
            .get(&(tenant.clone(), name.to_string()))
            .cloned()
            .ok_or_else(|| Error::NamespaceNotFound {
                tenant: tenant.clone(),
                name: name.to_string(),
            })
    }
}

impl ResourceInformers for MemoryStore {
    fn listers(&self) -> Listers {
        let mut listers = Listers::default();
        for (resource, cache) in self.types.read().iter() {
            if cache.synced {
                let lister = MemoryLister {
                    objects: Arc::clone(&cache.objects),
                };
                listers.synced.insert(resource.clone(), Arc::new(lister));
            } else {
                listers.not_synced.push(resource.clone());
            }
        }
        listers
    }
}

#[async_trait]
impl PatchClient for MemoryStore {
    async fn patch(
        &self,
        tenant: &TenantName,
        resource: &ResourceType,
        namespace: &str,
        name: &str,
        patch: &[u8],
    ) -> Result<ResourceObject> {
        let patch = MergePatch::from_slice(patch)?;
        let key = ObjectKey::new(tenant.clone(), namespace, name);
        let not_found = || Error::ObjectNotFound {
            resource: resource.clone(),
            key: key.clone(),
        };

        let objects = self
            .types
            .read()
            .get(resource)
            .map(|cache| Arc::clone(&cache.objects))
            .ok_or_else(not_found)?;

        let updated = {
            let mut objects = objects.write();
            let object = objects.get_mut(&key).ok_or_else(not_found)?;
            patch.apply(&mut object.metadata);
            object.clone()
        };

        self.patches.write().push(AppliedPatch {
            resource: resource.clone(),
            key,
            patch,
        });
        Ok(updated)
    }
}
