//! Bulk re-enqueue of every cached object of a type
//!
//! Used to force a full convergence pass, e.g. once the cache for a newly
//! watched type has synced.

use crate::client::{Enqueue, ResourceInformers};
use locsync_common::{Error, ResourceType, Result};
use std::sync::Arc;
use tracing::debug;

/// Re-enqueues all cached objects of a resource type
pub struct BulkSyncer {
    informers: Arc<dyn ResourceInformers>,
    queue: Arc<dyn Enqueue>,
}

impl BulkSyncer {
    pub fn new(informers: Arc<dyn ResourceInformers>, queue: Arc<dyn Enqueue>) -> Self {
        Self { informers, queue }
    }

    /// Enqueue every cached object of `resource`, returning how many
    ///
    /// Fails with `Error::TypeNotSynced` while the type's cache is not ready.
    pub fn sync_type(&self, resource: &ResourceType) -> Result<usize> {
        let listers = self.informers.listers();
        let lister = listers
            .synced
            .get(resource)
            .ok_or_else(|| Error::TypeNotSynced(resource.clone()))?;

        let objects = lister.list()?;
        for object in &objects {
            self.queue.enqueue(resource, object);
        }

        debug!(%resource, count = objects.len(), "Enqueued all objects of type");
        Ok(objects.len())
    }
}
