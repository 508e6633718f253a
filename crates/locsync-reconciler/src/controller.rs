//! Controller driving reconciliation from a work queue
//!
//! Object events, namespace events and bulk type syncs all end up as
//! [`QueueItem`]s. A pool of tokio workers pulls items off the queue,
//! reconciles them and requeues retryable failures with backoff. Items
//! failing with a permanent error are dropped.

use crate::client::{Enqueue, NamespaceLister, PatchClient, ResourceInformers};
use crate::queue::WorkQueue;
use crate::reconcile::Reconciler;
use crate::sync::BulkSyncer;
use locsync_common::{Config, ObjectKey, ResourceObject, ResourceType, Result, TenantName};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Unit of work for the controller
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueueItem {
    /// Reconcile one object
    Resource {
        resource: ResourceType,
        key: ObjectKey,
    },
    /// Enqueue every object of a type
    ResourceType(ResourceType),
}

impl Enqueue for WorkQueue<QueueItem> {
    fn enqueue(&self, resource: &ResourceType, object: &ResourceObject) {
        self.add(QueueItem::Resource {
            resource: resource.clone(),
            key: object.key(),
        });
    }
}

/// Placement controller
pub struct Controller {
    queue: Arc<WorkQueue<QueueItem>>,
    reconciler: Reconciler,
    syncer: BulkSyncer,
    informers: Arc<dyn ResourceInformers>,
}

impl Controller {
    /// Create a controller over the given caches and client
    pub fn new(
        config: &Config,
        namespaces: Arc<dyn NamespaceLister>,
        informers: Arc<dyn ResourceInformers>,
        client: Arc<dyn PatchClient>,
    ) -> Self {
        let queue = Arc::new(WorkQueue::new(
            config.controller.base_retry_delay(),
            config.controller.max_retry_delay(),
        ));
        let syncer = BulkSyncer::new(
            Arc::clone(&informers),
            Arc::clone(&queue) as Arc<dyn Enqueue>,
        );
        Self {
            reconciler: Reconciler::new(&config.placement, namespaces, client),
            syncer,
            informers,
            queue,
        }
    }

    #[must_use]
    pub fn queue(&self) -> &Arc<WorkQueue<QueueItem>> {
        &self.queue
    }

    #[must_use]
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Queue a full pass over every object of `resource`
    pub fn enqueue_resource_type(&self, resource: ResourceType) {
        self.queue.add(QueueItem::ResourceType(resource));
    }

    /// Queue every synced type for a full pass
    pub fn enqueue_all_types(&self) {
        for resource in self.informers.listers().synced.into_keys() {
            self.enqueue_resource_type(resource);
        }
    }

    /// Queue every cached object living in a namespace, across all synced types
    pub fn enqueue_namespace(&self, tenant: &TenantName, namespace: &str) -> Result<usize> {
        let mut count = 0;
        for (resource, lister) in self.informers.listers().synced {
            for object in lister.list()? {
                if object.tenant == *tenant && object.namespace == namespace {
                    self.queue.enqueue(&resource, &object);
                    count += 1;
                }
            }
        }
        debug!(%tenant, namespace, count, "Enqueued objects of namespace");
        Ok(count)
    }

    /// Run `workers` workers until `cancel` fires
    pub async fn run(self: Arc<Self>, workers: usize, cancel: CancellationToken) {
        info!(workers, "Starting placement controller");

        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let controller = Arc::clone(&self);
                let cancel = cancel.clone();
                tokio::spawn(async move { controller.worker(id, &cancel).await })
            })
            .collect();

        cancel.cancelled().await;
        self.queue.shut_down();

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "Worker task failed");
            }
        }
        info!("Placement controller stopped");
    }

    async fn worker(&self, id: usize, cancel: &CancellationToken) {
        while let Some(item) = self.queue.get().await {
            self.process(cancel, &item).await;
            self.queue.done(&item);
        }
        debug!(worker = id, "Worker exiting");
    }

    async fn process(&self, cancel: &CancellationToken, item: &QueueItem) {
        match self.handle(cancel, item).await {
            Ok(()) => self.queue.forget(item),
            Err(e) if !e.is_retryable() => {
                error!(?item, error = %e, "Failed to process item; dropping");
                self.queue.forget(item);
            }
            Err(e) => {
                warn!(
                    ?item,
                    error = %e,
                    requeues = self.queue.num_requeues(item),
                    "Failed to process item; requeueing"
                );
                self.queue.add_rate_limited(item.clone());
            }
        }
    }

    async fn handle(&self, cancel: &CancellationToken, item: &QueueItem) -> Result<()> {
        match item {
            QueueItem::ResourceType(resource) => self.syncer.sync_type(resource).map(|_| ()),
            QueueItem::Resource { resource, key } => {
                let listers = self.informers.listers();
                let Some(lister) = listers.synced.get(resource) else {
                    debug!(%resource, %key, "Type is not synced; dropping");
                    return Ok(());
                };
                let Some(object) = lister.get(key)? else {
                    // Deleted since it was queued.
                    return Ok(());
                };
                self.reconciler
                    .reconcile(cancel, &key.tenant, &object, resource)
                    .await
                    .map(|_| ())
            }
        }
    }
}
