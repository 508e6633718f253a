//! Per-object reconciliation
//!
//! Aligns the location assignment of a namespaced object with the
//! assignment of its namespace. Desired state is recomputed from the current
//! namespace and object on every call, so duplicate or reordered triggers
//! for the same object converge to the same result without locking.

use crate::client::{NamespaceLister, PatchClient};
use crate::stats::ReconcileStats;
use locsync_common::{Error, PlacementConfig, ResourceObject, ResourceType, Result, TenantName};
use locsync_placement::patch::patch_map_json;
use locsync_placement::{LocationKeys, PlacementPatch, compute_placement};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

/// What a reconcile call did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Excluded type or object outside any namespace
    Skipped,
    /// The namespace is gone; the object will be cleaned up with it
    NamespaceMissing,
    /// The object already matches its namespace
    Unchanged,
    /// A patch was applied
    Patched(PlacementPatch),
}

/// Aligns objects with the placement of their namespace
pub struct Reconciler {
    config: PlacementConfig,
    keys: LocationKeys,
    namespaces: Arc<dyn NamespaceLister>,
    client: Arc<dyn PatchClient>,
    stats: Arc<ReconcileStats>,
}

impl Reconciler {
    /// Create a reconciler
    pub fn new(
        config: &PlacementConfig,
        namespaces: Arc<dyn NamespaceLister>,
        client: Arc<dyn PatchClient>,
    ) -> Self {
        Self {
            config: config.clone(),
            keys: LocationKeys::from(config),
            namespaces,
            client,
            stats: Arc::new(ReconcileStats::default()),
        }
    }

    /// Reconciliation counters
    #[must_use]
    pub fn stats(&self) -> &Arc<ReconcileStats> {
        &self.stats
    }

    /// Set the locations of `object` to match its namespace
    ///
    /// Cancelling `cancel` aborts the namespace lookup or the patch call with
    /// `Error::Cancelled`. Patch failures are returned as-is; retrying is up
    /// to the caller.
    pub async fn reconcile(
        &self,
        cancel: &CancellationToken,
        tenant: &TenantName,
        object: &ResourceObject,
        resource: &ResourceType,
    ) -> Result<ReconcileOutcome> {
        let result = self.reconcile_object(cancel, tenant, object, resource).await;
        self.stats.record(&result);
        result
    }

    async fn reconcile_object(
        &self,
        cancel: &CancellationToken,
        tenant: &TenantName,
        object: &ResourceObject,
        resource: &ResourceType,
    ) -> Result<ReconcileOutcome> {
        if self.config.is_excluded(resource) {
            trace!(
                %resource,
                namespace = %object.namespace,
                name = %object.name,
                "Skipping reconciliation of excluded type"
            );
            return Ok(ReconcileOutcome::Skipped);
        }

        debug!(%resource, %tenant, namespace = %object.namespace, name = %object.name, "Reconciling");

        // Cluster-scoped objects, namespaces included.
        if !object.is_namespaced() {
            trace!(%resource, %tenant, name = %object.name, "No namespace; ignoring");
            return Ok(ReconcileOutcome::Skipped);
        }

        let namespace = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            result = self.namespaces.get(tenant, &object.namespace) => result,
        };
        let namespace = match namespace {
            Ok(namespace) => namespace,
            Err(e) if e.is_not_found() => {
                debug!(%tenant, namespace = %object.namespace, "Namespace is gone; ignoring");
                return Ok(ReconcileOutcome::NamespaceMissing);
            }
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                return Err(Error::NamespaceLookup {
                    tenant: tenant.clone(),
                    namespace: object.namespace.clone(),
                    name: object.name.clone(),
                    source: Box::new(e),
                });
            }
        };

        let placement = compute_placement(&self.keys, &namespace.metadata, &object.metadata);
        if placement.is_empty() {
            return Ok(ReconcileOutcome::Unchanged);
        }

        let body = placement
            .to_merge_patch()
            .to_vec()
            .inspect_err(|e| error!(error = %e, "Unexpected merge patch serialization error"))?;

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            result = self.client.patch(tenant, resource, &namespace.name, &object.name, &body) => {
                result?;
            }
        }

        info!(
            %resource,
            %tenant,
            namespace = %namespace.name,
            name = %object.name,
            labels = %patch_map_json(placement.labels.as_ref()),
            annotations = %patch_map_json(placement.annotations.as_ref()),
            "Patched location assignment"
        );
        Ok(ReconcileOutcome::Patched(placement))
    }
}
