//! Placement reconciliation for locsync
//!
//! Keeps the location assignment of namespaced objects in line with the
//! assignment of their namespace:
//! - [`Reconciler`] aligns a single object
//! - [`BulkSyncer`] re-enqueues every cached object of a type
//! - [`Controller`] drives both from a deduplicating [`WorkQueue`]
//!
//! Caches and the remote store are reached through the traits in
//! [`client`]; [`MemoryStore`] implements all of them in memory.

pub mod client;
pub mod controller;
pub mod memory;
pub mod queue;
pub mod reconcile;
pub mod stats;
pub mod sync;

pub use client::{Enqueue, Listers, NamespaceLister, PatchClient, ResourceInformers, ResourceLister};
pub use controller::{Controller, QueueItem};
pub use memory::{AppliedPatch, Fixture, FixtureResources, MemoryStore};
pub use queue::WorkQueue;
pub use reconcile::{ReconcileOutcome, Reconciler};
pub use stats::{ReconcileStats, StatsSnapshot};
pub use sync::BulkSyncer;
