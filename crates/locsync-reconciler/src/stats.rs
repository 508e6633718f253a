//! Reconciliation counters

use crate::reconcile::ReconcileOutcome;
use locsync_common::Result;
use std::sync::atomic::{AtomicU64, Ordering};

/// Reconciliation statistics for monitoring
#[derive(Debug, Default)]
pub struct ReconcileStats {
    /// Number of reconcile calls
    pub reconciled: AtomicU64,
    /// Objects skipped by type exclusion or scope
    pub skipped: AtomicU64,
    /// Objects already matching their namespace (or whose namespace is gone)
    pub unchanged: AtomicU64,
    /// Patches applied
    pub patched: AtomicU64,
    /// Reconcile calls that returned an error
    pub failed: AtomicU64,
}

/// Point-in-time copy of [`ReconcileStats`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub reconciled: u64,
    pub skipped: u64,
    pub unchanged: u64,
    pub patched: u64,
    pub failed: u64,
}

impl ReconcileStats {
    /// Count one reconcile result
    pub fn record(&self, result: &Result<ReconcileOutcome>) {
        self.reconciled.fetch_add(1, Ordering::Relaxed);
        let counter = match result {
            Ok(ReconcileOutcome::Skipped) => &self.skipped,
            Ok(ReconcileOutcome::NamespaceMissing | ReconcileOutcome::Unchanged) => &self.unchanged,
            Ok(ReconcileOutcome::Patched(_)) => &self.patched,
            Err(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reconciled: self.reconciled.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            patched: self.patched.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    /// Reset all statistics
    pub fn reset(&self) {
        self.reconciled.store(0, Ordering::Relaxed);
        self.skipped.store(0, Ordering::Relaxed);
        self.unchanged.store(0, Ordering::Relaxed);
        self.patched.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
    }
}
