//! Lock-free counters describing how requests were resolved.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use super::reconcile::Resolution;

/// Per-engine cache counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    fast_path_hits: AtomicU64,
    not_modified: AtomicU64,
    approval_rejections: AtomicU64,
    refetches: AtomicU64,
    unchanged_refetches: AtomicU64,
    misses: AtomicU64,
    stored: AtomicU64,
    bypassed: AtomicU64,
    store_failures: AtomicU64,
    collisions: AtomicU64,
}

/// Plain copy of [`CacheStats`] at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    /// Answered without a network call.
    pub fast_path_hits: u64,
    /// Origin answered 304.
    pub not_modified: u64,
    /// Origin answer rejected by the approval predicate.
    pub approval_rejections: u64,
    /// Full bodies received for an existing entry.
    pub refetches: u64,
    /// Refetches whose body matched the stored digest.
    pub unchanged_refetches: u64,
    /// Requests with no usable entry.
    pub misses: u64,
    /// Entries written.
    pub stored: u64,
    /// Requests forwarded without touching the cache.
    pub bypassed: u64,
    /// Failed reads or writes of the store.
    pub store_failures: u64,
    /// Entries found under a key but stored for another URL or range.
    pub collisions: u64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one resolved request.
    pub fn record(&self, resolution: Resolution) {
        match resolution {
            Resolution::FastPath => bump(&self.fast_path_hits),
            Resolution::NotModified => bump(&self.not_modified),
            Resolution::ApprovalRejected => bump(&self.approval_rejections),
            Resolution::Refetched { unchanged, .. } => {
                bump(&self.refetches);
                if unchanged {
                    bump(&self.unchanged_refetches);
                }
            }
            Resolution::Miss { .. } => bump(&self.misses),
        }
    }

    pub fn record_stored(&self) {
        bump(&self.stored);
    }

    pub fn record_bypass(&self) {
        bump(&self.bypassed);
    }

    pub fn record_store_failure(&self) {
        bump(&self.store_failures);
    }

    pub fn record_collision(&self) {
        bump(&self.collisions);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        CacheStatsSnapshot {
            fast_path_hits: load(&self.fast_path_hits),
            not_modified: load(&self.not_modified),
            approval_rejections: load(&self.approval_rejections),
            refetches: load(&self.refetches),
            unchanged_refetches: load(&self.unchanged_refetches),
            misses: load(&self.misses),
            stored: load(&self.stored),
            bypassed: load(&self.bypassed),
            store_failures: load(&self.store_failures),
            collisions: load(&self.collisions),
        }
    }

    /// Emit current counters as a structured log line.
    pub fn emit_summary(&self, reason: &str) {
        let s = self.snapshot();
        info!(
            event = "cache_summary",
            reason = reason,
            fast_path_hits = s.fast_path_hits,
            not_modified = s.not_modified,
            approval_rejections = s.approval_rejections,
            refetches = s.refetches,
            misses = s.misses,
            stored = s.stored,
            bypassed = s.bypassed,
            store_failures = s.store_failures,
            "Cache statistics"
        );
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}
