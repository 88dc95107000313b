//! Time-based eviction of entries that have not been requested recently.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use super::key::CacheKey;
use super::store::{remove_file_best_effort, EntryStore, StoreListing};
use crate::error::HctError;

/// Summary of one sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    /// Entries examined.
    pub scanned: usize,
    /// Entries removed for exceeding the maximum age.
    pub removed: Vec<CacheKey>,
    /// Leftover temp files removed.
    pub temp_files_removed: usize,
    /// Files the cache does not own; reported, never removed.
    pub unknown: Vec<PathBuf>,
    /// Stale entries that could not be removed.
    pub failed: usize,
}

/// Walks the store and removes entries whose last access is older than the
/// configured maximum age.
#[derive(Debug, Clone)]
pub struct EvictionSweeper {
    store: EntryStore,
    max_age: Duration,
}

impl EvictionSweeper {
    pub fn new(store: EntryStore, max_age_hours: f64) -> Self {
        let max_age =
            Duration::try_from_secs_f64(max_age_hours * 3600.0).unwrap_or(Duration::MAX);
        Self { store, max_age }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(SystemTime::now())
    }

    /// Sweep as if the current time were `now`.
    pub fn sweep_at(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();
        let listings = match self.store.enumerate(now) {
            Ok(listings) => listings,
            Err(e) => {
                warn!(
                    path = %self.store.base_path().display(),
                    error = %e,
                    "Failed to list cache directory, skipping sweep"
                );
                return report;
            }
        };

        for listing in listings {
            let age_days = listing.age_days().unwrap_or_default();
            match listing {
                StoreListing::Entry { key, age } => {
                    report.scanned += 1;
                    if age <= self.max_age {
                        continue;
                    }
                    if self.store.delete(&key) {
                        debug!(key = %key, age_days, "Evicted stale cache entry");
                        report.removed.push(key);
                    } else {
                        report.failed += 1;
                    }
                }
                StoreListing::TempFile { path, age } => {
                    if age > self.max_age && remove_file_best_effort(&path) {
                        debug!(path = %path.display(), age_days, "Removed leftover temp file");
                        report.temp_files_removed += 1;
                    }
                }
                StoreListing::Unknown { path } => {
                    warn!("{}", HctError::UnknownStoreFile(path.clone()));
                    report.unknown.push(path);
                }
            }
        }

        debug!(
            scanned = report.scanned,
            removed = report.removed.len(),
            unknown = report.unknown.len(),
            "Cache sweep finished"
        );
        report
    }
}
