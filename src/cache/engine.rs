//! The caching transport: wraps any [`HttpTransport`] and answers GET
//! requests from a disk-backed store where HTTP conditional-caching rules
//! allow.
//!
//! Per request:
//!
//! 1. Non-GET requests, callback deliveries and requests that already carry
//!    `If-Modified-Since` go straight to the wrapped transport.
//! 2. The stored entry for the URL/range key is loaded. Unreadable or
//!    corrupt entries and entries belonging to another URL or range count as
//!    a miss.
//! 3. Inside the no-update window the entry is served without a network
//!    call. Otherwise the request is sent with validators attached and the
//!    answer is reconciled with the stored entry.
//!
//! Store failures are logged and never reach the caller. Dropping the
//! transport without calling [`CachingTransport::close`] still runs one
//! eviction sweep.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::IF_MODIFIED_SINCE;
use reqwest::Method;
use tracing::{debug, warn};

use super::conditioner::{condition_request, entry_matches};
use super::entry::CacheEntry;
use super::eviction::{EvictionSweeper, SweepReport};
use super::freshness::{decide, Freshness};
use super::key::CacheKey;
use super::reconcile::{reconcile, serve_from_cache, Reconciled, Resolution, StoreAction};
use super::stats::CacheStats;
use super::store::EntryStore;
use crate::config::CacheConfig;
use crate::error::{HctError, Result};
use crate::http::{BodyDelivery, HttpRequest, HttpResponse, HttpTransport};

/// Per-request decisions are info-level when the config is verbose.
macro_rules! decision {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}

/// Source of the client's current time in Unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// An [`HttpTransport`] decorator that caches GET responses on disk.
pub struct CachingTransport<T> {
    inner: T,
    config: CacheConfig,
    store: EntryStore,
    clock: Arc<dyn Clock>,
    stats: CacheStats,
    /// Taken by `close`; `Drop` sweeps if it is still present.
    sweeper: Option<EvictionSweeper>,
}

impl<T> CachingTransport<T> {
    /// Wrap `inner`, creating the cache directory if needed.
    pub fn new(inner: T, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let store = EntryStore::open(&config.base_path)?;
        let sweeper = EvictionSweeper::new(store.clone(), config.max_age_hours);
        debug!(
            path = %store.base_path().display(),
            no_update_secs = config.no_update_secs,
            impatient = config.no_update_impatient,
            "Cache opened"
        );
        Ok(Self {
            inner,
            config,
            store,
            clock: Arc::new(SystemClock),
            stats: CacheStats::new(),
            sweeper: Some(sweeper),
        })
    }

    /// Replace the clock used for freshness decisions and timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    /// Remove the entry cached for `url` and `range`. Returns `true` if no
    /// entry remains.
    pub fn invalidate(&self, url: &str, range: Option<&str>) -> bool {
        let key = CacheKey::derive(url, range);
        let removed = self.store.delete(&key);
        decision!(self.config.verbose, key = %key, url = %url, "Invalidated cache entry");
        removed
    }

    /// Run an eviction sweep now.
    pub fn sweep(&self) -> SweepReport {
        self.sweeper
            .as_ref()
            .map(EvictionSweeper::sweep)
            .unwrap_or_default()
    }

    /// Shut the cache down, running the final eviction sweep.
    pub fn close(mut self) -> SweepReport {
        self.stats.emit_summary("close");
        self.sweeper
            .take()
            .map(|sweeper| sweeper.sweep())
            .unwrap_or_default()
    }

    /// Load the entry for `key` if it can be used for this request.
    fn load_usable(&self, key: &CacheKey, url: &str, range: Option<&str>) -> Option<CacheEntry> {
        let entry = match self.store.lookup(key) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring unreadable cache entry");
                self.stats.record_store_failure();
                return None;
            }
        };

        if !entry_matches(&entry, url, range) {
            let collision = HctError::KeyCollision {
                key: key.to_string(),
                stored: describe(&entry.url, entry.range.as_deref()),
                requested: describe(url, range),
            };
            warn!("{}", collision);
            self.stats.record_collision();
            return None;
        }

        if let Err(e) = self.store.touch(key) {
            debug!(key = %key, error = %e, "Failed to refresh cache entry access time");
        }
        Some(entry)
    }

    /// Apply the store side effect and record the outcome.
    fn finish(&self, key: &CacheKey, url: &str, reconciled: Reconciled) -> HttpResponse {
        let Reconciled {
            response,
            resolution,
            action,
        } = reconciled;

        if let StoreAction::Write(entry) = action {
            match self.store.write(key, &entry) {
                Ok(()) => self.stats.record_stored(),
                Err(e) => {
                    warn!(key = %key, url = %url, error = %e, "Failed to persist cache entry");
                    self.stats.record_store_failure();
                }
            }
        }

        self.stats.record(resolution);
        decision!(
            self.config.verbose,
            key = %key,
            url = %url,
            status = %response.status,
            resolution = ?resolution,
            "Cache decision"
        );
        response
    }
}

impl<T: HttpTransport> CachingTransport<T> {
    /// Plain buffered GET through the cache.
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.execute(HttpRequest::get(url)).await
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for CachingTransport<T> {
    async fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        if let Some(reason) = bypass_reason(&request) {
            self.stats.record_bypass();
            decision!(self.config.verbose, url = %request.url, reason, "Bypassing cache");
            return self.inner.execute(request).await;
        }

        let url = request.url.clone();
        let range = request
            .header("range")
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        let key = CacheKey::derive(&url, range.as_deref());
        let entry = self.load_usable(&key, &url, range.as_deref());

        if let Some(entry) = &entry {
            let freshness = decide(&self.config, Some(entry), self.clock.now());
            if freshness == Freshness::ServeFromCacheOnly {
                return Ok(self.finish(&key, &url, serve_from_cache(entry)));
            }
            let conditioned = condition_request(&mut request, entry);
            decision!(
                self.config.verbose,
                key = %key,
                url = %url,
                conditioned,
                "Revalidating cache entry"
            );
        }

        let response = self.inner.execute(request).await?;
        let reconciled = reconcile(
            &self.config,
            &url,
            range.as_deref(),
            entry.as_ref(),
            response,
            self.clock.now(),
        );
        if reconciled.resolution == Resolution::ApprovalRejected {
            decision!(
                self.config.verbose,
                key = %key,
                url = %url,
                "Origin response rejected, serving stored copy"
            );
        }
        Ok(self.finish(&key, &url, reconciled))
    }
}

impl<T> Drop for CachingTransport<T> {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            let report = sweeper.sweep();
            debug!(
                removed = report.removed.len(),
                "Cache dropped without close, ran eviction sweep"
            );
        }
    }
}

/// Why `request` must skip the cache, if it must.
fn bypass_reason(request: &HttpRequest) -> Option<&'static str> {
    if request.method != Method::GET {
        Some("method")
    } else if matches!(request.delivery, BodyDelivery::Callback(_)) {
        Some("callback delivery")
    } else if request.headers.contains_key(IF_MODIFIED_SINCE) {
        Some("caller conditional")
    } else {
        None
    }
}

fn describe(url: &str, range: Option<&str>) -> String {
    match range {
        Some(range) => format!("{} [{}]", url, range),
        None => url.to_string(),
    }
}
