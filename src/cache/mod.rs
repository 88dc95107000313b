//! Disk-backed HTTP response caching with conditional revalidation,
//! freshness windows and time-based eviction.

pub mod conditioner;
pub mod engine;
pub mod entry;
pub mod eviction;
pub mod freshness;
pub mod http_date;
pub mod key;
pub mod reconcile;
pub mod stats;
pub mod store;

pub use engine::{CachingTransport, Clock, SystemClock};
pub use entry::CacheEntry;
pub use eviction::{EvictionSweeper, SweepReport};
pub use freshness::Freshness;
pub use key::CacheKey;
pub use reconcile::{Resolution, X_CACHED, X_CONTENT_UNCHANGED};
pub use stats::{CacheStats, CacheStatsSnapshot};
pub use store::{EntryStore, StoreListing};
