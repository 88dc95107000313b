//! hct: a transparent, disk-backed HTTP response cache.
//!
//! [`CachingTransport`] wraps any [`HttpTransport`] and serves GET requests
//! from a directory of entry files, revalidating with `If-Modified-Since` /
//! `If-None-Match` once an entry's no-update window has passed.
//!
//! ```no_run
//! use hct::{CacheConfig, CachingTransport, ReqwestTransport};
//!
//! # async fn run() -> hct::Result<()> {
//! let config = CacheConfig::new("/var/cache/hct").with_no_update(900);
//! let cache = CachingTransport::new(ReqwestTransport::default(), config)?;
//! let response = cache.get("https://example.com/feed.xml").await?;
//! println!("{} cached={:?}", response.status, response.header("X-Cached"));
//! cache.close();
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheStatsSnapshot, CachingTransport, Clock, SweepReport, SystemClock};
pub use config::{CacheConfig, CacheSettings};
pub use error::{HctError, Result};
pub use http::{BodyDelivery, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
