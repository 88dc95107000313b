//! Freshness policy: may a request be answered from cache without asking
//! the origin?
//!
//! The plain policy measures the window from the entry's last write. The
//! impatient policy measures it from the origin's own Last-Modified,
//! translated into the client clock when the entry was written, so a client
//! re-checks soon after the origin is expected to have changed.

use super::entry::CacheEntry;
use crate::config::CacheConfig;

/// Outcome of the freshness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Answer from the stored entry; no network call.
    ServeFromCacheOnly,
    /// Send a (conditional) request to the origin.
    MustRevalidate,
}

/// Decide freshness for `entry` at client time `now` (Unix seconds).
pub fn decide(config: &CacheConfig, entry: Option<&CacheEntry>, now: i64) -> Freshness {
    let window = i64::try_from(config.no_update_secs).unwrap_or(i64::MAX);
    if window == 0 {
        return Freshness::MustRevalidate;
    }
    let Some(entry) = entry else {
        return Freshness::MustRevalidate;
    };

    let fresh = if config.no_update_impatient {
        match (entry.adjusted_last_modified, entry.last_updated) {
            (Some(modified), _) => {
                let fudge = i64::try_from(config.no_update_impatient_fudge_secs).unwrap_or(0);
                within(window.saturating_add(fudge), now, modified)
            }
            (None, Some(updated)) => within(window, now, updated),
            (None, None) => false,
        }
    } else {
        entry
            .last_updated
            .is_some_and(|updated| within(window, now, updated))
    };

    if fresh {
        Freshness::ServeFromCacheOnly
    } else {
        Freshness::MustRevalidate
    }
}

/// `true` if less than `window` seconds have passed from `since` to `now`.
///
/// A `since` in the future, or so far in the past that the age overflows,
/// never counts as fresh.
fn within(window: i64, now: i64, since: i64) -> bool {
    match now.checked_sub(since) {
        Some(age) if age >= 0 => window > age,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::http_date::format_http_date;
    use crate::http::HttpResponse;
    use reqwest::StatusCode;

    const NOW: i64 = 1_700_000_000;

    fn entry(last_updated: Option<i64>, adjusted: Option<i64>) -> CacheEntry {
        CacheEntry {
            url: "https://example.com/".into(),
            etag: None,
            range: None,
            content_digest: None,
            status: 200,
            last_updated,
            adjusted_last_modified: adjusted,
            headers: Vec::new(),
            extra: Vec::new(),
            body: Vec::new(),
        }
    }

    fn config(no_update: u64) -> CacheConfig {
        CacheConfig::new("/tmp/hct").with_no_update(no_update)
    }

    #[test]
    fn test_disabled_window_always_revalidates() {
        let e = entry(Some(NOW), None);
        assert_eq!(decide(&config(0), Some(&e), NOW), Freshness::MustRevalidate);
    }

    #[test]
    fn test_missing_entry_revalidates() {
        assert_eq!(decide(&config(900), None, NOW), Freshness::MustRevalidate);
    }

    #[test]
    fn test_missing_timestamp_revalidates() {
        let e = entry(None, None);
        assert_eq!(decide(&config(900), Some(&e), NOW), Freshness::MustRevalidate);
        let impatient = config(900).with_impatient(true);
        assert_eq!(decide(&impatient, Some(&e), NOW), Freshness::MustRevalidate);
    }

    #[test]
    fn test_window_boundary() {
        let e = entry(Some(NOW), None);
        let cfg = config(900);
        assert_eq!(decide(&cfg, Some(&e), NOW + 899), Freshness::ServeFromCacheOnly);
        assert_eq!(decide(&cfg, Some(&e), NOW + 900), Freshness::MustRevalidate);
        assert_eq!(decide(&cfg, Some(&e), NOW + 901), Freshness::MustRevalidate);
    }

    #[test]
    fn test_plain_mode_ignores_adjusted_last_modified() {
        let e = entry(Some(NOW), Some(NOW - 10_000));
        assert_eq!(
            decide(&config(900), Some(&e), NOW + 10),
            Freshness::ServeFromCacheOnly
        );
    }

    #[test]
    fn test_impatient_uses_adjusted_last_modified_with_fudge() {
        let cfg = config(900).with_impatient(true).with_impatient_fudge(2);
        let adjusted = NOW - 130;
        let e = entry(Some(NOW), Some(adjusted));
        assert_eq!(
            decide(&cfg, Some(&e), adjusted + 900 + 2 - 1),
            Freshness::ServeFromCacheOnly
        );
        assert_eq!(
            decide(&cfg, Some(&e), adjusted + 900 + 2),
            Freshness::MustRevalidate
        );
    }

    #[test]
    fn test_impatient_falls_back_to_last_updated() {
        let cfg = config(900).with_impatient(true);
        let e = entry(Some(NOW), None);
        assert_eq!(decide(&cfg, Some(&e), NOW + 899), Freshness::ServeFromCacheOnly);
        assert_eq!(decide(&cfg, Some(&e), NOW + 901), Freshness::MustRevalidate);
    }

    #[test]
    fn test_impatient_with_skewed_origin_clock() {
        // Origin Date = T, Last-Modified = T - 100, client clock 30s ahead.
        let t = NOW;
        let client_now = t + 30;
        let response = HttpResponse::new("https://example.com/", StatusCode::OK)
            .with_header("Date", &format_http_date(t))
            .with_header("Last-Modified", &format_http_date(t - 100));
        let stored = CacheEntry::from_response("https://example.com/", None, &response, client_now);
        let adjusted = stored.adjusted_last_modified.unwrap();
        assert_eq!(adjusted, stored.last_updated.unwrap() - 100);

        let cfg = config(900).with_impatient(true).with_impatient_fudge(2);
        assert_eq!(
            decide(&cfg, Some(&stored), adjusted + 900 + 2 - 1),
            Freshness::ServeFromCacheOnly
        );
        assert_eq!(
            decide(&cfg, Some(&stored), adjusted + 900 + 2),
            Freshness::MustRevalidate
        );
    }

    #[test]
    fn test_extreme_timestamps_revalidate() {
        let cfg = config(900);
        for ts in [i64::MIN, i64::MAX] {
            let e = entry(Some(ts), None);
            assert_eq!(decide(&cfg, Some(&e), NOW), Freshness::MustRevalidate);

            let impatient = config(900).with_impatient(true);
            let e = entry(Some(NOW), Some(ts));
            assert_eq!(decide(&impatient, Some(&e), NOW), Freshness::MustRevalidate);
        }
    }

    #[test]
    fn test_timestamp_in_the_future_revalidates() {
        let e = entry(Some(NOW + 60), None);
        assert_eq!(decide(&config(900), Some(&e), NOW), Freshness::MustRevalidate);
    }
}
