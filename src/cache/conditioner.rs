//! Conditional request construction.

use reqwest::header::{HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH};

use super::entry::CacheEntry;
use crate::http::HttpRequest;

/// `true` if `entry` was stored for exactly this URL and range.
pub fn entry_matches(entry: &CacheEntry, url: &str, range: Option<&str>) -> bool {
    let range = range.filter(|r| !r.is_empty());
    entry.url == url && entry.range.as_deref() == range
}

/// Attach `If-Modified-Since` / `If-None-Match` from a matching entry.
///
/// Returns `true` if at least one validator was added. Entries stored for
/// another URL or range leave the request untouched.
pub fn condition_request(request: &mut HttpRequest, entry: &CacheEntry) -> bool {
    let range = request.header("range").map(str::to_string);
    if !entry_matches(entry, &request.url, range.as_deref()) {
        return false;
    }

    let mut conditioned = false;
    if let Some(value) = entry
        .header("last-modified")
        .and_then(|v| HeaderValue::from_str(v).ok())
    {
        request.headers.insert(IF_MODIFIED_SINCE, value);
        conditioned = true;
    }
    if let Some(value) = entry
        .etag
        .as_deref()
        .and_then(|v| HeaderValue::from_str(v).ok())
    {
        request.headers.insert(IF_NONE_MATCH, value);
        conditioned = true;
    }
    conditioned
}
