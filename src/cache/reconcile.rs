//! Response reconciliation: merge the origin's answer (or the decision to
//! skip the origin) with the stored entry.
//!
//! Everything here is a pure function of its inputs. The engine applies the
//! returned [`StoreAction`] to the store.

use reqwest::StatusCode;

use super::entry::{body_digest, CacheEntry};
use crate::config::CacheConfig;
use crate::http::HttpResponse;

/// Set on responses built from the stored entry.
pub const X_CACHED: &str = "X-Cached";
/// Set when the body is identical to the stored one.
pub const X_CONTENT_UNCHANGED: &str = "X-Content-Unchanged";

/// How a request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Answered from cache without a network call.
    FastPath,
    /// The origin answered 304; the stored body was served.
    NotModified,
    /// The origin's answer was rejected by the approval predicate; the
    /// stored body was served.
    ApprovalRejected,
    /// A usable entry existed and the origin sent a new body.
    Refetched { unchanged: bool, stored: bool },
    /// No usable entry existed.
    Miss { stored: bool },
}

/// What the engine must do to the store after answering.
///
/// Access times are refreshed by the engine when the entry is read, so
/// serving a stored entry needs no action of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    None,
    /// Replace the entry.
    Write(Box<CacheEntry>),
}

/// The response for the caller plus the store side effect.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub response: HttpResponse,
    pub resolution: Resolution,
    pub action: StoreAction,
}

/// Build a caller-facing response from a stored entry, tagged `X-Cached`.
pub fn response_from_entry(entry: &CacheEntry, unchanged: bool) -> HttpResponse {
    let status = StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK);
    let mut response = HttpResponse::new(entry.url.clone(), status)
        .with_body(entry.body.clone());
    for (name, value) in &entry.headers {
        response.set_header(name, value);
    }
    if let Some(etag) = &entry.etag {
        response.set_header("ETag", etag);
    }
    response.set_header(X_CACHED, "1");
    if unchanged {
        response.set_header(X_CONTENT_UNCHANGED, "1");
    }
    response
}

/// Fast path: answer purely from the stored entry.
pub fn serve_from_cache(entry: &CacheEntry) -> Reconciled {
    Reconciled {
        response: response_from_entry(entry, true),
        resolution: Resolution::FastPath,
        action: StoreAction::None,
    }
}

/// Merge the origin's `response` with the usable stored `entry` (if any).
///
/// `url` and `range` identify the request; `now` is the client clock in
/// Unix seconds.
pub fn reconcile(
    config: &CacheConfig,
    url: &str,
    range: Option<&str>,
    entry: Option<&CacheEntry>,
    response: HttpResponse,
    now: i64,
) -> Reconciled {
    if let Some(entry) = entry {
        if response.status == StatusCode::NOT_MODIFIED {
            let mut refreshed = entry.clone();
            refreshed.refresh_not_modified(&response, now);
            return Reconciled {
                response: response_from_entry(&refreshed, true),
                resolution: Resolution::NotModified,
                action: StoreAction::Write(Box::new(refreshed)),
            };
        }
        if !config.approves(&response) {
            return Reconciled {
                response: response_from_entry(entry, false),
                resolution: Resolution::ApprovalRejected,
                action: StoreAction::None,
            };
        }
    } else if !config.approves(&response) {
        return Reconciled {
            response,
            resolution: Resolution::Miss { stored: false },
            action: StoreAction::None,
        };
    }

    let mut response = response;
    let unchanged = entry
        .and_then(|e| e.content_digest.as_deref())
        .is_some_and(|digest| digest == body_digest(&response.body));
    if unchanged {
        response.set_header(X_CONTENT_UNCHANGED, "1");
    }

    let cacheable = matches!(
        response.status,
        StatusCode::OK | StatusCode::PARTIAL_CONTENT
    );
    let action = if cacheable {
        StoreAction::Write(Box::new(CacheEntry::from_response(
            url, range, &response, now,
        )))
    } else {
        StoreAction::None
    };

    let resolution = match entry {
        Some(_) => Resolution::Refetched {
            unchanged,
            stored: cacheable,
        },
        None => Resolution::Miss { stored: cacheable },
    };

    Reconciled {
        response,
        resolution,
        action,
    }
}
