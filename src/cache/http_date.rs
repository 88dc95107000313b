//! HTTP-date parsing and clock-skew correction.
//!
//! Timestamps are Unix seconds. Parsing accepts the three RFC 7231 formats:
//! IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`), RFC 850
//! (`Sunday, 06-Nov-94 08:49:37 GMT`) and asctime (`Sun Nov  6 08:49:37 1994`).

use chrono::{DateTime, NaiveDateTime};

/// Parse an HTTP date into Unix seconds.
pub fn parse_http_date(raw: &str) -> Option<i64> {
    let raw = raw.trim();

    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%a, %d %b %Y %H:%M:%S GMT") {
        return Some(dt.and_utc().timestamp());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%A, %d-%b-%y %H:%M:%S GMT") {
        return Some(dt.and_utc().timestamp());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%a %b %e %H:%M:%S %Y") {
        return Some(dt.and_utc().timestamp());
    }
    DateTime::parse_from_rfc2822(raw).ok().map(|dt| dt.timestamp())
}

/// Format Unix seconds as an IMF-fixdate.
pub fn format_http_date(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .unwrap_or_default()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Translate the origin's Last-Modified into the client clock.
///
/// The offset between the client clock (`now`) and the origin clock (the
/// response's `Date`) is added to Last-Modified. Without a usable `Date` the
/// Last-Modified value is taken as is; without a usable Last-Modified there
/// is nothing to adjust.
pub fn adjusted_last_modified(
    last_modified: Option<&str>,
    date: Option<&str>,
    now: i64,
) -> Option<i64> {
    let last_modified = last_modified.and_then(parse_http_date)?;
    match date.and_then(parse_http_date) {
        Some(server_now) => Some(last_modified + (now - server_now)),
        None => Some(last_modified),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Sun, 06 Nov 1994 08:49:37 GMT
    const T: i64 = 784_111_777;

    #[test]
    fn test_parse_imf_fixdate() {
        assert_eq!(parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT"), Some(T));
    }

    #[test]
    fn test_parse_rfc850() {
        assert_eq!(parse_http_date("Sunday, 06-Nov-94 08:49:37 GMT"), Some(T));
    }

    #[test]
    fn test_parse_asctime() {
        assert_eq!(parse_http_date("Sun Nov  6 08:49:37 1994"), Some(T));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_http_date("yesterday"), None);
        assert_eq!(parse_http_date(""), None);
    }

    #[test]
    fn test_format_roundtrips_through_parse() {
        let formatted = format_http_date(T);
        assert_eq!(formatted, "Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(parse_http_date(&formatted), Some(T));
    }

    #[test]
    fn test_adjusted_last_modified_corrects_skew() {
        let date = format_http_date(T);
        let last_modified = format_http_date(T - 100);
        // Client clock runs 30s ahead of the origin.
        let now = T + 30;
        let adjusted = adjusted_last_modified(Some(&last_modified), Some(&date), now).unwrap();
        assert_eq!(adjusted, now - 100);
        assert_eq!(adjusted, T - 70);
    }

    #[test]
    fn test_adjusted_last_modified_without_date() {
        let last_modified = format_http_date(T - 100);
        assert_eq!(
            adjusted_last_modified(Some(&last_modified), None, T + 500),
            Some(T - 100)
        );
    }

    #[test]
    fn test_adjusted_last_modified_requires_last_modified() {
        let date = format_http_date(T);
        assert_eq!(adjusted_last_modified(None, Some(&date), T), None);
        assert_eq!(adjusted_last_modified(Some("garbage"), Some(&date), T), None);
    }
}
