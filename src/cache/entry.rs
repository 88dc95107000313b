//! Cache entries and their on-disk encoding.
//!
//! An entry file is a metadata block of `Key value` lines terminated by a
//! blank line, followed by the raw body up to end of file:
//!
//! ```text
//! Url https://example.com/feed.xml
//! ETag "abc"
//! Content-SHA256 9f86d0...
//! Code 200
//! X-HCT-LastUpdated 1700000000
//! X-HCT-LastModified 1699999900
//! Content-Type application/xml
//!
//! <body bytes>
//! ```
//!
//! Unknown keys are kept and written back unchanged. A file that ends before
//! the blank line decodes to an entry with an empty body.

use std::io::{self, BufRead, BufReader, Read, Write};

use sha2::{Digest, Sha256};
use thiserror::Error;

use super::http_date::{adjusted_last_modified, parse_http_date};
use crate::http::HttpResponse;

/// Response headers kept with every entry.
pub const CACHED_HEADERS: [&str; 6] = [
    "Content-Type",
    "Content-Encoding",
    "Content-Length",
    "Content-Range",
    "Last-Modified",
    "Date",
];

const KEY_URL: &str = "Url";
const KEY_ETAG: &str = "ETag";
const KEY_RANGE: &str = "Range";
const KEY_DIGEST: &str = "Content-SHA256";
const KEY_CODE: &str = "Code";
const KEY_LAST_UPDATED: &str = "X-HCT-LastUpdated";
const KEY_LAST_MODIFIED: &str = "X-HCT-LastModified";

/// Why an entry file could not be decoded.
#[derive(Debug, Error)]
pub enum EntryFormatError {
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    #[error("malformed metadata line: {0:?}")]
    MalformedLine(String),

    #[error("missing {0} field")]
    MissingField(&'static str),

    #[error("invalid {field} value: {value:?}")]
    InvalidValue { field: &'static str, value: String },
}

/// The persisted unit: one response's metadata and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Requested URL, compared on read to detect key collisions.
    pub url: String,
    pub etag: Option<String>,
    /// Range header of the request, `None` for the whole resource.
    pub range: Option<String>,
    /// SHA-256 hex of the body.
    pub content_digest: Option<String>,
    pub status: u16,
    /// Client-clock Unix seconds of the last write.
    pub last_updated: Option<i64>,
    /// Origin Last-Modified translated into the client clock.
    pub adjusted_last_modified: Option<i64>,
    /// Subset of [`CACHED_HEADERS`] present on the response.
    pub headers: Vec<(String, String)>,
    /// Metadata keys this version does not understand.
    pub extra: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CacheEntry {
    /// Build an entry from a fetched response at client time `now`.
    pub fn from_response(
        url: &str,
        range: Option<&str>,
        response: &HttpResponse,
        now: i64,
    ) -> Self {
        let headers = CACHED_HEADERS
            .iter()
            .filter_map(|name| {
                response
                    .header(name)
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();

        Self {
            url: url.to_string(),
            etag: response.header("etag").map(str::to_string),
            range: range.filter(|r| !r.is_empty()).map(str::to_string),
            content_digest: Some(body_digest(&response.body)),
            status: response.status.as_u16(),
            last_updated: Some(now),
            adjusted_last_modified: adjusted_last_modified(
                response.header("last-modified"),
                response.header("date"),
                now,
            ),
            headers,
            extra: Vec::new(),
            body: response.body.clone(),
        }
    }

    /// Cached header value, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Insert or replace a cached header.
    pub fn set_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    /// Fold a 304 Not Modified into this entry at client time `now`.
    ///
    /// Validators carried on the 304 replace the stored ones, the write
    /// timestamp restarts and the skew-adjusted Last-Modified is recomputed
    /// against the 304's `Date`. A 304 without a usable `Date` keeps the
    /// skew offset measured when the entry was last written.
    pub fn refresh_not_modified(&mut self, response: &HttpResponse, now: i64) {
        let previous_offset = self.skew_offset();
        if let Some(etag) = response.header("etag") {
            self.etag = Some(etag.to_string());
        }
        for name in ["Last-Modified", "Date"] {
            if let Some(value) = response.header(name) {
                self.set_header(name, value);
            }
        }
        self.last_updated = Some(now);

        let date = response.header("date");
        self.adjusted_last_modified = match (date.and_then(parse_http_date), previous_offset) {
            (None, Some(offset)) => self
                .header("last-modified")
                .and_then(parse_http_date)
                .map(|modified| modified.saturating_add(offset)),
            _ => adjusted_last_modified(self.header("last-modified"), date, now),
        };
    }

    /// Offset between the stored adjusted Last-Modified and the raw header.
    fn skew_offset(&self) -> Option<i64> {
        let modified = self.header("last-modified").and_then(parse_http_date)?;
        self.adjusted_last_modified
            .map(|adjusted| adjusted.saturating_sub(modified))
    }

    /// Serialize to `writer`.
    pub fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_field(writer, KEY_URL, &self.url)?;
        if let Some(etag) = &self.etag {
            write_field(writer, KEY_ETAG, etag)?;
        }
        if let Some(range) = &self.range {
            write_field(writer, KEY_RANGE, range)?;
        }
        if let Some(digest) = &self.content_digest {
            write_field(writer, KEY_DIGEST, digest)?;
        }
        write_field(writer, KEY_CODE, &self.status.to_string())?;
        if let Some(ts) = self.last_updated {
            write_field(writer, KEY_LAST_UPDATED, &ts.to_string())?;
        }
        if let Some(ts) = self.adjusted_last_modified {
            write_field(writer, KEY_LAST_MODIFIED, &ts.to_string())?;
        }
        for (name, value) in self.headers.iter().chain(self.extra.iter()) {
            write_field(writer, name, value)?;
        }
        writer.write_all(b"\n")?;
        writer.write_all(&self.body)
    }

    /// Serialize into a fresh buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.body.len() + 512);
        // Writing into a Vec cannot fail.
        let _ = self.encode(&mut buf);
        buf
    }

    /// Parse an entry from `reader`.
    pub fn decode<R: Read>(reader: R) -> Result<Self, EntryFormatError> {
        let mut reader = BufReader::new(reader);
        let mut url = None;
        let mut entry = CacheEntry {
            url: String::new(),
            etag: None,
            range: None,
            content_digest: None,
            status: 200,
            last_updated: None,
            adjusted_last_modified: None,
            headers: Vec::new(),
            extra: Vec::new(),
            body: Vec::new(),
        };

        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            if line.last() == Some(&b'\n') {
                line.pop();
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.is_empty() {
                break;
            }

            let text = std::str::from_utf8(&line).map_err(|_| {
                EntryFormatError::MalformedLine(String::from_utf8_lossy(&line).into_owned())
            })?;
            let (key, value) = text
                .split_once(' ')
                .ok_or_else(|| EntryFormatError::MalformedLine(text.to_string()))?;
            if key.is_empty() {
                return Err(EntryFormatError::MalformedLine(text.to_string()));
            }

            match key {
                KEY_URL => url = Some(value.to_string()),
                KEY_ETAG => entry.etag = Some(value.to_string()),
                KEY_RANGE => entry.range = Some(value.to_string()).filter(|r| !r.is_empty()),
                KEY_DIGEST => entry.content_digest = Some(value.to_string()),
                KEY_CODE => entry.status = parse_field(KEY_CODE, value)?,
                KEY_LAST_UPDATED => {
                    entry.last_updated = Some(parse_field(KEY_LAST_UPDATED, value)?)
                }
                KEY_LAST_MODIFIED => {
                    entry.adjusted_last_modified = Some(parse_field(KEY_LAST_MODIFIED, value)?)
                }
                _ => match CACHED_HEADERS
                    .iter()
                    .find(|name| name.eq_ignore_ascii_case(key))
                {
                    Some(name) => entry.set_header(name, value),
                    None => entry.extra.push((key.to_string(), value.to_string())),
                },
            }
        }

        entry.url = url.ok_or(EntryFormatError::MissingField(KEY_URL))?;
        reader.read_to_end(&mut entry.body)?;
        Ok(entry)
    }
}

/// SHA-256 hex digest of a body.
pub fn body_digest(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

fn write_field<W: Write>(writer: &mut W, key: &str, value: &str) -> io::Result<()> {
    // A line break inside a value would end the metadata block early.
    if value.contains(['\n', '\r']) {
        return Ok(());
    }
    writeln!(writer, "{} {}", key, value)
}

fn parse_field<T: std::str::FromStr>(
    field: &'static str,
    value: &str,
) -> Result<T, EntryFormatError> {
    value
        .trim()
        .parse()
        .map_err(|_| EntryFormatError::InvalidValue {
            field,
            value: value.to_string(),
        })
}
