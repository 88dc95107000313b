//! Cache key derivation.
//!
//! A key is the SHA-256 of the absolute URL, or of `url + "\n" + range` when
//! the request carries a Range header, so every byte range of a URL gets its
//! own slot. The key doubles as the entry's file name. The stored URL and
//! range are still compared on every read because two inputs can, in
//! principle, hash to the same key.

use std::fmt;

use sha2::{Digest, Sha256};

/// Length of a key in hex characters.
pub const KEY_HEX_LEN: usize = 64;

/// Stable, collision-resistant identifier of a cached (URL, range) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for `url` and an optional Range header value.
    ///
    /// An empty range is treated as no range.
    pub fn derive(url: &str, range: Option<&str>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        if let Some(range) = range.filter(|r| !r.is_empty()) {
            hasher.update(b"\n");
            hasher.update(range.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap an existing file name, if it has the key format.
    pub fn from_file_name(name: &str) -> Option<Self> {
        is_cache_key_name(name).then(|| Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `true` if `name` is 64 lowercase hex characters.
pub fn is_cache_key_name(name: &str) -> bool {
    name.len() == KEY_HEX_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
