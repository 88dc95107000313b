//! Error types for the HTTP response cache.
//!
//! Only [`HctError::Config`] (raised while building a cache) and
//! [`HctError::Transport`] (raised by the wrapped HTTP client) ever reach a
//! caller of the caching transport. Every store-level error is logged by the
//! engine and degrades to "behave as if uncached".

use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, HctError>;

/// Errors produced by the cache engine, its entry store and the transport.
#[derive(Debug, Error)]
pub enum HctError {
    /// Missing or invalid configuration (fatal at initialization).
    #[error("Configuration error: {0}")]
    Config(String),

    /// An entry file exists but its metadata block could not be parsed.
    #[error("Corrupt cache entry {key}: {reason}")]
    CorruptEntry { key: String, reason: String },

    /// An entry file exists but could not be read.
    #[error("Failed to read cache entry {key}: {source}")]
    StoreRead {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing the temp file or renaming it over the entry failed.
    #[error("Failed to write cache entry {key}: {source}")]
    StoreWrite {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The entry stored under a key belongs to a different URL or range.
    #[error("Cache key {key} holds {stored}, requested {requested}")]
    KeyCollision {
        key: String,
        stored: String,
        requested: String,
    },

    /// A file in the cache directory that the cache does not own.
    #[error("Unknown file in cache directory: {}", .0.display())]
    UnknownStoreFile(PathBuf),

    /// Failure reported by the wrapped HTTP transport.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for HctError {
    fn from(err: reqwest::Error) -> Self {
        HctError::Transport(err.to_string())
    }
}
