//! Disk-backed entry store: one file per cache key under a base directory.
//!
//! Writes go to a temp file in the same directory which is then renamed over
//! the target, so readers never see a partially written entry. The file's
//! modification time doubles as the entry's last-access time and is bumped
//! on every read through [`EntryStore::touch`].

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::debug;

use super::entry::{CacheEntry, EntryFormatError};
use super::key::CacheKey;
use crate::error::{HctError, Result};

/// Prefix of temp files created by [`EntryStore::write`].
pub const TEMP_PREFIX: &str = ".hct-tmp";

/// One file found while enumerating the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreListing {
    /// A cache entry and the time since it was last accessed.
    Entry { key: CacheKey, age: Duration },
    /// A temp file left behind by an interrupted write.
    TempFile { path: PathBuf, age: Duration },
    /// A file the cache does not own.
    Unknown { path: PathBuf },
}

impl StoreListing {
    /// Age in (fractional) days, if the listing carries one.
    pub fn age_days(&self) -> Option<f64> {
        match self {
            StoreListing::Entry { age, .. } | StoreListing::TempFile { age, .. } => {
                Some(age.as_secs_f64() / 86_400.0)
            }
            StoreListing::Unknown { .. } => None,
        }
    }
}

/// Maps cache keys to entry files under `base_path`.
#[derive(Debug, Clone)]
pub struct EntryStore {
    base_path: PathBuf,
}

impl EntryStore {
    /// Open (creating if needed) the store directory.
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        if base_path.as_os_str().is_empty() {
            return Err(HctError::Config("base_path must not be empty".into()));
        }
        fs::create_dir_all(&base_path).map_err(|e| {
            HctError::Config(format!(
                "Failed to create cache directory {}: {}",
                base_path.display(),
                e
            ))
        })?;
        if !base_path.is_dir() {
            return Err(HctError::Config(format!(
                "Cache path {} is not a directory",
                base_path.display()
            )));
        }
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// File path of the entry for `key`.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.base_path.join(key.as_str())
    }

    /// Read the entry stored under `key`.
    ///
    /// Missing and empty files are `Ok(None)`. Unreadable files fail with
    /// `StoreRead`, unparsable ones with `CorruptEntry`.
    pub fn lookup(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let path = self.path_for(key);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(store_read(key, e)),
        };
        let len = file.metadata().map_err(|e| store_read(key, e))?.len();
        if len == 0 {
            return Ok(None);
        }

        match CacheEntry::decode(file) {
            Ok(entry) => Ok(Some(entry)),
            Err(EntryFormatError::Io(e)) => Err(store_read(key, e)),
            Err(e) => Err(HctError::CorruptEntry {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Mark the entry as accessed now.
    pub fn touch(&self, key: &CacheKey) -> Result<()> {
        self.set_access_time(key, SystemTime::now())
    }

    /// Set the entry's access time. A missing file is not an error.
    pub fn set_access_time(&self, key: &CacheKey, at: SystemTime) -> Result<()> {
        let path = self.path_for(key);
        let file = match File::options().write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(HctError::Io(e)),
        };
        file.set_modified(at)?;
        Ok(())
    }

    /// Atomically replace the entry stored under `key`.
    pub fn write(&self, key: &CacheKey, entry: &CacheEntry) -> Result<()> {
        let store_write = |source: io::Error| HctError::StoreWrite {
            key: key.to_string(),
            source,
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.base_path)
            .map_err(store_write)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            entry.encode(&mut writer).map_err(store_write)?;
            writer.flush().map_err(store_write)?;
        }

        // On failure the temp file is handed back inside the error and
        // removed when dropped.
        tmp.persist(self.path_for(key))
            .map_err(|e| store_write(e.error))?;
        debug!(key = %key, bytes = entry.body.len(), "Stored cache entry");
        Ok(())
    }

    /// List every file in the store with its age relative to `now`.
    ///
    /// Files that vanish while being listed are skipped.
    pub fn enumerate(&self, now: SystemTime) -> Result<Vec<StoreListing>> {
        let mut listings = Vec::new();
        for dir_entry in fs::read_dir(&self.base_path)? {
            let dir_entry = match dir_entry {
                Ok(dir_entry) => dir_entry,
                Err(e) => {
                    debug!(error = %e, "Failed to read cache directory entry");
                    continue;
                }
            };
            let path = dir_entry.path();
            let name = dir_entry.file_name().to_string_lossy().into_owned();

            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Failed to stat cache file");
                    continue;
                }
            };
            if !metadata.is_file() {
                listings.push(StoreListing::Unknown { path });
                continue;
            }
            let age = metadata
                .modified()
                .ok()
                .and_then(|mtime| now.duration_since(mtime).ok())
                .unwrap_or(Duration::ZERO);

            if let Some(key) = CacheKey::from_file_name(&name) {
                listings.push(StoreListing::Entry { key, age });
            } else if name.starts_with(TEMP_PREFIX) {
                listings.push(StoreListing::TempFile { path, age });
            } else {
                listings.push(StoreListing::Unknown { path });
            }
        }
        Ok(listings)
    }

    /// Best-effort removal of the entry for `key`. Returns `true` if the
    /// entry is gone afterwards.
    pub fn delete(&self, key: &CacheKey) -> bool {
        remove_file_best_effort(&self.path_for(key))
    }
}

/// Remove a file, treating "already gone" as success.
pub(crate) fn remove_file_best_effort(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Failed to remove cache file");
            false
        }
    }
}

fn store_read(key: &CacheKey, source: io::Error) -> HctError {
    HctError::StoreRead {
        key: key.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::body_digest;
    use tempfile::tempdir;

    fn entry(url: &str, body: &[u8]) -> CacheEntry {
        CacheEntry {
            url: url.into(),
            etag: None,
            range: None,
            content_digest: Some(body_digest(body)),
            status: 200,
            last_updated: Some(1_700_000_000),
            adjusted_last_modified: None,
            headers: vec![("Content-Type".into(), "text/plain".into())],
            extra: Vec::new(),
            body: body.to_vec(),
        }
    }

    #[test]
    fn test_open_creates_directory() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("nested").join("cache");
        let store = EntryStore::open(&base).unwrap();
        assert!(base.is_dir());
        assert_eq!(store.base_path(), base.as_path());
    }

    #[test]
    fn test_open_rejects_file_path() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        fs::write(&file, b"x").unwrap();
        let err = EntryStore::open(&file).unwrap_err();
        assert!(matches!(err, HctError::Config(_)));
    }

    #[test]
    fn test_open_rejects_empty_path() {
        assert!(matches!(EntryStore::open(""), Err(HctError::Config(_))));
    }

    #[test]
    fn test_write_then_lookup() {
        let dir = tempdir().unwrap();
        let store = EntryStore::open(dir.path()).unwrap();
        let key = CacheKey::derive("https://example.com/", None);
        let stored = entry("https://example.com/", b"hello");

        store.write(&key, &stored).unwrap();
        assert_eq!(store.lookup(&key).unwrap(), Some(stored));
    }

    #[test]
    fn test_write_replaces_existing_and_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let store = EntryStore::open(dir.path()).unwrap();
        let key = CacheKey::derive("https://example.com/", None);

        store.write(&key, &entry("https://example.com/", b"one")).unwrap();
        store.write(&key, &entry("https://example.com/", b"two")).unwrap();

        assert_eq!(store.lookup(&key).unwrap().unwrap().body, b"two");
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![key.to_string()]);
    }

    #[test]
    fn test_lookup_missing_and_empty() {
        let dir = tempdir().unwrap();
        let store = EntryStore::open(dir.path()).unwrap();
        let key = CacheKey::derive("https://example.com/missing", None);
        assert_eq!(store.lookup(&key).unwrap(), None);

        fs::write(store.path_for(&key), b"").unwrap();
        assert_eq!(store.lookup(&key).unwrap(), None);
    }

    #[test]
    fn test_lookup_corrupt_entry() {
        let dir = tempdir().unwrap();
        let store = EntryStore::open(dir.path()).unwrap();
        let key = CacheKey::derive("https://example.com/", None);
        fs::write(store.path_for(&key), b"this is not an entry\n\n").unwrap();

        let err = store.lookup(&key).unwrap_err();
        assert!(matches!(err, HctError::CorruptEntry { .. }));
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("cache");
        let store = EntryStore::open(&base).unwrap();
        fs::remove_dir(&base).unwrap();

        let key = CacheKey::derive("https://example.com/", None);
        let err = store.write(&key, &entry("https://example.com/", b"x")).unwrap_err();
        assert!(matches!(err, HctError::StoreWrite { .. }));
    }

    #[test]
    fn test_touch_updates_access_time() {
        let dir = tempdir().unwrap();
        let store = EntryStore::open(dir.path()).unwrap();
        let key = CacheKey::derive("https://example.com/", None);
        store.write(&key, &entry("https://example.com/", b"x")).unwrap();

        let old = SystemTime::now() - Duration::from_secs(10 * 86_400);
        store.set_access_time(&key, old).unwrap();
        let listed = store.enumerate(SystemTime::now()).unwrap();
        assert!(listed[0].age_days().unwrap() > 9.9);

        store.touch(&key).unwrap();
        let listed = store.enumerate(SystemTime::now()).unwrap();
        assert!(listed[0].age_days().unwrap() < 0.01);
    }

    #[test]
    fn test_touch_missing_is_ok() {
        let dir = tempdir().unwrap();
        let store = EntryStore::open(dir.path()).unwrap();
        let key = CacheKey::derive("https://example.com/gone", None);
        assert!(store.touch(&key).is_ok());
    }

    #[test]
    fn test_enumerate_classifies_files() {
        let dir = tempdir().unwrap();
        let store = EntryStore::open(dir.path()).unwrap();
        let key = CacheKey::derive("https://example.com/", None);
        store.write(&key, &entry("https://example.com/", b"x")).unwrap();
        fs::write(dir.path().join("notes.txt"), b"foreign").unwrap();
        fs::write(dir.path().join(format!("{}abc", TEMP_PREFIX)), b"partial").unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();

        let mut entries = 0;
        let mut temps = 0;
        let mut unknown = Vec::new();
        for listing in store.enumerate(SystemTime::now()).unwrap() {
            match listing {
                StoreListing::Entry { key: k, .. } => {
                    assert_eq!(k, key);
                    entries += 1;
                }
                StoreListing::TempFile { .. } => temps += 1,
                StoreListing::Unknown { path } => {
                    unknown.push(path.file_name().unwrap().to_string_lossy().into_owned())
                }
            }
        }
        unknown.sort();
        assert_eq!(entries, 1);
        assert_eq!(temps, 1);
        assert_eq!(unknown, vec!["notes.txt".to_string(), "subdir".to_string()]);
    }

    #[test]
    fn test_delete_is_best_effort() {
        let dir = tempdir().unwrap();
        let store = EntryStore::open(dir.path()).unwrap();
        let key = CacheKey::derive("https://example.com/", None);
        store.write(&key, &entry("https://example.com/", b"x")).unwrap();

        assert!(store.delete(&key));
        assert_eq!(store.lookup(&key).unwrap(), None);
        assert!(store.delete(&key), "deleting twice is still success");
    }
}
