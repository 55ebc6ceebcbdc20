//! Filesystem-backed record store.
//!
//! Each record is a regular file directly under the store root: the file name
//! is the key and the file content is the exact byte payload last written.
//! A record's age is derived from the file's modification time, which lets
//! reads apply a TTL and lets a janitor sweep stale records without keeping a
//! separate metadata index.
//!
//! Writes go to a temp file in the same directory and are renamed into place,
//! so concurrent readers observe either the previous content or the new one,
//! never a partial write. Concurrent writers to the same key race only on
//! "last rename wins".

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tempfile::Builder;

use crate::error::{JournalError, Result};

/// Prefix of in-flight temp files. Entries carrying it are not records.
pub const TEMP_PREFIX: &str = ".tmp.";

/// Prefix of the probe file used to check that the root is writable.
const PROBE_PREFIX: &str = ".tmp.dirvalidation.";

/// Key/value record storage with modification-time based aging.
///
/// `PersistentStore` is the filesystem implementation; the trait keeps callers
/// independent of it so another backing store can be swapped in.
pub trait RecordStore: Send + Sync {
    /// Store `value` under `key`. `None` is a successful no-op, while an empty
    /// slice is stored as a zero-length record.
    fn set(&self, key: &str, value: Option<&[u8]>) -> Result<()>;

    /// Read a record without any age filtering.
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.get_expiry(key, Duration::ZERO)
    }

    /// Read a record only if it is no older than `max_age`.
    ///
    /// A zero `max_age` disables the age check.
    fn get_expiry(&self, key: &str, max_age: Duration) -> Option<Vec<u8>>;

    /// Remove a record. Returns `true` only if a record was actually removed.
    fn unset(&self, key: &str) -> bool;

    /// Names of all stored records, in no particular order.
    fn list(&self) -> Result<Vec<String>>;

    /// Number of stored records.
    ///
    /// Best-effort: returns 0 when the root cannot be scanned instead of
    /// reporting an error.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry under the root, directories included.
    ///
    /// Keeps going after individual failures and reports the last one.
    fn clear(&self) -> Result<()>;

    /// Remove every entry older than `age`, returning how many records were
    /// removed. Stale temp files are swept too but not counted, so the count
    /// matches the drop in [`len`](RecordStore::len).
    ///
    /// Stops at the first removal failure; entries removed before it stay
    /// removed.
    fn clear_expired(&self, age: Duration) -> Result<usize>;
}

/// Record store rooted at one directory.
#[derive(Debug)]
pub struct PersistentStore {
    root: PathBuf,
}

impl PersistentStore {
    /// Open a store at `path`.
    ///
    /// The directory must already exist and be writable. Writability is
    /// checked by creating and immediately removing a probe file, so a
    /// successful open leaves nothing behind.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();

        let meta = fs::metadata(&root).map_err(|source| JournalError::StorageUnavailable {
            path: root.clone(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(JournalError::StorageUnavailable {
                path: root,
                source: io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
            });
        }

        let probe = Builder::new()
            .prefix(PROBE_PREFIX)
            .tempfile_in(&root)
            .map_err(|source| JournalError::StorageUnavailable {
                path: root.clone(),
                source,
            })?;
        probe
            .close()
            .map_err(|source| JournalError::StorageUnavailable {
                path: root.clone(),
                source,
            })?;

        tracing::debug!(path = %root.display(), "Persistent store opened");
        Ok(Self { root })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn scan(&self) -> Result<fs::ReadDir> {
        fs::read_dir(&self.root).map_err(|source| JournalError::ScanFailed {
            path: self.root.clone(),
            source,
        })
    }

    /// Record names under the root. Directories, temp files and names that are
    /// not valid UTF-8 are skipped.
    fn record_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in self.scan()? {
            let Ok(entry) = entry else { continue };
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                if !name.starts_with(TEMP_PREFIX) {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }

    fn write_atomic(&self, key: &str, value: &[u8]) -> io::Result<()> {
        let mut tmp = Builder::new()
            .prefix(&format!("{TEMP_PREFIX}{key}."))
            .tempfile_in(&self.root)?;
        tmp.write_all(value)?;
        tmp.as_file().sync_all()?;
        // On failure the returned PersistError owns the temp file and deletes
        // it when dropped.
        tmp.persist(self.record_path(key)).map_err(|e| e.error)?;
        Ok(())
    }
}

impl RecordStore for PersistentStore {
    fn set(&self, key: &str, value: Option<&[u8]>) -> Result<()> {
        let Some(value) = value else {
            return Ok(());
        };
        if !is_valid_key(key) {
            return Err(JournalError::InvalidKey(key.to_string()));
        }

        self.write_atomic(key, value)
            .map_err(|source| JournalError::WriteFailed {
                key: key.to_string(),
                source,
            })?;

        tracing::debug!(key = %key, bytes = value.len(), "Record written");
        Ok(())
    }

    fn get_expiry(&self, key: &str, max_age: Duration) -> Option<Vec<u8>> {
        if !is_valid_key(key) {
            return None;
        }
        let path = self.record_path(key);
        let meta = fs::metadata(&path).ok()?;
        if meta.is_dir() {
            return None;
        }
        if !max_age.is_zero() {
            if let Some(age) = age_of(&meta) {
                if age > max_age {
                    tracing::debug!(key = %key, ?age, ?max_age, "Record expired");
                    return None;
                }
            }
        }
        fs::read(&path).ok()
    }

    fn unset(&self, key: &str) -> bool {
        if !is_valid_key(key) {
            return false;
        }
        match fs::remove_file(self.record_path(key)) {
            Ok(()) => {
                tracing::debug!(key = %key, "Record removed");
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to remove record");
                false
            }
        }
    }

    fn list(&self) -> Result<Vec<String>> {
        self.record_names()
    }

    fn len(&self) -> usize {
        self.record_names().map(|names| names.len()).unwrap_or(0)
    }

    fn clear(&self) -> Result<()> {
        let mut last_error = None;
        for entry in self.scan()? {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let removed = if is_dir {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            if let Err(source) = removed {
                tracing::warn!(path = %path.display(), error = %source, "Failed to clear entry");
                last_error = Some(JournalError::RemoveFailed {
                    key: entry.file_name().to_string_lossy().into_owned(),
                    source,
                });
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => {
                tracing::debug!(path = %self.root.display(), "Persistent store cleared");
                Ok(())
            }
        }
    }

    fn clear_expired(&self, age: Duration) -> Result<usize> {
        let mut removed = 0usize;
        for entry in self.scan()? {
            let Ok(entry) = entry else { continue };
            let Ok(meta) = entry.metadata() else { continue };
            if meta.is_dir() {
                continue;
            }
            let expired = age_of(&meta).is_some_and(|a| a > age);
            if !expired {
                continue;
            }
            let file_name = entry.file_name();
            fs::remove_file(entry.path()).map_err(|source| JournalError::RemoveFailed {
                key: file_name.to_string_lossy().into_owned(),
                source,
            })?;
            // Same rule as `record_names`.
            if file_name.to_str().is_some_and(|n| !n.starts_with(TEMP_PREFIX)) {
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(
                path = %self.root.display(),
                removed,
                max_age = ?age,
                "Expired records cleared"
            );
        }
        Ok(removed)
    }
}

/// Keys name flat entries directly under the root.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && !key.contains(['/', '\\', '\0'])
}

/// Time since last modification. Timestamps in the future count as age zero.
fn age_of(meta: &fs::Metadata) -> Option<Duration> {
    let modified = meta.modified().ok()?;
    Some(
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO),
    )
}
