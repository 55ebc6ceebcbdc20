use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by the persistent store and its registry.
#[derive(Debug, Error)]
pub enum JournalError {
    /// Root directory is missing, not a directory, or not writable.
    #[error("storage unavailable at '{}': {source}", .path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Temp-file creation, write, or rename failed while setting a record.
    #[error("failed to write record '{key}': {source}")]
    WriteFailed {
        key: String,
        #[source]
        source: io::Error,
    },

    /// The root directory could not be enumerated.
    #[error("failed to scan '{}': {source}", .path.display())]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An entry could not be removed during a clear or expiry sweep.
    #[error("failed to remove '{key}': {source}")]
    RemoveFailed {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid record key: '{0}'")]
    InvalidKey(String),
}

pub type Result<T> = std::result::Result<T, JournalError>;
