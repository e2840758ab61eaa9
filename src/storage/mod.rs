//! Storage module for persisting run artifacts
//!
//! Every artifact is a JSON document on disk. Writes go to a sibling temporary
//! file that is renamed into place, so a reader never sees a half-written file
//! even if the process is killed mid-write.

mod resume;

pub use resume::ResumeStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt file {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes `value` as pretty-printed JSON, replacing `path` atomically
///
/// Parent directories are created as needed.
///
/// # Arguments
///
/// * `path` - Destination file
/// * `value` - Any serializable value
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let body = serde_json::to_vec_pretty(value)?;

    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    {
        let mut file = fs::File::create(&temp).map_err(io_error(&temp))?;
        file.write_all(&body).map_err(io_error(&temp))?;
        file.sync_all().map_err(io_error(&temp))?;
    }

    fs::rename(&temp, path).map_err(io_error(path))?;
    tracing::debug!(path = %path.display(), bytes = body.len(), "Wrote JSON file");
    Ok(())
}

/// Reads a JSON document
///
/// # Returns
///
/// * `Ok(None)` - The file does not exist
/// * `Ok(Some(value))` - The file was read and parsed
/// * `Err(StorageError::Corrupt)` - The file exists but does not parse
pub fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    let body = match fs::read(path) {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path)(e)),
    };

    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|e| StorageError::Corrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}
