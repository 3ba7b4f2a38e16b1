//! Whole-file JSON persistence shared by the memory index and the metrics log.
//!
//! Writes go to a temp file in the destination directory and are renamed over
//! the target, so a crash mid-write never leaves a truncated document behind.
//! Reads are tolerant: a missing or unparsable file is reported as
//! [`LoadOutcome::Missing`] / [`LoadOutcome::Recovered`] and the caller starts
//! from an empty structure.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::Result;

/// What happened when a JSON document was read from disk.
#[derive(Debug)]
pub enum LoadOutcome<T> {
    /// The file existed and parsed.
    Loaded(T),
    /// No file at the path (first run).
    Missing,
    /// The file existed but could not be read or parsed.
    Recovered { reason: String },
}

impl<T: Default> LoadOutcome<T> {
    /// Collapse the outcome into a value, substituting `T::default()`.
    pub fn into_value(self) -> T {
        match self {
            Self::Loaded(value) => value,
            Self::Missing | Self::Recovered { .. } => T::default(),
        }
    }
}

/// Read and parse a JSON document without ever failing.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> LoadOutcome<T> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return LoadOutcome::Missing,
        Err(e) => {
            return LoadOutcome::Recovered {
                reason: e.to_string(),
            }
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => LoadOutcome::Loaded(value),
        Err(e) => LoadOutcome::Recovered {
            reason: e.to_string(),
        },
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
///
/// Parent directories are created as needed.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    write_bytes_atomic(path, &json)
}

/// Atomically replace `path` with `bytes`.
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = parent_dir(path);
    fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// [`read_json`] on the blocking pool.
pub async fn load_json<T>(path: PathBuf) -> LoadOutcome<T>
where
    T: DeserializeOwned + Send + 'static,
{
    match tokio::task::spawn_blocking(move || read_json(&path)).await {
        Ok(outcome) => outcome,
        Err(e) => LoadOutcome::Recovered {
            reason: e.to_string(),
        },
    }
}

/// Serialize on the caller's task, then write atomically on the blocking pool.
pub async fn persist_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_bytes_atomic(&path, &bytes)).await?
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
