//! Lazy discovery of `memory.md` files under one node's session subtree.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// The only filename the walk reports.
pub const MEMORY_FILENAME: &str = "memory.md";

/// A memory file found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredMemory {
    pub path: PathBuf,
    pub filename: String,
    /// File modification time.
    pub timestamp: DateTime<Utc>,
    /// Name of the directory that directly contains the file.
    pub session_id: String,
}

impl DiscoveredMemory {
    fn from_entry(entry: &DirEntry) -> Option<Self> {
        let modified = match entry.metadata().map(|m| m.modified()) {
            Ok(Ok(modified)) => modified,
            Ok(Err(e)) => {
                debug!(path = %entry.path().display(), error = %e, "no mtime, skipping");
                return None;
            }
            Err(e) => {
                debug!(path = %entry.path().display(), error = %e, "no metadata, skipping");
                return None;
            }
        };
        let session_id = entry
            .path()
            .parent()
            .and_then(Path::file_name)?
            .to_string_lossy()
            .into_owned();
        Some(Self {
            path: entry.path().to_path_buf(),
            filename: entry.file_name().to_string_lossy().into_owned(),
            timestamp: DateTime::<Utc>::from(modified),
            session_id,
        })
    }
}

/// A restartable walk over one node subtree.
///
/// Each call to [`MemoryWalk::iter`] starts a fresh traversal; nothing is
/// read until the iterator is advanced. A missing root yields nothing.
#[derive(Debug, Clone)]
pub struct MemoryWalk {
    root: PathBuf,
}

impl MemoryWalk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn iter(&self) -> impl Iterator<Item = DiscoveredMemory> {
        WalkDir::new(&self.root)
            .follow_links(false)
            // memory.md must sit inside a session directory, not at the root.
            .min_depth(2)
            .into_iter()
            .filter_map(|res| match res {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!(error = %e, "walk error, skipping");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && entry.file_name() == MEMORY_FILENAME)
            .filter_map(|entry| DiscoveredMemory::from_entry(&entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "content").unwrap();
        path
    }

    #[test]
    fn finds_only_memory_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "2026/01/02/sess-1/memory.md");
        touch(dir.path(), "2026/01/02/sess-1/notes.md");
        touch(dir.path(), "2026/01/03/sess-2/memory.md");

        let mut found: Vec<String> = MemoryWalk::new(dir.path())
            .iter()
            .map(|m| m.session_id)
            .collect();
        found.sort();
        assert_eq!(found, vec!["sess-1", "sess-2"]);
    }

    #[test]
    fn walk_is_restartable() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "2026/01/02/s/memory.md");
        let walk = MemoryWalk::new(dir.path());
        assert_eq!(walk.iter().count(), 1);
        touch(dir.path(), "2026/01/03/t/memory.md");
        assert_eq!(walk.iter().count(), 2);
    }

    #[test]
    fn missing_root_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(MemoryWalk::new(dir.path().join("absent")).iter().count(), 0);
    }

    #[test]
    fn root_level_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "memory.md");
        assert_eq!(MemoryWalk::new(dir.path()).iter().count(), 0);
    }
}
