//! Durable JSON-backed index of session memories keyed by session id.
//!
//! The index is an explicit service object: construct one per index file with
//! [`MemoryIndex::load`]. A `tokio::sync::Mutex` serializes all mutations, and
//! every mutation rewrites the whole file before returning. Only one process
//! should write a given index file; concurrent writers race and the last
//! persist wins.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::quality::{update_usage_tracking, QualityScorer, VaultWeightTable};
use super::record::{MemoryRecord, QualityScore, UsageTracking};
use crate::error::Result;
use crate::metrics::METRICS;
use crate::obs;
use crate::store::{self, LoadOutcome};

const STORE_NAME: &str = "memory_index";

/// A single entry in the memory index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub session_id: String,
    pub node_id: String,
    pub node_name: String,
    pub timestamp: DateTime<Utc>,
    pub command: String,
    #[serde(default)]
    pub ai_provider: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub summary: String,
    /// Location of the memory's Markdown on disk. Owned by session storage.
    pub file_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageTracking>,
    #[serde(default = "Utc::now")]
    pub indexed_at: DateTime<Utc>,
}

impl IndexEntry {
    /// Mirror a record's identifying fields. No quality or usage attached.
    pub fn from_record(record: &MemoryRecord, file_path: impl Into<PathBuf>) -> Self {
        Self {
            session_id: record.session_id.clone(),
            node_id: record.node_id.clone(),
            node_name: record.node_name.clone(),
            timestamp: record.timestamp,
            command: record.command.clone(),
            ai_provider: record.ai_provider.clone(),
            tags: record.tags.clone(),
            summary: record.summary.clone(),
            file_path: file_path.into(),
            quality: None,
            usage: None,
            indexed_at: Utc::now(),
        }
    }

    pub fn with_quality(mut self, quality: QualityScore) -> Self {
        self.quality = Some(quality);
        self
    }

    fn matches_text(&self, needle: &str) -> bool {
        self.summary.to_lowercase().contains(needle)
            || self.command.to_lowercase().contains(needle)
            || self.node_name.to_lowercase().contains(needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(needle))
    }
}

/// On-disk envelope of the index file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexFile {
    #[serde(default)]
    entries: Vec<IndexEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_updated: Option<DateTime<Utc>>,
}

impl IndexFile {
    fn position(&self, session_id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.session_id == session_id)
    }

    /// Collapse duplicate session ids left by hand edits, keeping the last
    /// value at the first position.
    fn dedupe(&mut self) {
        let mut deduped: Vec<IndexEntry> = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            match deduped.iter().position(|e| e.session_id == entry.session_id) {
                Some(i) => deduped[i] = entry,
                None => deduped.push(entry),
            }
        }
        self.entries = deduped;
    }

    fn filtered(&self, pred: impl Fn(&IndexEntry) -> bool) -> Vec<IndexEntry> {
        self.entries.iter().filter(|e| pred(e)).cloned().collect()
    }
}

/// Result of a free-text search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub matches: Vec<IndexEntry>,
    /// Number of matches before any limit was applied.
    pub total: usize,
}

/// Entry counts and quality aggregates, optionally scoped to one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub total_entries: usize,
    pub scored_entries: usize,
    pub average_quality: Option<f64>,
    pub by_node: BTreeMap<String, usize>,
}

/// Whole-index summary including where it lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexFileStats {
    pub total_entries: usize,
    pub node_count: usize,
    pub index_path: PathBuf,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Persistent memory index.
#[derive(Debug)]
pub struct MemoryIndex {
    path: PathBuf,
    scorer: QualityScorer,
    vault_type: String,
    state: Mutex<IndexFile>,
}

impl MemoryIndex {
    /// Open the index at `path`, scoring new entries with generic weights.
    ///
    /// Never fails: a missing file yields an empty index, and an unreadable or
    /// corrupt one yields an empty index plus a warning.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        Self::load_with_scorer(path, QualityScorer::default(), VaultWeightTable::GENERIC_KEY)
            .await
    }

    /// Open the index with an explicit scorer and vault type for new entries.
    pub async fn load_with_scorer(
        path: impl Into<PathBuf>,
        scorer: QualityScorer,
        vault_type: impl Into<String>,
    ) -> Self {
        let path = path.into();
        let mut file = match store::load_json::<IndexFile>(path.clone()).await {
            LoadOutcome::Loaded(file) => {
                debug!(path = %path.display(), entries = file.entries.len(), "memory index loaded");
                file
            }
            LoadOutcome::Missing => {
                debug!(path = %path.display(), "no memory index yet, starting empty");
                IndexFile::default()
            }
            LoadOutcome::Recovered { reason } => {
                obs::emit_store_recovered(STORE_NAME, &path, &reason);
                IndexFile::default()
            }
        };
        file.dedupe();

        Self {
            path,
            scorer,
            vault_type: vault_type.into(),
            state: Mutex::new(file),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current in-memory state to disk.
    pub async fn persist(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let next = state.clone();
        self.commit(&mut state, next).await
    }

    /// Persist `next` and only then make it the live state. A failed write
    /// leaves the in-memory index untouched.
    async fn commit(&self, state: &mut IndexFile, mut next: IndexFile) -> Result<()> {
        next.last_updated = Some(Utc::now());
        store::persist_json(&self.path, &next).await?;
        METRICS.inc_store_writes();
        obs::emit_store_persisted(STORE_NAME, &self.path, next.entries.len());
        *state = next;
        Ok(())
    }

    /// Score `record` and upsert it. An existing entry for the same session
    /// is overwritten in place.
    pub async fn add_entry(
        &self,
        record: &MemoryRecord,
        file_path: impl Into<PathBuf>,
    ) -> Result<IndexEntry> {
        let quality = self.scorer.score(record, &self.vault_type);
        let entry = IndexEntry::from_record(record, file_path).with_quality(quality);
        self.upsert(entry.clone()).await?;
        Ok(entry)
    }

    /// Insert a pre-built entry, replacing any entry with the same session id.
    ///
    /// Usage tracking already recorded for the session is carried over when
    /// the new entry has none.
    pub async fn upsert(&self, mut entry: IndexEntry) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        match next.position(&entry.session_id) {
            Some(i) => {
                if entry.usage.is_none() {
                    entry.usage = next.entries[i].usage.take();
                }
                next.entries[i] = entry;
            }
            None => next.entries.push(entry),
        }
        self.commit(&mut state, next).await
    }

    /// Remove an entry. Returns whether anything was removed.
    pub async fn remove_entry(&self, session_id: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(i) = state.position(session_id) else {
            return Ok(false);
        };
        let mut next = state.clone();
        next.entries.remove(i);
        self.commit(&mut state, next).await?;
        Ok(true)
    }

    pub async fn get_entry(&self, session_id: &str) -> Option<IndexEntry> {
        let state = self.state.lock().await;
        state.position(session_id).map(|i| state.entries[i].clone())
    }

    /// All entries in insertion order.
    pub async fn entries(&self) -> Vec<IndexEntry> {
        self.state.lock().await.entries.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    pub async fn query_by_node(&self, node_id: &str) -> Vec<IndexEntry> {
        self.state
            .lock()
            .await
            .filtered(|e| e.node_id == node_id)
    }

    /// Entries carrying at least one of `tags`.
    pub async fn query_by_tags(&self, tags: &[&str]) -> Vec<IndexEntry> {
        self.state
            .lock()
            .await
            .filtered(|e| tags.iter().any(|t| e.tags.contains(*t)))
    }

    /// Entries whose command contains `command`, ignoring case.
    pub async fn query_by_command(&self, command: &str) -> Vec<IndexEntry> {
        let needle = command.to_lowercase();
        self.state
            .lock()
            .await
            .filtered(|e| e.command.to_lowercase().contains(&needle))
    }

    /// Case-insensitive substring search over summary, tags, command, and
    /// node name. Results keep insertion order.
    pub async fn search(&self, text: &str, limit: Option<usize>) -> SearchResult {
        let needle = text.to_lowercase();
        let mut matches = self.state.lock().await.filtered(|e| e.matches_text(&needle));
        let total = matches.len();
        if let Some(limit) = limit {
            matches.truncate(limit);
        }
        SearchResult { matches, total }
    }

    /// Register one consumption of a memory and persist it.
    ///
    /// Returns `None` when the session is not indexed.
    pub async fn record_usage(&self, session_id: &str) -> Result<Option<UsageTracking>> {
        let mut state = self.state.lock().await;
        let Some(i) = state.position(session_id) else {
            return Ok(None);
        };
        let usage = update_usage_tracking(state.entries[i].usage.as_ref());
        let mut next = state.clone();
        next.entries[i].usage = Some(usage.clone());
        self.commit(&mut state, next).await?;
        Ok(Some(usage))
    }

    pub async fn stats(&self, node_id: Option<&str>) -> IndexStats {
        let state = self.state.lock().await;
        let scoped: Vec<&IndexEntry> = state
            .entries
            .iter()
            .filter(|e| node_id.map_or(true, |n| e.node_id == n))
            .collect();

        let mut by_node = BTreeMap::new();
        for e in &scoped {
            *by_node.entry(e.node_id.clone()).or_insert(0) += 1;
        }
        let qualities: Vec<f64> = scoped
            .iter()
            .filter_map(|e| e.quality.map(|q| q.overall))
            .collect();
        let average_quality = if qualities.is_empty() {
            None
        } else {
            Some(qualities.iter().sum::<f64>() / qualities.len() as f64)
        };

        IndexStats {
            total_entries: scoped.len(),
            scored_entries: qualities.len(),
            average_quality,
            by_node,
        }
    }

    pub async fn index_stats(&self) -> IndexFileStats {
        let state = self.state.lock().await;
        let nodes: BTreeSet<&str> = state.entries.iter().map(|e| e.node_id.as_str()).collect();
        IndexFileStats {
            total_entries: state.entries.len(),
            node_count: nodes.len(),
            index_path: self.path.clone(),
            last_updated: state.last_updated,
        }
    }

    /// Drop every entry and persist the empty index immediately.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let next = IndexFile {
            entries: Vec::new(),
            last_updated: state.last_updated,
        };
        self.commit(&mut state, next).await
    }
}
