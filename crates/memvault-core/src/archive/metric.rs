//! Per-file measurements recorded over time for archival decisions.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One measurement of one memory file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricEntry {
    pub timestamp: DateTime<Utc>,
    pub node_id: String,
    pub file_path: String,
    #[serde(rename = "fileSizeMB")]
    pub file_size_mb: f64,
    pub entry_count: u64,
    /// Mean entry size in bytes.
    pub average_entry_size: f64,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
    pub usage_frequency: f64,
    pub quality_score: f64,
}

/// Append-only log persisted by the archive engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MetricsLog {
    #[serde(default)]
    pub entries: Vec<MetricEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_calculated: Option<DateTime<Utc>>,
}

/// Build a measurement for a memory file as it is on disk now.
///
/// Entries are the file's `## ` sections; a non-empty file without headings
/// counts as a single entry.
pub async fn measure_memory_file(
    path: &Path,
    node_id: &str,
    quality_score: f64,
    usage_frequency: f64,
) -> Result<MetricEntry> {
    let metadata = tokio::fs::metadata(path).await?;
    let content = tokio::fs::read_to_string(path).await?;

    let headings = content.lines().filter(|l| l.starts_with("## ")).count() as u64;
    let entry_count = match headings {
        0 if content.trim().is_empty() => 0,
        0 => 1,
        n => n,
    };
    let size = metadata.len();
    let average_entry_size = if entry_count == 0 {
        0.0
    } else {
        size as f64 / entry_count as f64
    };
    let newest_entry = metadata.modified().ok().map(DateTime::<Utc>::from);
    let oldest_entry = metadata
        .created()
        .ok()
        .map(DateTime::<Utc>::from)
        .or(newest_entry);

    Ok(MetricEntry {
        timestamp: Utc::now(),
        node_id: node_id.to_string(),
        file_path: path.to_string_lossy().into_owned(),
        file_size_mb: size as f64 / BYTES_PER_MB,
        entry_count,
        average_entry_size,
        oldest_entry,
        newest_entry,
        usage_frequency,
        quality_score,
    })
}
