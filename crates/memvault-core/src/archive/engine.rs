//! Archive engine: records file metrics and turns them into archival
//! recommendations, trends, and statistics.
//!
//! The metrics log is independent of the memory index and follows the same
//! persistence rules: whole-file atomic writes, one writer process, and an
//! empty log when the file is missing or corrupt.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::metric::{MetricEntry, MetricsLog};
use super::scoring::{calculate_archive_score, ArchiveConfig, ArchiveInput, ArchiveScore};
use crate::error::Result;
use crate::metrics::METRICS;
use crate::obs;
use crate::store::{self, LoadOutcome};

const STORE_NAME: &str = "archive_metrics";

/// Changes within this band classify as stable.
pub const TREND_TOLERANCE: f64 = 0.01;

/// Remediation attached to size recommendations.
pub const SIZE_REMEDIATION: &str = "Memory files above the size limit slow down context loading. \
Move their bulk into external structured storage (a database or object store) and keep a short \
summary in the vault.";

/// Direction of change between two measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Stable,
    Decreasing,
}

impl Trend {
    fn classify(change: f64, tolerance: f64) -> Self {
        if change > tolerance {
            Self::Increasing
        } else if change < -tolerance {
            Self::Decreasing
        } else {
            Self::Stable
        }
    }
}

/// Size at the start and end of a trend window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeTrend {
    pub start: f64,
    pub end: f64,
    pub change: f64,
}

/// Trends over a trailing window of measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendAnalysis {
    pub total_metrics: usize,
    /// Direction of the entry count.
    pub growth_trend: Trend,
    #[serde(rename = "sizeTrendMB")]
    pub size_trend_mb: SizeTrend,
    pub quality_trend: Trend,
}

/// Aggregates over the latest measurement of every tracked file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveStatistics {
    pub tracked_files: usize,
    pub total_memories: u64,
    #[serde(rename = "totalSizeMB")]
    pub total_size_mb: f64,
    pub average_quality: f64,
}

/// A file recommended for archival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveCandidate {
    pub metric: MetricEntry,
    pub days_old: f64,
    pub score: ArchiveScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OversizedFile {
    pub file_path: String,
    pub node_id: String,
    #[serde(rename = "fileSizeMB")]
    pub file_size_mb: f64,
}

/// Files over the size limit and what to do about them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeRecommendations {
    pub oversized: Vec<OversizedFile>,
    /// Present only when at least one file is oversized.
    pub recommendation: Option<String>,
}

/// Latest measurement per file path, keyed by path. Later log entries win
/// timestamp ties.
fn latest_per_file(entries: &[MetricEntry]) -> BTreeMap<&str, &MetricEntry> {
    let mut latest: BTreeMap<&str, &MetricEntry> = BTreeMap::new();
    for entry in entries {
        match latest.get(entry.file_path.as_str()) {
            Some(current) if current.timestamp > entry.timestamp => {}
            _ => {
                latest.insert(entry.file_path.as_str(), entry);
            }
        }
    }
    latest
}

/// Archive engine over one metrics log file.
#[derive(Debug)]
pub struct ArchiveEngine {
    path: PathBuf,
    config: ArchiveConfig,
    state: Mutex<MetricsLog>,
}

impl ArchiveEngine {
    /// Open the metrics log at `path` with default tunables. Never fails.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        Self::load_with_config(path, ArchiveConfig::default()).await
    }

    pub async fn load_with_config(path: impl Into<PathBuf>, config: ArchiveConfig) -> Self {
        let path = path.into();
        let log = match store::load_json::<MetricsLog>(path.clone()).await {
            LoadOutcome::Loaded(log) => {
                debug!(path = %path.display(), entries = log.entries.len(), "metrics log loaded");
                log
            }
            LoadOutcome::Missing => MetricsLog::default(),
            LoadOutcome::Recovered { reason } => {
                obs::emit_store_recovered(STORE_NAME, &path, &reason);
                MetricsLog::default()
            }
        };
        Self {
            path,
            config,
            state: Mutex::new(log),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Persist `next`, then swap it in. A failed write changes nothing.
    async fn commit(&self, log: &mut MetricsLog, mut next: MetricsLog) -> Result<()> {
        next.last_calculated = Some(Utc::now());
        store::persist_json(&self.path, &next).await?;
        METRICS.inc_store_writes();
        obs::emit_store_persisted(STORE_NAME, &self.path, next.entries.len());
        *log = next;
        Ok(())
    }

    /// Append a measurement and persist the log, creating it on first use.
    pub async fn record_metric(&self, entry: MetricEntry) -> Result<()> {
        let mut log = self.state.lock().await;
        let mut next = log.clone();
        next.entries.push(entry);
        self.commit(&mut log, next).await
    }

    /// All measurements in recording order.
    pub async fn metrics(&self) -> Vec<MetricEntry> {
        self.state.lock().await.entries.clone()
    }

    pub async fn metrics_by_node(&self, node_id: &str) -> Vec<MetricEntry> {
        self.state
            .lock()
            .await
            .entries
            .iter()
            .filter(|e| e.node_id == node_id)
            .cloned()
            .collect()
    }

    /// Score a single input with this engine's tunables.
    pub fn score(&self, input: &ArchiveInput) -> ArchiveScore {
        calculate_archive_score(input, &self.config)
    }

    pub async fn trend_analysis(&self, window_days: u32, node_id: Option<&str>) -> TrendAnalysis {
        self.trend_analysis_at(window_days, node_id, Utc::now()).await
    }

    /// Compare the earliest and latest measurement inside the trailing window.
    pub async fn trend_analysis_at(
        &self,
        window_days: u32,
        node_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> TrendAnalysis {
        // Windows reaching past the representable range mean all history.
        let cutoff = Duration::try_days(i64::from(window_days))
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let log = self.state.lock().await;
        let mut window: Vec<&MetricEntry> = log
            .entries
            .iter()
            .filter(|e| e.timestamp >= cutoff)
            .filter(|e| node_id.map_or(true, |n| e.node_id == n))
            .collect();
        window.sort_by_key(|e| e.timestamp);

        let (Some(first), Some(last)) = (window.first(), window.last()) else {
            return TrendAnalysis {
                total_metrics: 0,
                growth_trend: Trend::Stable,
                size_trend_mb: SizeTrend {
                    start: 0.0,
                    end: 0.0,
                    change: 0.0,
                },
                quality_trend: Trend::Stable,
            };
        };

        let size_change = last.file_size_mb - first.file_size_mb;
        let entry_change = last.entry_count as f64 - first.entry_count as f64;
        TrendAnalysis {
            total_metrics: window.len(),
            growth_trend: Trend::classify(entry_change, 0.0),
            size_trend_mb: SizeTrend {
                start: first.file_size_mb,
                end: last.file_size_mb,
                change: size_change,
            },
            quality_trend: Trend::classify(last.quality_score - first.quality_score, TREND_TOLERANCE),
        }
    }

    /// Totals over the latest measurement of each tracked file.
    pub async fn statistics(&self) -> ArchiveStatistics {
        let log = self.state.lock().await;
        let latest = latest_per_file(&log.entries);
        let tracked_files = latest.len();
        let total_memories = latest.values().map(|e| e.entry_count).sum();
        let total_size_mb = latest.values().map(|e| e.file_size_mb).sum();
        let average_quality = if tracked_files == 0 {
            0.0
        } else {
            latest.values().map(|e| e.quality_score).sum::<f64>() / tracked_files as f64
        };
        ArchiveStatistics {
            tracked_files,
            total_memories,
            total_size_mb,
            average_quality,
        }
    }

    pub async fn archivable_candidates(
        &self,
        threshold: f64,
        node_id: Option<&str>,
    ) -> Vec<ArchiveCandidate> {
        self.archivable_candidates_at(threshold, node_id, Utc::now())
            .await
    }

    /// Files whose latest measurement scores at or above `threshold`,
    /// highest score first.
    pub async fn archivable_candidates_at(
        &self,
        threshold: f64,
        node_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<ArchiveCandidate> {
        let log = self.state.lock().await;
        let mut candidates: Vec<ArchiveCandidate> = latest_per_file(&log.entries)
            .into_values()
            .filter(|e| node_id.map_or(true, |n| e.node_id == n))
            .filter_map(|metric| {
                let input = ArchiveInput::from_metric(metric, now);
                let score = calculate_archive_score(&input, &self.config);
                METRICS.inc_archive_evaluations();
                obs::emit_archive_evaluated(&metric.file_path, score.final_score, score.should_archive);
                (score.final_score >= threshold).then(|| ArchiveCandidate {
                    metric: metric.clone(),
                    days_old: input.days_old,
                    score,
                })
            })
            .collect();
        candidates.sort_by(|a, b| b.score.final_score.total_cmp(&a.score.final_score));
        candidates
    }

    /// Tracked files whose latest size exceeds the configured limit.
    pub async fn size_recommendations(&self) -> SizeRecommendations {
        let log = self.state.lock().await;
        let oversized: Vec<OversizedFile> = latest_per_file(&log.entries)
            .into_values()
            .filter(|e| e.file_size_mb > self.config.size_warning_mb)
            .map(|e| OversizedFile {
                file_path: e.file_path.clone(),
                node_id: e.node_id.clone(),
                file_size_mb: e.file_size_mb,
            })
            .collect();
        let recommendation = (!oversized.is_empty()).then(|| SIZE_REMEDIATION.to_string());
        SizeRecommendations {
            oversized,
            recommendation,
        }
    }

    /// Drop every measurement and persist the empty log.
    pub async fn clear(&self) -> Result<()> {
        let mut log = self.state.lock().await;
        let next = MetricsLog {
            entries: Vec::new(),
            last_calculated: log.last_calculated,
        };
        self.commit(&mut log, next).await
    }
}
