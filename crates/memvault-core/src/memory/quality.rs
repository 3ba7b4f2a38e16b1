//! Quality, recency, and usage scoring for session memories.
//!
//! Everything here is pure: scores depend only on the record, the supplied
//! weights, and (for recency) the supplied clock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::index::IndexEntry;
use super::record::{section_present, AccessTrend, MemoryRecord, QualityScore, UsageTracking};

/// Default decay horizon for recency, in days.
pub const DEFAULT_MAX_AGE_DAYS: f64 = 365.0;

/// Recency never drops below this, so old memories stay loadable.
pub const RECENCY_FLOOR: f64 = 0.1;

/// Uses after which the usage weight saturates.
pub const USAGE_SATURATION: u32 = 10;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Weights applied to the three quality dimensions for one vault type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultTypeWeights {
    pub completeness_weight: f64,
    pub accuracy_weight: f64,
    pub relevance_weight: f64,
}

impl VaultTypeWeights {
    pub const fn new(completeness: f64, accuracy: f64, relevance: f64) -> Self {
        Self {
            completeness_weight: completeness,
            accuracy_weight: accuracy,
            relevance_weight: relevance,
        }
    }

    /// Weights used for unknown vault types.
    pub const GENERIC: Self = Self::new(0.4, 0.3, 0.3);
}

impl Default for VaultTypeWeights {
    fn default() -> Self {
        Self::GENERIC
    }
}

/// Lookup table from vault type tag to weights.
///
/// Ships with `generic`, `project`, `music`, and `journal`. Any tag not in the
/// table resolves to `generic`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultWeightTable {
    weights: HashMap<String, VaultTypeWeights>,
}

impl VaultWeightTable {
    pub const GENERIC_KEY: &'static str = "generic";

    /// Resolve weights for `vault_type`, falling back to `generic`.
    pub fn resolve(&self, vault_type: &str) -> VaultTypeWeights {
        self.weights
            .get(vault_type)
            .or_else(|| self.weights.get(Self::GENERIC_KEY))
            .copied()
            .unwrap_or(VaultTypeWeights::GENERIC)
    }

    /// Add or replace the weights for a vault type.
    pub fn insert(&mut self, vault_type: impl Into<String>, weights: VaultTypeWeights) {
        self.weights.insert(vault_type.into(), weights);
    }

    pub fn contains(&self, vault_type: &str) -> bool {
        self.weights.contains_key(vault_type)
    }
}

impl Default for VaultWeightTable {
    fn default() -> Self {
        let weights = HashMap::from([
            (Self::GENERIC_KEY.to_string(), VaultTypeWeights::GENERIC),
            // Project work is judged mostly on whether outcomes were recorded.
            ("project".to_string(), VaultTypeWeights::new(0.3, 0.45, 0.25)),
            ("music".to_string(), VaultTypeWeights::new(0.5, 0.2, 0.3)),
            ("journal".to_string(), VaultTypeWeights::new(0.5, 0.15, 0.35)),
        ]);
        Self { weights }
    }
}

/// Weights for combining recency and quality into one retrieval score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RankingConfig {
    pub recency_weight: f64,
    pub quality_weight: f64,
    pub max_age_days: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            recency_weight: 0.4,
            quality_weight: 0.6,
            max_age_days: DEFAULT_MAX_AGE_DAYS,
        }
    }
}

/// Scores records against a vault weight table.
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    table: VaultWeightTable,
}

impl QualityScorer {
    pub fn new(table: VaultWeightTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &VaultWeightTable {
        &self.table
    }

    /// Score `record` with the weights registered for `vault_type`.
    pub fn score(&self, record: &MemoryRecord, vault_type: &str) -> QualityScore {
        overall_quality(record, &self.table.resolve(vault_type))
    }
}

/// Age of `timestamp` relative to `now`, in fractional days. Never negative.
pub fn age_in_days(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - timestamp).num_milliseconds();
    (millis as f64 / MILLIS_PER_DAY).max(0.0)
}

/// Recency score of `timestamp` as of now. See [`recency_score_at`].
pub fn recency_score(timestamp: DateTime<Utc>, max_age_days: f64) -> f64 {
    recency_score_at(timestamp, Utc::now(), max_age_days)
}

/// Linear recency decay: `1.0` up to one day old, [`RECENCY_FLOOR`] from
/// `max_age_days` on, linear in between.
pub fn recency_score_at(timestamp: DateTime<Utc>, now: DateTime<Utc>, max_age_days: f64) -> f64 {
    let age = age_in_days(timestamp, now);
    if age <= 1.0 {
        return 1.0;
    }
    if age >= max_age_days {
        return RECENCY_FLOOR;
    }
    1.0 - ((age - 1.0) / (max_age_days - 1.0)) * (1.0 - RECENCY_FLOOR)
}

/// Usage weight, saturating at [`USAGE_SATURATION`] uses.
pub fn usage_weight(times_used: u32) -> f64 {
    (f64::from(times_used) / f64::from(USAGE_SATURATION)).min(1.0)
}

/// Fraction of the seven content sections that are non-empty.
pub fn completeness(record: &MemoryRecord) -> f64 {
    let present = record
        .sections()
        .iter()
        .filter(|s| section_present(**s))
        .count();
    present as f64 / MemoryRecord::SECTION_COUNT as f64
}

/// Accuracy heuristic. Reporting errors honestly raises the score.
pub fn accuracy(record: &MemoryRecord) -> f64 {
    let mut score: f64 = 0.5;
    if section_present(record.errors.as_deref()) {
        score += 0.25;
    }
    if record
        .learnings
        .as_deref()
        .is_some_and(|l| l.to_lowercase().contains("success"))
    {
        score += 0.15;
    }
    if section_present(record.key_results.as_deref()) {
        score += 0.10;
    }
    score.clamp(0.0, 1.0)
}

/// How well the record's metadata ties it back to the command that ran.
pub fn relevance(record: &MemoryRecord) -> f64 {
    let tags = (record.tags.len() as f64 / 5.0).min(1.0);
    let summary = (record.summary.chars().count() as f64 / 100.0).min(1.0);
    let command = (record.command.chars().count() as f64 / 20.0).min(1.0);
    (0.4 * tags + 0.35 * summary + 0.25 * command).clamp(0.0, 1.0)
}

/// Weighted quality over all three dimensions.
pub fn overall_quality(record: &MemoryRecord, weights: &VaultTypeWeights) -> QualityScore {
    let completeness = completeness(record);
    let accuracy = accuracy(record);
    let relevance_to_command = relevance(record);
    let overall = completeness * weights.completeness_weight
        + accuracy * weights.accuracy_weight
        + relevance_to_command * weights.relevance_weight;
    QualityScore {
        // NaN weights would otherwise escape the clamp.
        overall: if overall.is_nan() {
            0.0
        } else {
            overall.clamp(0.0, 1.0)
        },
        completeness,
        accuracy,
        relevance_to_command,
    }
}

/// Retrieval score for an index entry as of now. See [`ranking_score_at`].
pub fn ranking_score(entry: &IndexEntry, config: &RankingConfig) -> f64 {
    ranking_score_at(entry, Utc::now(), config)
}

/// Blend recency with usage-boosted quality.
///
/// Entries without a quality score rank on recency alone.
pub fn ranking_score_at(entry: &IndexEntry, now: DateTime<Utc>, config: &RankingConfig) -> f64 {
    let recency = recency_score_at(entry.timestamp, now, config.max_age_days);
    let Some(quality) = entry.quality.as_ref() else {
        return recency;
    };
    let times_used = entry.usage.as_ref().map_or(0, |u| u.times_used);
    let boosted = (quality.overall + usage_weight(times_used) * 0.1).min(1.0);
    recency * config.recency_weight + boosted * config.quality_weight
}

/// Register one consumption of a memory.
pub fn update_usage_tracking(prev: Option<&UsageTracking>) -> UsageTracking {
    record_uses(prev, 1, Utc::now())
}

/// Register `uses` consumptions of a memory at `now`.
///
/// The trend is `increasing` when the new count jumps past
/// `max(previous + 1, 2)`, which only a batch of several uses can do.
pub fn record_uses(prev: Option<&UsageTracking>, uses: u32, now: DateTime<Utc>) -> UsageTracking {
    let previous = prev.map_or(0, |u| u.times_used);
    let times_used = previous.saturating_add(uses);
    let access_trend = if times_used > (previous.saturating_add(1)).max(2) {
        AccessTrend::Increasing
    } else if times_used < previous {
        AccessTrend::Decreasing
    } else {
        AccessTrend::Stable
    };
    UsageTracking {
        last_used: now,
        times_used,
        access_trend,
    }
}
