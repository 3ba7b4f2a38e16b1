//! Composite eviction score over age, quality, and usage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metric::MetricEntry;
use crate::error::{MemvaultError, Result};
use crate::memory::quality::age_in_days;

/// Tunables for archive decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArchiveConfig {
    /// Scores strictly above this are flagged for archival.
    pub threshold: f64,
    /// Age at which the age factor saturates.
    pub age_horizon_days: f64,
    /// Usage count at which the usage factor stops penalizing.
    pub usage_saturation: f64,
    pub age_weight: f64,
    pub quality_weight: f64,
    pub usage_weight: f64,
    /// Files above this size are reported by size recommendations.
    #[serde(rename = "sizeWarningMB")]
    pub size_warning_mb: f64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            age_horizon_days: 90.0,
            usage_saturation: 10.0,
            age_weight: 0.4,
            quality_weight: 0.3,
            usage_weight: 0.3,
            size_warning_mb: 5.0,
        }
    }
}

impl ArchiveConfig {
    pub fn validate(&self) -> Result<()> {
        let unit = [
            ("threshold", self.threshold),
            ("ageWeight", self.age_weight),
            ("qualityWeight", self.quality_weight),
            ("usageWeight", self.usage_weight),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(MemvaultError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        let positive = [
            ("ageHorizonDays", self.age_horizon_days),
            ("usageSaturation", self.usage_saturation),
            ("sizeWarningMB", self.size_warning_mb),
        ];
        for (name, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(MemvaultError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Inputs to one archive decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArchiveInput {
    pub quality_score: f64,
    pub usage_frequency: f64,
    pub days_old: f64,
}

impl ArchiveInput {
    /// Age is measured from the metric's own timestamp.
    pub fn from_metric(metric: &MetricEntry, now: DateTime<Utc>) -> Self {
        Self {
            quality_score: metric.quality_score,
            usage_frequency: metric.usage_frequency,
            days_old: age_in_days(metric.timestamp, now),
        }
    }
}

/// Archive judgment for one file. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveScore {
    pub final_score: f64,
    pub should_archive: bool,
    pub reason: String,
}

/// Weighted blend of age, low quality, and low usage.
///
/// A factor is named in the reason when it exceeds half of its own weight.
pub fn calculate_archive_score(input: &ArchiveInput, config: &ArchiveConfig) -> ArchiveScore {
    let age_score = (input.days_old.max(0.0) / config.age_horizon_days).min(1.0);
    let quality_penalty = 1.0 - input.quality_score.clamp(0.0, 1.0);
    let usage_penalty = 1.0 - (input.usage_frequency.max(0.0) / config.usage_saturation).min(1.0);

    let final_score = (config.age_weight * age_score
        + config.quality_weight * quality_penalty
        + config.usage_weight * usage_penalty)
        .clamp(0.0, 1.0);

    let factors: Vec<&str> = [
        (age_score, "old"),
        (quality_penalty, "low quality"),
        (usage_penalty, "rarely used"),
    ]
    .into_iter()
    .filter(|(factor, _)| *factor > 0.5)
    .map(|(_, label)| label)
    .collect();

    let reason = if factors.is_empty() {
        "actively useful".to_string()
    } else {
        factors.join(", ")
    };

    ArchiveScore {
        final_score,
        should_archive: final_score > config.threshold,
        reason,
    }
}
