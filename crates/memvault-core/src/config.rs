//! Runtime configuration.
//!
//! Built from defaults, optionally a JSON file, and `MEMVAULT_*` environment
//! variables, then validated once before services are opened.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::archive::{ArchiveConfig, ArchiveEngine};
use crate::error::{MemvaultError, Result};
use crate::memory::{
    LoadOptions, MemoryIndex, MemoryLoader, QualityScorer, RankingConfig, VaultWeightTable,
};

pub const ENV_SESSIONS_ROOT: &str = "MEMVAULT_SESSIONS_ROOT";
pub const ENV_INDEX_PATH: &str = "MEMVAULT_INDEX_PATH";
pub const ENV_METRICS_PATH: &str = "MEMVAULT_METRICS_PATH";
pub const ENV_VAULT_TYPE: &str = "MEMVAULT_VAULT_TYPE";
pub const ENV_ARCHIVE_THRESHOLD: &str = "MEMVAULT_ARCHIVE_THRESHOLD";
pub const ENV_MAX_AGE_DAYS: &str = "MEMVAULT_MAX_AGE_DAYS";

/// Top-level memvault configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemvaultConfig {
    pub sessions_root: PathBuf,
    pub index_path: PathBuf,
    pub metrics_path: PathBuf,
    pub vault_type: String,
    pub ranking: RankingConfig,
    pub loader: LoadOptions,
    pub archive: ArchiveConfig,
}

impl Default for MemvaultConfig {
    fn default() -> Self {
        let base = PathBuf::from(".memvault");
        Self {
            sessions_root: base.join("sessions"),
            index_path: base.join("index.json"),
            metrics_path: base.join("metrics.json"),
            vault_type: VaultWeightTable::GENERIC_KEY.to_string(),
            ranking: RankingConfig::default(),
            loader: LoadOptions::default(),
            archive: ArchiveConfig::default(),
        }
    }
}

impl MemvaultConfig {
    /// Defaults overlaid with `MEMVAULT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Parse and validate a JSON config file. Missing keys take defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (an environment-like key source), then
    /// validate.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = lookup(ENV_SESSIONS_ROOT) {
            self.sessions_root = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_INDEX_PATH) {
            self.index_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_METRICS_PATH) {
            self.metrics_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_VAULT_TYPE) {
            self.vault_type = v;
        }
        if let Some(v) = lookup(ENV_ARCHIVE_THRESHOLD) {
            self.archive.threshold = parse_f64(ENV_ARCHIVE_THRESHOLD, &v)?;
        }
        if let Some(v) = lookup(ENV_MAX_AGE_DAYS) {
            self.loader.max_age_days = parse_f64(ENV_MAX_AGE_DAYS, &v)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.vault_type.trim().is_empty() {
            return Err(MemvaultError::InvalidConfig(
                "vaultType must not be empty".to_string(),
            ));
        }
        for (name, weight) in [
            ("ranking.recencyWeight", self.ranking.recency_weight),
            ("ranking.qualityWeight", self.ranking.quality_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(MemvaultError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {weight}"
                )));
            }
        }
        for (name, days) in [
            ("ranking.maxAgeDays", self.ranking.max_age_days),
            ("loader.maxAgeDays", self.loader.max_age_days),
        ] {
            if days.is_nan() || days <= 0.0 {
                return Err(MemvaultError::InvalidConfig(format!(
                    "{name} must be positive, got {days}"
                )));
            }
        }
        self.archive.validate()
    }

    /// Open the memory index described by this config.
    pub async fn open_index(&self) -> MemoryIndex {
        MemoryIndex::load_with_scorer(
            &self.index_path,
            QualityScorer::default(),
            self.vault_type.clone(),
        )
        .await
    }

    /// Open the archive engine described by this config.
    pub async fn open_archive(&self) -> ArchiveEngine {
        ArchiveEngine::load_with_config(&self.metrics_path, self.archive.clone()).await
    }

    /// Build a loader, attaching `index` for quality-aware relevance.
    pub fn loader(&self, index: Option<Arc<MemoryIndex>>) -> MemoryLoader {
        let loader = MemoryLoader::new(&self.sessions_root).with_options(self.loader);
        match index {
            Some(index) => loader.with_index(index, self.ranking),
            None => loader,
        }
    }
}

fn parse_f64(key: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse()
        .map_err(|_| MemvaultError::InvalidConfig(format!("{key} is not a number: {raw:?}")))
}
