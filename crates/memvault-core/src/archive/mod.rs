//! Archive subsystem: per-file metrics, eviction scoring, and the restore
//! contract.
//!
//! Records measurements of memory files over time, turns the latest one per
//! file into an archive recommendation, and reports growth and quality
//! trends. Moving files to cold storage is left to the caller.

pub mod engine;
pub mod metric;
pub mod restore;
pub mod scoring;

pub use engine::{
    ArchiveCandidate, ArchiveEngine, ArchiveStatistics, OversizedFile, SizeRecommendations,
    SizeTrend, Trend, TrendAnalysis, SIZE_REMEDIATION,
};
pub use metric::{measure_memory_file, MetricEntry};
pub use restore::{RestoreReport, RestoreSelection, RestoreTransport};
pub use scoring::{calculate_archive_score, ArchiveConfig, ArchiveInput, ArchiveScore};
