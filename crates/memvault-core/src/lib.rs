//! memvault: session memory storage for agent workflows.
//!
//! Scores the quality of captured session memories, keeps a persistent index
//! over them, loads the most relevant ones back into new contexts, and tracks
//! per-file metrics to recommend what to archive.

pub mod archive;
pub mod config;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod obs;
pub mod store;
pub mod telemetry;

pub use archive::{
    calculate_archive_score, measure_memory_file, ArchiveCandidate, ArchiveConfig, ArchiveEngine,
    ArchiveInput, ArchiveScore, ArchiveStatistics, MetricEntry, RestoreReport, RestoreSelection,
    RestoreTransport, SizeRecommendations, Trend, TrendAnalysis,
};
pub use config::MemvaultConfig;
pub use error::{MemvaultError, Result};
pub use memory::{
    discover_memories, inject_memories_into_context, inject_memories_into_prompt,
    load_memory_file, load_relevant_memories, memory_summary, rank_memories, AccessTrend,
    DiscoveredMemory, IndexEntry, LoadOptions, LoadedMemory, MemoryIndex, MemoryLoader,
    MemoryRecord, QualityScore, QualityScorer, RankOptions, RankedMemory, RankingConfig,
    SearchResult, SortBy, UsageTracking, VaultWeightTable,
};
pub use store::LoadOutcome;
pub use telemetry::init_tracing;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
