//! Memory subsystem: records, quality scoring, the persistent index, and
//! context loading.
//!
//! Provides scoring of session memory records, a JSON-backed index queryable
//! by node, tag, command, or text, and discovery/ranking/injection of
//! `memory.md` files into new contexts.

pub mod index;
pub mod loader;
pub mod quality;
pub mod record;
pub mod walk;

pub use index::{IndexEntry, IndexFileStats, IndexStats, MemoryIndex, SearchResult};
pub use loader::{
    discover_memories, inject_memories_into_context, inject_memories_into_prompt,
    load_memory_file, load_relevant_memories, memory_summary, rank_memories, InjectedPrompt,
    LoadOptions, LoadedMemory, MemoryLoader, RankOptions, RankedMemory, SortBy, CONTEXT_HEADER,
};
pub use quality::{
    accuracy, completeness, overall_quality, ranking_score, recency_score, relevance,
    update_usage_tracking, usage_weight, QualityScorer, RankingConfig, VaultTypeWeights,
    VaultWeightTable,
};
pub use record::{AccessTrend, MemoryRecord, QualityScore, UsageTracking};
pub use walk::{DiscoveredMemory, MemoryWalk, MEMORY_FILENAME};
