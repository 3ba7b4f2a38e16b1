//! Discovery, ranking, loading, and context injection of session memories.
//!
//! Memories live at `{sessions_root}/{node_id}/{YYYY}/{MM}/{DD}/{session_id}/memory.md`.
//! Every function here is best-effort: a missing tree, an unreadable file, or
//! a failed background task shrinks the result instead of failing the call.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::index::MemoryIndex;
use super::quality::{
    age_in_days, ranking_score_at, recency_score_at, RankingConfig, DEFAULT_MAX_AGE_DAYS,
};
use super::walk::{DiscoveredMemory, MemoryWalk};
use crate::error::Result;
use crate::metrics::METRICS;
use crate::obs;

/// First line of an injected context block.
pub const CONTEXT_HEADER: &str = "=== CONTEXT FROM PREVIOUS SESSIONS ===";

/// Separator between injected memories and before the base context.
pub const SESSION_DIVIDER: &str = "---";

/// Ordering applied by [`rank_memories`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Newest first.
    #[default]
    Recent,
    /// Highest relevance score first.
    Relevance,
}

/// Filters and ordering for [`rank_memories`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RankOptions {
    pub limit: Option<usize>,
    pub max_age_days: Option<f64>,
    pub sort_by: SortBy,
}

/// Defaults for loading memories into a new context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadOptions {
    pub limit: usize,
    pub max_age_days: f64,
    pub sort_by: SortBy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            limit: 3,
            max_age_days: 30.0,
            sort_by: SortBy::Recent,
        }
    }
}

impl From<LoadOptions> for RankOptions {
    fn from(opts: LoadOptions) -> Self {
        Self {
            limit: Some(opts.limit),
            max_age_days: Some(opts.max_age_days),
            sort_by: opts.sort_by,
        }
    }
}

/// A discovered memory with its relevance score in `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedMemory {
    #[serde(flatten)]
    pub memory: DiscoveredMemory,
    pub relevance_score: f64,
}

/// Content of a memory that was successfully read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedMemory {
    pub session_id: String,
    pub path: PathBuf,
    pub content: String,
}

/// Context and command text after memory injection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectedPrompt {
    pub context: String,
    pub command: String,
}

/// Directory holding one node's sessions, or `None` for node ids that would
/// resolve outside `sessions_root`.
pub fn node_root(sessions_root: &Path, node_id: &str) -> Option<PathBuf> {
    let mut components = Path::new(node_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(sessions_root.join(node_id)),
        _ => None,
    }
}

/// Every `memory.md` under `node_id`, newest first. Empty for a missing tree.
pub fn discover_memories(sessions_root: &Path, node_id: &str) -> Vec<DiscoveredMemory> {
    let _span = obs::NodeSpan::enter(node_id);
    let Some(root) = node_root(sessions_root, node_id) else {
        warn!(node_id = %node_id, "rejecting node id outside the sessions root");
        return Vec::new();
    };
    let mut found: Vec<DiscoveredMemory> = MemoryWalk::new(root).iter().collect();
    found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.path.cmp(&b.path)));
    debug!(node_id = %node_id, count = found.len(), "memories discovered");
    found
}

/// Read a memory file. `None` means skip it.
pub async fn load_memory_file(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Some(content),
        Err(e) => {
            obs::emit_memory_skipped(path, &e);
            METRICS.inc_memories_skipped();
            None
        }
    }
}

/// Filter, score, order, and truncate discovered memories as of now.
pub fn rank_memories(entries: Vec<DiscoveredMemory>, opts: &RankOptions) -> Vec<RankedMemory> {
    rank_memories_at(entries, Utc::now(), opts)
}

/// [`rank_memories`] with an explicit clock.
///
/// Memories at or past `max_age_days` are dropped, matching the point where
/// recency bottoms out.
pub fn rank_memories_at(
    entries: Vec<DiscoveredMemory>,
    now: DateTime<Utc>,
    opts: &RankOptions,
) -> Vec<RankedMemory> {
    let horizon = opts.max_age_days.unwrap_or(DEFAULT_MAX_AGE_DAYS);
    let mut ranked: Vec<RankedMemory> = entries
        .into_iter()
        .filter(|m| match opts.max_age_days {
            Some(max_age) => age_in_days(m.timestamp, now) < max_age,
            None => true,
        })
        .map(|memory| RankedMemory {
            relevance_score: recency_score_at(memory.timestamp, now, horizon) * 100.0,
            memory,
        })
        .collect();

    sort_ranked(&mut ranked, opts.sort_by);
    if let Some(limit) = opts.limit {
        ranked.truncate(limit);
    }
    ranked
}

fn sort_ranked(ranked: &mut [RankedMemory], sort_by: SortBy) {
    match sort_by {
        SortBy::Recent => ranked.sort_by(|a, b| b.memory.timestamp.cmp(&a.memory.timestamp)),
        SortBy::Relevance => ranked.sort_by(|a, b| {
            b.relevance_score
                .total_cmp(&a.relevance_score)
                .then_with(|| b.memory.timestamp.cmp(&a.memory.timestamp))
        }),
    }
}

/// Discover, rank, and read the top memories for a node. Never fails.
pub async fn load_relevant_memories(
    sessions_root: &Path,
    node_id: &str,
    options: &LoadOptions,
) -> Vec<String> {
    MemoryLoader::new(sessions_root)
        .load_relevant_with(node_id, options)
        .await
        .into_iter()
        .map(|m| m.content)
        .collect()
}

/// Prepend previous-session memories to `base_context`.
///
/// With no memories `base_context` comes back unchanged; otherwise it is
/// appended verbatim after the injected block. Memory contents are copied
/// as-is, trailing whitespace included.
pub fn inject_memories_into_context(base_context: &str, memories: &[String]) -> String {
    if memories.is_empty() {
        return base_context.to_string();
    }
    let mut out = String::with_capacity(
        base_context.len() + memories.iter().map(|m| m.len() + 32).sum::<usize>() + 64,
    );
    out.push_str(CONTEXT_HEADER);
    out.push_str("\n\n");
    for (i, memory) in memories.iter().enumerate() {
        out.push_str(&format!("[Session {}]\n{}\n\n", i + 1, memory));
        out.push_str(SESSION_DIVIDER);
        out.push_str("\n\n");
    }
    out.push_str(base_context);
    out
}

/// Inject memories into the context half of a prompt. The command is never
/// touched.
pub fn inject_memories_into_prompt(
    context_text: &str,
    command_text: &str,
    memories: &[String],
) -> InjectedPrompt {
    InjectedPrompt {
        context: inject_memories_into_context(context_text, memories),
        command: command_text.to_string(),
    }
}

/// One-line, log-friendly description of how many memories were loaded.
pub fn memory_summary<T>(memories: &[T]) -> String {
    match memories.len() {
        1 => "Loaded 1 past session for context".to_string(),
        n => format!("Loaded {n} past sessions for context"),
    }
}

/// Loader bound to one sessions root, optionally consulting a memory index
/// for quality- and usage-aware relevance.
#[derive(Debug, Clone)]
pub struct MemoryLoader {
    sessions_root: PathBuf,
    options: LoadOptions,
    ranking: RankingConfig,
    index: Option<Arc<MemoryIndex>>,
}

impl MemoryLoader {
    pub fn new(sessions_root: impl Into<PathBuf>) -> Self {
        Self {
            sessions_root: sessions_root.into(),
            options: LoadOptions::default(),
            ranking: RankingConfig::default(),
            index: None,
        }
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Attach an index. With [`SortBy::Relevance`], indexed sessions that
    /// carry a quality score are ranked by [`ranking_score_at`].
    pub fn with_index(mut self, index: Arc<MemoryIndex>, ranking: RankingConfig) -> Self {
        self.index = Some(index);
        self.ranking = ranking;
        self
    }

    pub fn sessions_root(&self) -> &Path {
        &self.sessions_root
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// [`discover_memories`] on the blocking pool.
    pub async fn discover(&self, node_id: &str) -> Vec<DiscoveredMemory> {
        let root = self.sessions_root.clone();
        let node = node_id.to_string();
        match tokio::task::spawn_blocking(move || discover_memories(&root, &node)).await {
            Ok(found) => found,
            Err(e) => {
                warn!(node_id = %node_id, error = %e, "discovery task failed");
                Vec::new()
            }
        }
    }

    /// Discover and rank memories for a node.
    pub async fn rank(&self, node_id: &str, options: &LoadOptions) -> Vec<RankedMemory> {
        let discovered = self.discover(node_id).await;
        let now = Utc::now();
        let index = match (&self.index, options.sort_by) {
            (Some(index), SortBy::Relevance) => index,
            _ => return rank_memories_at(discovered, now, &RankOptions::from(*options)),
        };

        let unlimited = RankOptions {
            limit: None,
            ..RankOptions::from(*options)
        };
        let mut ranked = rank_memories_at(discovered, now, &unlimited);
        for r in &mut ranked {
            if let Some(entry) = index.get_entry(&r.memory.session_id).await {
                if entry.quality.is_some() {
                    r.relevance_score = ranking_score_at(&entry, now, &self.ranking) * 100.0;
                }
            }
        }
        sort_ranked(&mut ranked, SortBy::Relevance);
        ranked.truncate(options.limit);
        ranked
    }

    /// Load the top memories for a node using the loader's default options.
    pub async fn load_relevant(&self, node_id: &str) -> Vec<LoadedMemory> {
        let options = self.options;
        self.load_relevant_with(node_id, &options).await
    }

    /// Load the top memories for a node. Files that fail to read are dropped;
    /// rank order is preserved for the rest.
    pub async fn load_relevant_with(
        &self,
        node_id: &str,
        options: &LoadOptions,
    ) -> Vec<LoadedMemory> {
        let ranked = self.rank(node_id, options).await;
        let loads = ranked.into_iter().map(|r| async move {
            load_memory_file(&r.memory.path)
                .await
                .map(|content| LoadedMemory {
                    session_id: r.memory.session_id,
                    path: r.memory.path,
                    content,
                })
        });
        let loaded: Vec<LoadedMemory> = join_all(loads).await.into_iter().flatten().collect();

        METRICS.add_memories_loaded(loaded.len() as u64);
        obs::emit_memories_injected(node_id, loaded.len());
        loaded
    }

    /// Record that these sessions were actually consumed. Returns how many
    /// were found in the index; zero when no index is attached.
    pub async fn record_consumed(&self, session_ids: &[String]) -> Result<usize> {
        let Some(index) = &self.index else {
            return Ok(0);
        };
        let mut updated = 0;
        for id in session_ids {
            if index.record_usage(id).await?.is_some() {
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn discovered(id: &str, ts: DateTime<Utc>) -> DiscoveredMemory {
        DiscoveredMemory {
            path: PathBuf::from(format!("/sessions/n/2026/01/01/{id}/memory.md")),
            filename: "memory.md".into(),
            timestamp: ts,
            session_id: id.into(),
        }
    }

    #[test]
    fn test_rank_orders_most_recent_first() {
        let now = Utc::now();
        let entries = vec![
            discovered("two", now - Duration::days(2)),
            discovered("one", now - Duration::days(1)),
            discovered("zero", now),
        ];
        let ranked = rank_memories_at(entries, now, &RankOptions::default());
        let ids: Vec<&str> = ranked.iter().map(|r| r.memory.session_id.as_str()).collect();
        assert_eq!(ids, vec!["zero", "one", "two"]);
    }

    #[test]
    fn test_rank_filters_by_max_age_and_limits() {
        let now = Utc::now();
        let entries = vec![
            discovered("fresh", now - Duration::days(1)),
            discovered("edge", now - Duration::days(30)),
            discovered("stale", now - Duration::days(45)),
            discovered("new", now),
        ];
        let opts = RankOptions {
            limit: Some(1),
            max_age_days: Some(30.0),
            sort_by: SortBy::Recent,
        };
        let ranked = rank_memories_at(entries.clone(), now, &opts);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].memory.session_id, "new");

        let all = rank_memories_at(
            entries,
            now,
            &RankOptions {
                limit: None,
                ..opts
            },
        );
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_relevance_scores_in_range() {
        let now = Utc::now();
        let entries = vec![
            discovered("a", now - Duration::days(200)),
            discovered("b", now),
        ];
        let ranked = rank_memories_at(
            entries,
            now,
            &RankOptions {
                sort_by: SortBy::Relevance,
                ..Default::default()
            },
        );
        assert_eq!(ranked[0].memory.session_id, "b");
        assert_eq!(ranked[0].relevance_score, 100.0);
        assert!(ranked[1].relevance_score >= 10.0 && ranked[1].relevance_score < 100.0);
    }

    #[test]
    fn test_node_root_rejects_escapes() {
        let root = Path::new("/sessions");
        assert_eq!(node_root(root, "alpha"), Some(PathBuf::from("/sessions/alpha")));
        assert!(node_root(root, "").is_none());
        assert!(node_root(root, "..").is_none());
        assert!(node_root(root, "a/b").is_none());
        assert!(node_root(root, "/etc").is_none());
    }

    #[test]
    fn test_inject_empty_is_identity() {
        let ctx = "base context\nwith lines\n";
        assert_eq!(inject_memories_into_context(ctx, &[]), ctx);
    }

    #[test]
    fn test_inject_layout() {
        let memories = vec!["first memory\n".to_string(), "second memory".to_string()];
        let out = inject_memories_into_context("BASE", &memories);
        assert!(out.starts_with(CONTEXT_HEADER));
        assert!(out.contains("[Session 1]\nfirst memory"));
        assert!(out.contains("[Session 2]\nsecond memory"));
        assert!(out.ends_with("---\n\nBASE"));
        assert!(out.find("[Session 1]").unwrap() < out.find("[Session 2]").unwrap());
    }

    #[test]
    fn test_inject_keeps_memory_bytes() {
        let memories = vec!["notes  \n\n".to_string(), "\ttabbed\t".to_string()];
        let out = inject_memories_into_context("BASE", &memories);
        assert!(out.contains("[Session 1]\nnotes  \n\n\n\n---"));
        assert!(out.contains("[Session 2]\n\ttabbed\t\n\n---"));
    }

    #[test]
    fn test_prompt_command_untouched() {
        let memories = vec!["m".to_string()];
        let p = inject_memories_into_prompt("ctx", "  do the thing\n", &memories);
        assert_eq!(p.command, "  do the thing\n");
        assert!(p.context.ends_with("ctx"));
    }

    #[test]
    fn test_memory_summary_pluralization() {
        assert_eq!(memory_summary(&["x"]), "Loaded 1 past session for context");
        assert!(memory_summary(&["a", "b", "c", "d", "e"]).contains('5'));
        let none: [&str; 0] = [];
        assert!(memory_summary(&none).contains('0'));
    }

    #[tokio::test]
    async fn test_load_memory_file_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_memory_file(&dir.path().join("nope.md")).await.is_none());
    }
}
