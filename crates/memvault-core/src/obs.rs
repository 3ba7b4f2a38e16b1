//! Structured observability hooks for memvault.
//!
//! This module provides:
//! - Node-scoped tracing spans via the `NodeSpan` RAII guard
//! - Emission functions for key events: memories injected or skipped, store
//!   persisted or recovered, archive decisions
//!
//! Events are emitted at `info!` level unless noted (filter with `MEMVAULT_LOG`).

use std::path::Path;

use tracing::{info, warn};

/// RAII guard that enters a node-scoped span for the duration of an operation.
///
/// # Example
///
/// ```ignore
/// let _span = NodeSpan::enter("workspace-a");
/// // tracing calls below carry node_id = "workspace-a"
/// ```
pub struct NodeSpan {
    _span: tracing::span::EnteredSpan,
}

impl NodeSpan {
    /// Create and enter a span tagged with the node id.
    pub fn enter(node_id: &str) -> Self {
        let span = tracing::info_span!("memvault.node", node_id = %node_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: memories loaded and handed to a caller for injection.
pub fn emit_memories_injected(node_id: &str, count: usize) {
    info!(event = "memory.injected", node_id = %node_id, count = count);
}

/// Emit event: a memory file was skipped during a batch load (warning level).
pub fn emit_memory_skipped(path: &Path, reason: &dyn std::fmt::Display) {
    warn!(event = "memory.skipped", path = %path.display(), reason = %reason);
}

/// Emit event: a JSON store was written to disk.
pub fn emit_store_persisted(store: &str, path: &Path, entries: usize) {
    info!(
        event = "store.persisted",
        store = store,
        path = %path.display(),
        entries = entries,
    );
}

/// Emit event: a JSON store was unreadable and replaced by an empty one (warning level).
pub fn emit_store_recovered(store: &str, path: &Path, reason: &str) {
    warn!(
        event = "store.recovered",
        store = store,
        path = %path.display(),
        reason = %reason,
    );
}

/// Emit event: an archive decision was computed for a file.
pub fn emit_archive_evaluated(file_path: &str, final_score: f64, should_archive: bool) {
    info!(
        event = "archive.evaluated",
        file_path = %file_path,
        final_score = final_score,
        should_archive = should_archive,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_span_create() {
        let _span = NodeSpan::enter("test-node");
        emit_memories_injected("test-node", 2);
    }
}
