//! Global atomic counters for memvault observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a maintenance pass).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters.
pub struct Metrics {
    memories_loaded: AtomicU64,
    memories_skipped: AtomicU64,
    store_writes: AtomicU64,
    archive_evaluations: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            memories_loaded: AtomicU64::new(0),
            memories_skipped: AtomicU64::new(0),
            store_writes: AtomicU64::new(0),
            archive_evaluations: AtomicU64::new(0),
        }
    }

    /// Add `n` to the memories-loaded counter.
    pub fn add_memories_loaded(&self, n: u64) {
        self.memories_loaded.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "memories_loaded", "counter incremented");
    }

    pub fn inc_memories_skipped(&self) {
        self.memories_skipped.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "memories_skipped", "counter incremented");
    }

    pub fn inc_store_writes(&self) {
        self.store_writes.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "store_writes", "counter incremented");
    }

    pub fn inc_archive_evaluations(&self) {
        self.archive_evaluations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "archive_evaluations", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            memories_loaded = self.memories_loaded(),
            memories_skipped = self.memories_skipped(),
            store_writes = self.store_writes(),
            archive_evaluations = self.archive_evaluations(),
        );
    }

    pub fn memories_loaded(&self) -> u64 {
        self.memories_loaded.load(Ordering::Relaxed)
    }

    pub fn memories_skipped(&self) -> u64 {
        self.memories_skipped.load(Ordering::Relaxed)
    }

    pub fn store_writes(&self) -> u64 {
        self.store_writes.load(Ordering::Relaxed)
    }

    pub fn archive_evaluations(&self) -> u64 {
        self.archive_evaluations.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.memories_loaded.store(0, Ordering::Relaxed);
        self.memories_skipped.store(0, Ordering::Relaxed);
        self.store_writes.store(0, Ordering::Relaxed);
        self.archive_evaluations.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.add_memories_loaded(3);
        m.add_memories_loaded(2);
        assert_eq!(m.memories_loaded(), 5);

        m.inc_memories_skipped();
        assert_eq!(m.memories_skipped(), 1);

        m.inc_store_writes();
        m.inc_store_writes();
        assert_eq!(m.store_writes(), 2);

        m.inc_archive_evaluations();
        assert_eq!(m.archive_evaluations(), 1);
        m.flush();
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.add_memories_loaded(1);
        m.inc_memories_skipped();
        m.inc_store_writes();
        m.inc_archive_evaluations();
        m.reset();
        assert_eq!(m.memories_loaded(), 0);
        assert_eq!(m.memories_skipped(), 0);
        assert_eq!(m.store_writes(), 0);
        assert_eq!(m.archive_evaluations(), 0);
    }
}
