//! Property-based tests for scoring and injection invariants.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use memvault_core::archive::{calculate_archive_score, ArchiveConfig, ArchiveInput};
use memvault_core::memory::quality::{recency_score_at, record_uses, RECENCY_FLOOR};
use memvault_core::memory::{
    inject_memories_into_context, overall_quality, usage_weight, MemoryRecord, VaultTypeWeights,
};

fn section() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[ a-zA-Z]{0,40}")
}

prop_compose! {
    fn arb_record()(
        title in section(),
        current_state in section(),
        task_spec in section(),
        workflow in section(),
        errors in section(),
        learnings in section(),
        key_results in section(),
        summary in "[ a-z]{0,200}",
        command in "[ a-z]{0,40}",
        tags in prop::collection::btree_set("[a-z]{1,8}", 0..10),
    ) -> MemoryRecord {
        let mut r = MemoryRecord::new("s", "n", command);
        r.title = title;
        r.current_state = current_state;
        r.task_spec = task_spec;
        r.workflow = workflow;
        r.errors = errors;
        r.learnings = learnings;
        r.key_results = key_results;
        r.summary = summary;
        r.tags = tags;
        r
    }
}

proptest! {
    #[test]
    fn quality_scores_stay_in_unit_range(
        record in arb_record(),
        c in 0.0f64..1.0,
        a in 0.0f64..1.0,
    ) {
        let weights = VaultTypeWeights::new(c, a, (1.0 - c - a).max(0.0));
        let q = overall_quality(&record, &weights);
        for v in [q.overall, q.completeness, q.accuracy, q.relevance_to_command] {
            prop_assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn recency_never_increases_with_age(
        a in 0i64..800 * 24,
        b in 0i64..800 * 24,
        max_age in 2.0f64..720.0,
    ) {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let (young, old) = if a <= b { (a, b) } else { (b, a) };
        let r_young = recency_score_at(now - Duration::hours(young), now, max_age);
        let r_old = recency_score_at(now - Duration::hours(old), now, max_age);
        prop_assert!(r_old <= r_young + 1e-12);
        prop_assert!((RECENCY_FLOOR..=1.0).contains(&r_old));
    }

    #[test]
    fn usage_weight_saturates(n in 0u32..10_000) {
        let w = usage_weight(n);
        prop_assert!((0.0..=1.0).contains(&w));
        if n >= 10 {
            prop_assert_eq!(w, 1.0);
        }
    }

    #[test]
    fn usage_counts_accumulate(batches in prop::collection::vec(1u32..5, 1..20)) {
        let now = Utc::now();
        let mut usage = None;
        for uses in &batches {
            usage = Some(record_uses(usage.as_ref(), *uses, now));
        }
        let total: u32 = batches.iter().sum();
        prop_assert_eq!(usage.map(|u| u.times_used), Some(total));
    }

    #[test]
    fn archive_score_is_bounded(
        quality in -1.0f64..2.0,
        usage in -5.0f64..50.0,
        days in -10.0f64..1000.0,
    ) {
        let s = calculate_archive_score(
            &ArchiveInput { quality_score: quality, usage_frequency: usage, days_old: days },
            &ArchiveConfig::default(),
        );
        prop_assert!((0.0..=1.0).contains(&s.final_score));
        prop_assert_eq!(s.should_archive, s.final_score > 0.6);
    }

    #[test]
    fn injection_preserves_base_context(
        base in ".{0,200}",
        memories in prop::collection::vec("[a-z ]{0,50}", 0..5),
    ) {
        let out = inject_memories_into_context(&base, &memories);
        prop_assert!(out.ends_with(&base));
        if memories.is_empty() {
            prop_assert_eq!(out, base);
        } else {
            for i in 1..=memories.len() {
                let marker = format!("[Session {i}]");
                prop_assert!(out.contains(&marker));
            }
        }
    }
}
