//! End-to-end tests for discovering, ranking, loading, and injecting session
//! memories from an on-disk session tree.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use memvault_core::memory::{
    discover_memories, inject_memories_into_context, load_relevant_memories, memory_summary,
    LoadOptions, MemoryIndex, MemoryLoader, MemoryRecord, RankingConfig, SortBy, CONTEXT_HEADER,
};

const DAY: u64 = 24 * 60 * 60;

/// Write `sessions/{node}/2026/01/01/{session}/memory.md` aged `days_old`.
fn write_memory(root: &Path, node: &str, session: &str, body: &str, days_old: u64) -> PathBuf {
    let dir = root.join(node).join("2026").join("01").join("01").join(session);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("memory.md");
    std::fs::write(&path, body).unwrap();
    let mtime = SystemTime::now() - Duration::from_secs(days_old * DAY);
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(mtime)
        .unwrap();
    path
}

#[tokio::test]
async fn test_loads_most_recent_memories_first() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_memory(root, "builder", "s-old", "old work", 10);
    write_memory(root, "builder", "s-new", "new work", 0);
    write_memory(root, "builder", "s-mid", "mid work", 3);
    write_memory(root, "other", "s-x", "someone else", 0);

    let memories = load_relevant_memories(root, "builder", &LoadOptions::default()).await;
    assert_eq!(memories, vec!["new work", "mid work", "old work"]);
}

#[tokio::test]
async fn test_limit_and_max_age_are_applied() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    for (i, age) in [0u64, 1, 2, 5, 40].iter().enumerate() {
        write_memory(root, "n", &format!("s{i}"), &format!("m{i}"), *age);
    }

    let opts = LoadOptions {
        limit: 10,
        max_age_days: 30.0,
        sort_by: SortBy::Recent,
    };
    let within_month = load_relevant_memories(root, "n", &opts).await;
    assert_eq!(within_month.len(), 4);
    assert!(!within_month.contains(&"m4".to_string()));

    let top_two = load_relevant_memories(
        root,
        "n",
        &LoadOptions {
            limit: 2,
            ..opts
        },
    )
    .await;
    assert_eq!(top_two, vec!["m0", "m1"]);
}

#[tokio::test]
async fn test_missing_node_and_traversal_yield_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("sessions");
    write_memory(&root, "n", "s1", "content", 0);

    assert!(load_relevant_memories(&root, "nobody", &LoadOptions::default())
        .await
        .is_empty());
    assert!(discover_memories(&root, "../sessions").is_empty());
    assert!(discover_memories(&root, "n/2026").is_empty());
    assert!(discover_memories(&dir.path().join("absent"), "n").is_empty());
}

#[tokio::test]
async fn test_only_memory_files_are_discovered() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let path = write_memory(root, "n", "s1", "content", 0);
    std::fs::write(path.with_file_name("transcript.md"), "noise").unwrap();
    std::fs::write(root.join("n").join("memory.md"), "misplaced at node root").unwrap();

    let found = discover_memories(root, "n");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].session_id, "s1");
    assert_eq!(found[0].filename, "memory.md");
}

#[tokio::test]
async fn test_unreadable_memory_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_memory(root, "n", "good", "good content", 1);
    let bad = write_memory(root, "n", "bad", "", 0);
    // Not valid UTF-8, so reading it as text fails.
    std::fs::write(&bad, [0xff, 0xfe, 0xfd]).unwrap();

    let loader = MemoryLoader::new(root);
    assert_eq!(loader.discover("n").await.len(), 2);
    let loaded = loader.load_relevant("n").await;
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].session_id, "good");
}

#[tokio::test]
async fn test_injection_roundtrip_through_loader() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_memory(root, "n", "s1", "first memory\n\n", 0);
    write_memory(root, "n", "s2", "second memory", 2);

    let memories = load_relevant_memories(root, "n", &LoadOptions::default()).await;
    let context = inject_memories_into_context("BASE", &memories);
    assert!(context.starts_with(CONTEXT_HEADER));
    assert!(context.contains("[Session 1]\nfirst memory\n\n\n\n---\n\n"));
    assert!(context.contains("[Session 2]\nsecond memory\n\n---\n\n"));
    assert!(context.ends_with("---\n\nBASE"));
    assert_eq!(memory_summary(&memories), "Loaded 2 past sessions for context");

    let nothing = load_relevant_memories(root, "empty", &LoadOptions::default()).await;
    assert_eq!(inject_memories_into_context("BASE", &nothing), "BASE");
}

#[tokio::test]
async fn test_relevance_uses_index_quality() {
    let dir = tempfile::tempdir().unwrap();
    let sessions = dir.path().join("sessions");
    let newer = write_memory(&sessions, "n", "thin", "thin notes", 0);
    let older = write_memory(&sessions, "n", "rich", "rich notes", 5);

    let index = Arc::new(MemoryIndex::load(dir.path().join("index.json")).await);

    let thin = MemoryRecord::new("thin", "n", "x");
    index.add_entry(&thin, &newer).await.unwrap();

    let mut rich = MemoryRecord::new("rich", "n", "implement the archive engine");
    rich.timestamp = chrono::Utc::now() - chrono::Duration::days(5);
    rich.title = Some("Archive engine".into());
    rich.current_state = Some("done".into());
    rich.task_spec = Some("score files".into());
    rich.workflow = Some("plan, build, test".into());
    rich.errors = Some("one flaky test".into());
    rich.learnings = Some("success with explicit clocks".into());
    rich.key_results = Some("candidates sorted".into());
    rich.summary = "a".repeat(120);
    rich.tags = ["archive", "rust", "tests", "scoring", "engine"]
        .into_iter()
        .map(String::from)
        .collect();
    index.add_entry(&rich, &older).await.unwrap();

    let options = LoadOptions {
        sort_by: SortBy::Relevance,
        ..LoadOptions::default()
    };
    let loader = MemoryLoader::new(&sessions)
        .with_options(options)
        .with_index(index.clone(), RankingConfig::default());
    let loaded = loader.load_relevant("n").await;
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].session_id, "rich");

    // Recency ordering ignores the index.
    let recent = loader
        .load_relevant_with("n", &LoadOptions::default())
        .await;
    assert_eq!(recent[0].session_id, "thin");

    let ids: Vec<String> = loaded.iter().map(|m| m.session_id.clone()).collect();
    assert_eq!(loader.record_consumed(&ids).await.unwrap(), 2);
    let usage = index.get_entry("rich").await.unwrap().usage.unwrap();
    assert_eq!(usage.times_used, 1);
}

#[tokio::test]
async fn test_record_consumed_without_index_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let loader = MemoryLoader::new(dir.path());
    assert_eq!(loader.record_consumed(&["s1".to_string()]).await.unwrap(), 0);
}
