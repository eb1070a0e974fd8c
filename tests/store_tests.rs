use std::{collections::HashSet, fs, thread};

use perfsnap::{
    BenchmarkResult, Environment, FixedProbe, PerfSnapError, SnapshotMetadata, SnapshotStore,
    StoreConfig,
};
use serde_json::json;
use tempfile::TempDir;


use snapshot_common::{snapshot_on, with_captured_logs};

fn store_in(dir: &TempDir) -> SnapshotStore {
    SnapshotStore::with_probe(
        StoreConfig::new(dir.path()),
        FixedProbe(Environment::new("linux/aarch64", "rust-1.85", 16)),
    )
}

fn detailed(name: &str, ops: f64) -> BenchmarkResult {
    let mut result = BenchmarkResult::new(name, ops).with_memory(1_024, 9_000);
    result.allocs_per_op = 3;
    result.alloc_bytes_per_op = 96;
    result.operations = 10_000;
    result.duration = std::time::Duration::from_nanos(1_234_567_891);
    result
}

#[test]
fn test_create_and_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let meta = SnapshotMetadata::new()
        .version("0.4.0")
        .git("8f3c2d1", "main")
        .insert("runner", json!({"pool": "ci", "slot": 3}));
    let created = store
        .create(vec![detailed("encode", 1234.5678), detailed("decode", 0.1 + 0.2)], meta)
        .unwrap();

    let loaded = store.load(&created.id).unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded.environment.cpu_count, 16);
    assert_eq!(loaded.git_branch.as_deref(), Some("main"));
    assert!(dir.path().join(format!("{}.json", created.id)).exists());
}

#[test]
fn test_persisted_document_layout() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let created = store
        .create(vec![detailed("encode", 10.0)], SnapshotMetadata::new())
        .unwrap();
    let raw = fs::read(dir.path().join(format!("{}.json", created.id))).unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(doc["id"], created.id.as_str());
    assert_eq!(doc["environment"]["runtimeVersion"], "rust-1.85");
    assert_eq!(doc["benchmarks"][0]["opsPerSec"], 10.0);
    assert_eq!(doc["benchmarks"][0]["memoryAfter"], 9_000);
    assert_eq!(doc["benchmarks"][0]["duration"], 1_234_567_891u64);
    assert!(doc["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[test]
fn test_load_missing_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let err = store.load("snapshot-missing").unwrap_err();
    assert!(err.is_not_found());
    let err = store.load("../outside").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_load_corrupt_is_parse_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("broken.json"), b"{ not json").unwrap();
    let err = store_in(&dir).load("broken").unwrap_err();
    assert!(matches!(err, PerfSnapError::ParseError(_)));
}

#[test]
fn test_load_duplicate_names_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let mut snapshot = snapshot_on("dupes", 0, &[("a", 1.0)]);
    snapshot.benchmarks.push(BenchmarkResult::new("a", 2.0));
    fs::write(
        dir.path().join("dupes.json"),
        serde_json::to_vec(&snapshot).unwrap(),
    )
    .unwrap();
    let err = store_in(&dir).load("dupes").unwrap_err();
    assert!(matches!(err, PerfSnapError::ParseError(_)));
}

#[test]
fn test_list_orders_newest_first() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    for (id, day) in [("snap-b", 2), ("snap-a", 0), ("snap-c", 5)] {
        store.save(&snapshot_on(id, day, &[("x", 1.0)])).unwrap();
    }
    let ids: Vec<String> = store.list().unwrap().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec!["snap-c", "snap-b", "snap-a"]);
    assert_eq!(store.latest().unwrap().id, "snap-c");
}

#[test]
fn test_list_skips_corrupt_record_with_warning() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.save(&snapshot_on("valid", 0, &[("x", 1.0)])).unwrap();
    fs::write(dir.path().join("corrupt.json"), b"{\"id\": \"corrupt\",").unwrap();
    fs::write(dir.path().join("README.txt"), b"not a snapshot").unwrap();

    let (listing, logs) = with_captured_logs(|| store.list_with_report().unwrap());
    assert_eq!(listing.snapshots.len(), 1);
    assert_eq!(listing.snapshots[0].id, "valid");
    assert_eq!(listing.skipped.len(), 1);
    assert!(listing.skipped[0].path.ends_with("corrupt.json"));
    assert!(matches!(listing.skipped[0].reason, PerfSnapError::ParseError(_)));
    assert!(logs.contains("WARN"));
    assert!(logs.contains("skipping snapshot record"));
    assert!(logs.contains("corrupt.json"));
}

#[test]
fn test_list_missing_directory_is_empty() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::open(dir.path().join("never-created"));
    assert!(store.list().unwrap().is_empty());
    assert!(store.latest().unwrap_err().is_not_found());
}

#[test]
fn test_save_refuses_existing_id() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let first = snapshot_on("fixed-id", 0, &[("x", 1.0)]);
    store.save(&first).unwrap();
    let second = snapshot_on("fixed-id", 1, &[("x", 2.0)]);
    let err = store.save(&second).unwrap_err();
    assert!(matches!(err, PerfSnapError::AlreadyExists(_)));
    assert_eq!(store.load("fixed-id").unwrap(), first);
}

#[test]
fn test_create_rejects_duplicate_and_invalid_benchmarks() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let dupes = vec![BenchmarkResult::new("a", 1.0), BenchmarkResult::new("a", 2.0)];
    assert!(matches!(
        store.create(dupes, SnapshotMetadata::new()),
        Err(PerfSnapError::InvalidInput(_))
    ));
    let negative = vec![BenchmarkResult::new("a", -3.0)];
    assert!(store.create(negative, SnapshotMetadata::new()).is_err());
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn test_concurrent_creates_get_unique_ids() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let ids: Vec<String> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = &store;
                scope.spawn(move || {
                    store
                        .create(
                            vec![BenchmarkResult::new(format!("bench_{i}"), 10.0)],
                            SnapshotMetadata::new(),
                        )
                        .unwrap()
                        .id
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), 8);
    assert_eq!(store.list().unwrap().len(), 8);
}

#[test]
fn test_history_window_is_ascending_and_bounded() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    for (id, day) in [("d0", 0), ("d10", 10), ("d35", 35), ("d40", 40), ("d41", 41)] {
        store.save(&snapshot_on(id, day, &[("x", 1.0)])).unwrap();
    }
    let until = snapshot_common::base_time() + chrono::Duration::days(40);
    let ids: Vec<String> = store
        .history(until, 30)
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec!["d35", "d40"]);
}

#[test]
fn test_history_with_unbounded_window() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    for (id, day) in [("d0", 0), ("d40", 40), ("d41", 41)] {
        store.save(&snapshot_on(id, day, &[("x", 1.0)])).unwrap();
    }
    let until = snapshot_common::base_time() + chrono::Duration::days(40);
    let ids: Vec<String> = store
        .history(until, u32::MAX)
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec!["d0", "d40"]);
}
