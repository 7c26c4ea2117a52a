use std::sync::Arc;

use chrono::{TimeZone, Utc};
use priority_harness::heuristic::heuristic_priority;
use priority_harness::task::normalize_tasks;
use priority_harness::{
    JsonFileStore, PriorityReport, PriorityWeights, ResultMode, SnapshotStore,
};
use serde_json::json;
use tempfile::tempdir;

fn report(raw_tasks: serde_json::Value) -> PriorityReport {
    let now = Utc.with_ymd_and_hms(2026, 2, 20, 9, 0, 0).unwrap();
    PriorityReport {
        result: heuristic_priority(
            &normalize_tasks(&raw_tasks),
            &PriorityWeights::default(),
            now,
        ),
        mode: ResultMode::Mock,
        provider: "heuristic".into(),
        model: "heuristic".into(),
        fallback: true,
        fallback_reason: Some("HTTP 500".into()),
        generated_at: now,
        file_path: None,
    }
}

#[tokio::test]
async fn missing_file_reads_as_none() {
    let dir = tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("llm_priority_latest.json"));
    assert!(store.latest().await.unwrap().is_none());
}

#[tokio::test]
async fn save_creates_directories_and_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/data/llm_priority_latest.json");
    let store = JsonFileStore::new(&path);

    let saved = report(json!([{"id": "a", "dueAt": "2026-02-21", "moduleWeightPercent": 40}]));
    store.save(&saved).await.unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\n  \"ratedTasks\""), "expected pretty JSON");
    assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);

    let loaded = store.latest().await.unwrap().unwrap();
    assert_eq!(loaded, saved);
}

#[tokio::test]
async fn later_saves_overwrite_earlier_ones() {
    let dir = tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("latest.json"));

    store.save(&report(json!([{"id": "first"}]))).await.unwrap();
    store.save(&report(json!([{"id": "second"}]))).await.unwrap();

    let loaded = store.latest().await.unwrap().unwrap();
    assert_eq!(loaded.result.rated_tasks[0].id(), "second");
}

#[tokio::test]
async fn corrupt_snapshot_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("latest.json");
    std::fs::write(&path, "{ not json").unwrap();

    let store = JsonFileStore::new(&path);
    assert!(store.latest().await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_saves_leave_one_whole_snapshot() {
    let dir = tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path().join("latest.json")));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .save(&report(json!([{"id": format!("task-{i}")}])))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let loaded = store.latest().await.unwrap().unwrap();
    assert!(loaded.result.rated_tasks[0].id().starts_with("task-"));

    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names, ["latest.json"]);
}
