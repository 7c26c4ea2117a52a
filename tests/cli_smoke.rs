use std::path::Path;
use std::process::{Command, Output};

use serde_json::{json, Value};
use tempfile::tempdir;

/// Runs the binary inside `dir` with the environment it reads cleared, so a
/// developer's `.env` or shell exports cannot leak in.
fn run_cli(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_priority"))
        .args(args)
        .current_dir(dir)
        .env_remove("PRIORITY_API_BASE_URL")
        .env_remove("PRIORITY_DATA_DIR")
        .env_remove("GEMINI_API_KEY")
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

fn write_tasks(dir: &Path) -> String {
    let path = dir.join("tasks.json");
    let tasks = json!([
        {"id": "reading", "title": "Reading", "moduleWeightPercent": 2, "estimatedHours": 1},
        {"id": "thesis", "title": "Thesis draft", "dueAt": "2020-01-01", "moduleWeightPercent": 60, "estimatedHours": 20},
        {"id": "quiz", "title": "Quiz", "moduleWeightPercent": 10}
    ]);
    std::fs::write(&path, tasks.to_string()).unwrap();
    path.to_string_lossy().into_owned()
}

fn stdout_json(out: &Output) -> Value {
    serde_json::from_slice(&out.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}): {}",
            String::from_utf8_lossy(&out.stdout)
        )
    })
}

#[test]
fn score_prints_sorted_banded_tasks() {
    let dir = tempdir().unwrap();
    let tasks = write_tasks(dir.path());

    let out = run_cli(dir.path(), &["score", "--tasks", &tasks]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let result = stdout_json(&out);
    assert_eq!(result["summary"], "Heuristic fallback mode used");
    let rated = result["ratedTasks"].as_array().unwrap();
    assert_eq!(rated.len(), 3);
    assert_eq!(rated[0]["id"], "thesis");

    let scores: Vec<u64> = rated
        .iter()
        .map(|t| t["priorityScore"].as_u64().unwrap())
        .collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]), "{scores:?}");
    for task in rated {
        let band = task["priorityBand"].as_str().unwrap();
        assert!(["critical", "high", "medium", "low"].contains(&band), "{band}");
    }
}

#[test]
fn latest_without_snapshot_fails() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir(&data).unwrap();

    let out = run_cli(dir.path(), &["latest", "--data-dir", &data.to_string_lossy()]);
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("No priority snapshot found"), "{stderr}");
}

#[test]
fn rank_without_backend_falls_back_to_heuristic() {
    let dir = tempdir().unwrap();
    let tasks = write_tasks(dir.path());

    let out = run_cli(dir.path(), &["rank", "--tasks", &tasks]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let report = stdout_json(&out);
    assert_eq!(report["mode"], "mock");
    assert_eq!(report["fallback"], true);
    assert_eq!(report["fallbackReason"], "No API base URL configured");
    assert_eq!(report["ratedTasks"][0]["id"], "thesis");

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("[rank] fallback: No API base URL configured"),
        "{stderr}"
    );
}

#[test]
fn rank_out_file_is_readable_by_latest() {
    let dir = tempdir().unwrap();
    let tasks = write_tasks(dir.path());
    let data = dir.path().join("data");
    std::fs::create_dir(&data).unwrap();
    let snapshot = data.join("llm_priority_latest.json");

    let out = run_cli(
        dir.path(),
        &["rank", "--tasks", &tasks, "--out", &snapshot.to_string_lossy()],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(out.stdout.is_empty());

    let out = run_cli(dir.path(), &["latest", "--data-dir", &data.to_string_lossy()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let report = stdout_json(&out);
    assert_eq!(report["mode"], "mock");
    assert_eq!(report["ratedTasks"].as_array().unwrap().len(), 3);
}
