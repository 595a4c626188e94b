//! Daily Log Integration Tests
//!
//! File layout of the per-day log and append behavior across re-runs.

use async_trait::async_trait;
use dailybatch::adapters::{Worker, WorkerError, WorkerOutput};
use dailybatch::core::{BatchRunner, DailyLog};
use dailybatch::domain::{Catalog, ProcessType, RunContext, RunResult, TargetDate};
use tempfile::TempDir;

/// Fails the named process type, succeeds everything else
struct FailOn(Option<&'static str>);

#[async_trait]
impl Worker for FailOn {
    fn name(&self) -> &str {
        "fail-on"
    }

    async fn invoke(
        &self,
        target_date: &TargetDate,
        process_type: &ProcessType,
    ) -> Result<WorkerOutput, WorkerError> {
        let output = format!("worker {} {}\n", target_date, process_type);
        if self.0 == Some(process_type.as_str()) {
            Ok(WorkerOutput::exited(1, output))
        } else {
            Ok(WorkerOutput::exited(0, output))
        }
    }
}

fn context(names: &[&str]) -> RunContext {
    RunContext::new(
        "20241105".parse().unwrap(),
        Catalog::from_names(names).unwrap(),
    )
}

/// Strip the `[YYYY-MM-DD HH:MM:SS] ` prefix from runner lines
fn strip_timestamp(line: &str) -> &str {
    match line.strip_prefix('[').and_then(|rest| rest.split_once("] ")) {
        Some((stamp, text)) if stamp.len() == 19 => text,
        _ => line,
    }
}

async fn run_to_file(dir: &TempDir, worker: FailOn, names: &[&str]) -> RunResult {
    let ctx = context(names);
    let log = DailyLog::open(dir.path(), &ctx.target_date).await.unwrap();
    let mut runner = BatchRunner::new(worker, log);
    runner.run(&ctx).await.unwrap()
}

#[tokio::test]
async fn test_log_file_narrative() {
    let dir = TempDir::new().unwrap();

    let result = run_to_file(&dir, FailOn(None), &["A", "B"]).await;
    assert!(result.is_success());

    let content = std::fs::read_to_string(dir.path().join("batch_20241105.log")).unwrap();
    let lines: Vec<&str> = content.lines().map(strip_timestamp).collect();

    assert_eq!(
        lines,
        vec![
            "Starting A",
            "worker 20241105 A",
            "Completed A",
            "",
            "Starting B",
            "worker 20241105 B",
            "Completed B",
            "",
            "All processes completed",
        ]
    );
}

#[tokio::test]
async fn test_runner_lines_are_timestamped() {
    let dir = TempDir::new().unwrap();
    run_to_file(&dir, FailOn(None), &["A"]).await;

    let content = std::fs::read_to_string(dir.path().join("batch_20241105.log")).unwrap();
    let first = content.lines().next().unwrap();

    let stamp = &first[1..20];
    assert!(first.starts_with('['));
    assert_eq!(&first[20..22], "] ");
    assert!(chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S").is_ok());
}

#[tokio::test]
async fn test_failure_stops_log() {
    let dir = TempDir::new().unwrap();

    let result = run_to_file(&dir, FailOn(Some("B")), &["A", "B", "C"]).await;
    assert_eq!(result.process_exit_code(), 1);

    let content = std::fs::read_to_string(dir.path().join("batch_20241105.log")).unwrap();
    let lines: Vec<&str> = content.lines().map(strip_timestamp).collect();

    assert_eq!(lines.len(), 6);
    assert_eq!(lines[4], "worker 20241105 B");
    assert_eq!(lines[5], "ERROR: Process failed for B");
    assert!(!content.contains("Starting C"));
    assert!(!content.contains("All processes completed"));
}

#[tokio::test]
async fn test_rerun_appends_to_same_file() {
    let dir = TempDir::new().unwrap();

    run_to_file(&dir, FailOn(Some("B")), &["A", "B"]).await;
    let first = std::fs::read_to_string(dir.path().join("batch_20241105.log")).unwrap();

    run_to_file(&dir, FailOn(None), &["B"]).await;
    let second = std::fs::read_to_string(dir.path().join("batch_20241105.log")).unwrap();

    // Earlier narrative is preserved and the re-run follows it
    assert!(second.starts_with(&first));
    assert!(second[first.len()..].contains("Completed B"));

    let log_files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".log"))
        .collect();
    assert_eq!(log_files.len(), 1);
}
