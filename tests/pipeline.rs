use async_trait::async_trait;
use chrono::{Local, TimeZone};
use serde_json::json;
use sinta_etl::config::Config;
use sinta_etl::etl::Etl;
use sinta_etl::model::{BackendKind, JournalRecord, OutputFormat, RemoteOutcome, RunState};
use sinta_etl::storage::{StorageBackend, StorageError};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Health,
    EnsureDir(String),
    WriteFile { remote: String },
    List(String),
}

/// In-memory storage backend that records every call, serves canned
/// per-write results, and keeps uploaded bytes for inspection.
#[derive(Clone)]
struct RecordingBackend {
    kind: BackendKind,
    healthy: bool,
    ops: Arc<Mutex<Vec<Op>>>,
    write_results: Arc<Mutex<VecDeque<Result<(), StorageError>>>>,
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl RecordingBackend {
    fn new(kind: BackendKind, healthy: bool) -> Arc<Self> {
        Arc::new(Self {
            kind,
            healthy,
            ops: Arc::new(Mutex::new(Vec::new())),
            write_results: Arc::new(Mutex::new(VecDeque::new())),
            files: Arc::new(Mutex::new(BTreeMap::new())),
        })
    }

    async fn with_write_results(
        self: Arc<Self>,
        results: Vec<Result<(), StorageError>>,
    ) -> Arc<Self> {
        *self.write_results.lock().await = VecDeque::from(results);
        self
    }

    async fn ops(&self) -> Vec<Op> {
        self.ops.lock().await.clone()
    }

    async fn uploaded(&self) -> BTreeMap<String, Vec<u8>> {
        self.files.lock().await.clone()
    }

    async fn written_remotes(&self) -> Vec<String> {
        self.ops()
            .await
            .into_iter()
            .filter_map(|op| match op {
                Op::WriteFile { remote } => Some(remote),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl StorageBackend for RecordingBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn health_check(&self) -> bool {
        self.ops.lock().await.push(Op::Health);
        self.healthy
    }

    async fn ensure_directory(&self, path: &str) -> Result<(), StorageError> {
        self.ops.lock().await.push(Op::EnsureDir(path.to_string()));
        Ok(())
    }

    async fn write_file(&self, local_path: &Path, remote_path: &str) -> Result<(), StorageError> {
        self.ops.lock().await.push(Op::WriteFile {
            remote: remote_path.to_string(),
        });
        if let Some(result) = self.write_results.lock().await.pop_front() {
            result?;
        }
        let bytes = std::fs::read(local_path)
            .map_err(|e| StorageError::OperationFailed(format!("read local: {e}")))?;
        self.files
            .lock()
            .await
            .insert(remote_path.to_string(), bytes);
        Ok(())
    }

    async fn list_files(&self, path: &str) -> Result<Vec<String>, StorageError> {
        self.ops.lock().await.push(Op::List(path.to_string()));
        Ok(self
            .files
            .lock()
            .await
            .keys()
            .filter(|k| k.starts_with(path))
            .cloned()
            .collect())
    }
}

fn write_input_entries(dir: &Path, entries: &[serde_json::Value]) {
    std::fs::write(
        dir.join("page1.json"),
        serde_json::to_string(&entries).unwrap(),
    )
    .unwrap();
}

fn test_config(input: &TempDir, output: &TempDir, hdfs_enabled: bool) -> Config {
    let mut cfg = Config::default();
    cfg.app.input_folder = input.path().to_string_lossy().to_string();
    cfg.app.output_folder = output.path().to_string_lossy().to_string();
    cfg.app.output_format = OutputFormat::Both;
    cfg.hdfs.enabled = hdfs_enabled;
    cfg
}

fn good_entry(name: &str, id: u32) -> serde_json::Value {
    json!({
        "journal_name": name,
        "profile_url": format!("https://sinta.example/journals/profile/{id}"),
        "p_issn": format!("{:08}", id),
    })
}

#[tokio::test]
async fn end_to_end_fallback_at_fixed_timestamp() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_input_entries(
        input.path(),
        &[good_entry("Jurnal A", 11), good_entry("Jurnal B", 22)],
    );

    let native = RecordingBackend::new(BackendKind::Native, false);
    let fallback = RecordingBackend::new(BackendKind::SubprocessFallback, true);
    let ts = Local.with_ymd_and_hms(2026, 1, 12, 6, 5, 9).unwrap();

    let cfg = test_config(&input, &output, true);
    let report = Etl::with_backends(cfg, Some(native.clone()), fallback.clone())
        .with_started_at(ts)
        .run()
        .await
        .unwrap();

    assert_eq!(report.final_state, RunState::Finalized);

    // Local artifacts carry the shared timestamp suffix.
    assert!(output.path().join("journals_data_20260112_060509.csv").exists());
    assert!(output.path().join("journals_data_20260112_060509.json").exists());
    assert!(output
        .path()
        .join("extraction_stats_20260112_060509.json")
        .exists());

    // Native saw its health probe and nothing else.
    assert_eq!(native.ops().await, vec![Op::Health]);

    // Everything went through the fallback, under the date partition.
    let ops = fallback.ops().await;
    assert!(ops.contains(&Op::EnsureDir("/user/sinta/journals/2026/01/12".into())));
    let remotes = fallback.written_remotes().await;
    assert!(remotes
        .contains(&"/user/sinta/journals/2026/01/12/journals_data_20260112_060509.csv".to_string()));
    assert!(remotes.contains(
        &"/user/sinta/journals/2026/01/12/journals_data_20260112_060509.json".to_string()
    ));
    assert!(remotes.contains(
        &"/user/sinta/journals/2026/01/12/extraction_stats_20260112_060509.json".to_string()
    ));

    // Stats artifact names the backend that served the run.
    let stats: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(output.path().join("extraction_stats_20260112_060509.json"))
            .unwrap(),
    )
    .unwrap();
    assert_eq!(stats["statistics"]["backend"], "subprocess-fallback");
    assert_eq!(stats["statistics"]["remote"], "written");
    assert_eq!(report.run.stats.remote, Some(RemoteOutcome::Written));
}

#[tokio::test]
async fn partial_transformation_failure_counts_and_row_counts() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    let mut entries: Vec<serde_json::Value> = (0..8)
        .map(|i| good_entry(&format!("Jurnal {i}"), 100 + i))
        .collect();
    entries.push(json!("not an object"));
    entries.push(json!({"impact_score": "1.0"}));
    write_input_entries(input.path(), &entries);

    let cfg = test_config(&input, &output, false);
    let fallback = RecordingBackend::new(BackendKind::SubprocessFallback, true);
    let report = Etl::with_backends(cfg, None, fallback.clone())
        .run()
        .await
        .unwrap();

    let stats = &report.run.stats;
    assert_eq!(stats.records_extracted, 10);
    assert_eq!(stats.transformation_errors, 2);
    assert_eq!(stats.records_transformed, 8);
    assert_eq!(stats.remote, Some(RemoteOutcome::Disabled));

    // Remote disabled: the fallback was never touched.
    assert!(fallback.ops().await.is_empty());

    let suffix = report.run.timestamp_suffix();
    let csv_content =
        std::fs::read_to_string(output.path().join(format!("journals_data_{suffix}.csv"))).unwrap();
    assert_eq!(csv_content.lines().count(), 9); // header + 8 rows

    let json_content =
        std::fs::read_to_string(output.path().join(format!("journals_data_{suffix}.json")))
            .unwrap();
    let records: Vec<JournalRecord> = serde_json::from_str(&json_content).unwrap();
    assert_eq!(records.len(), 8);
    assert_eq!(records, report.run.records);
}

#[tokio::test]
async fn both_backends_down_degrades_to_local_only() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_input_entries(input.path(), &[good_entry("Jurnal Solo", 7)]);

    let native = RecordingBackend::new(BackendKind::Native, false);
    let fallback = RecordingBackend::new(BackendKind::SubprocessFallback, false);

    let cfg = test_config(&input, &output, true);
    let report = Etl::with_backends(cfg, Some(native), fallback)
        .run()
        .await
        .unwrap();

    // Not a hard failure: the run finalizes and local artifacts exist.
    assert_eq!(report.final_state, RunState::Finalized);
    let suffix = report.run.timestamp_suffix();
    assert!(output.path().join(format!("journals_data_{suffix}.csv")).exists());
    assert!(output.path().join(format!("journals_data_{suffix}.json")).exists());

    assert_eq!(report.run.stats.backend, Some(BackendKind::None));
    assert_eq!(report.run.stats.remote, Some(RemoteOutcome::Skipped));
}

#[tokio::test]
async fn operation_failure_reports_without_fallback() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_input_entries(input.path(), &[good_entry("Jurnal Op", 31)]);

    let native = RecordingBackend::new(BackendKind::Native, true)
        .with_write_results(vec![Err(StorageError::OperationFailed(
            "disk quota exceeded".into(),
        ))])
        .await;
    let fallback = RecordingBackend::new(BackendKind::SubprocessFallback, true);

    let cfg = test_config(&input, &output, true);
    let report = Etl::with_backends(cfg, Some(native.clone()), fallback.clone())
        .run()
        .await
        .unwrap();

    // A per-operation failure never re-negotiates the backend.
    assert!(fallback.ops().await.is_empty());
    assert_eq!(report.run.stats.backend, Some(BackendKind::Native));
    assert_eq!(report.run.stats.remote, Some(RemoteOutcome::Partial));
    assert_eq!(report.run.stats.remote_write_errors, 1);
    assert!(report
        .run
        .stats
        .errors
        .iter()
        .any(|e| e.contains("disk quota exceeded")));

    // The second data artifact and the stats artifact still landed.
    assert_eq!(native.uploaded().await.len(), 2);
}

#[tokio::test]
async fn mid_run_unavailability_falls_back_exactly_once() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_input_entries(input.path(), &[good_entry("Jurnal Mid", 41)]);

    // Native passes its health check, then dies on the first upload.
    let native = RecordingBackend::new(BackendKind::Native, true)
        .with_write_results(vec![Err(StorageError::Unavailable(
            "connection refused".into(),
        ))])
        .await;
    let fallback = RecordingBackend::new(BackendKind::SubprocessFallback, true);

    let cfg = test_config(&input, &output, true);
    let report = Etl::with_backends(cfg, Some(native.clone()), fallback.clone())
        .run()
        .await
        .unwrap();

    let suffix = report.run.timestamp_suffix();
    let expected_csv =
        format!("/user/sinta/journals/{}/journals_data_{suffix}.csv",
            report.run.started_at.format("%Y/%m/%d"));

    // The failed artifact was retried on the fallback; later writes (JSON,
    // stats) went straight there.
    let remotes = fallback.written_remotes().await;
    assert!(remotes.contains(&expected_csv));
    assert_eq!(remotes.len(), 3);
    assert_eq!(fallback.uploaded().await.len(), 3);

    // Native was never asked again after the unavailability signal.
    assert_eq!(native.written_remotes().await.len(), 1);
    assert_eq!(report.run.stats.backend, Some(BackendKind::SubprocessFallback));
    assert_eq!(report.run.stats.remote, Some(RemoteOutcome::Written));
}
