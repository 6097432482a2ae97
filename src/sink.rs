//! Local sink: CSV/JSON data artifacts plus the extraction-statistics
//! document.
//!
//! Every artifact is written to a uuid-suffixed temporary sibling and
//! atomically renamed into place, so concurrent readers never observe a
//! partial file. A failed artifact is reported without aborting the others;
//! local files are the run's durability baseline.
use crate::model::{ExtractionRun, JournalRecord, OutputFormat, RunStats};
use anyhow::{Context, Result};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub fn csv_file_name(suffix: &str) -> String {
    format!("journals_data_{suffix}.csv")
}

pub fn json_file_name(suffix: &str) -> String {
    format!("journals_data_{suffix}.json")
}

pub fn stats_file_name(suffix: &str) -> String {
    format!("extraction_stats_{suffix}.json")
}

/// Write the CSV/JSON data artifacts implied by `format`. Returns the paths
/// that were actually written; failures are tallied in `stats`.
#[instrument(skip(records, stats))]
pub async fn write_data_artifacts(
    records: &[JournalRecord],
    out_dir: &Path,
    suffix: &str,
    format: OutputFormat,
    stats: &mut RunStats,
) -> Vec<PathBuf> {
    if let Err(err) = tokio::fs::create_dir_all(out_dir).await {
        warn!(?err, dir = %out_dir.display(), "failed to create output folder");
        stats.local_write_errors += 1;
        stats.record_error(format!("create output folder: {err}"));
        return Vec::new();
    }

    let mut planned: Vec<(PathBuf, Vec<u8>)> = Vec::new();

    if format.wants_csv() {
        let path = out_dir.join(csv_file_name(suffix));
        match serialize_csv(records) {
            Ok(bytes) => planned.push((path, bytes)),
            Err(err) => report_local_failure(stats, &path, err),
        }
    }

    if format.wants_json() {
        let path = out_dir.join(json_file_name(suffix));
        match serde_json::to_vec_pretty(records).context("serialize records to JSON") {
            Ok(bytes) => planned.push((path, bytes)),
            Err(err) => report_local_failure(stats, &path, err),
        }
    }

    // Each artifact stages to its own temporary name, so the writes are safe
    // to run concurrently.
    let results = futures::future::join_all(
        planned
            .iter()
            .map(|(path, bytes)| write_atomic(path, bytes)),
    )
    .await;

    let mut written = Vec::new();
    for ((path, _), result) in planned.iter().zip(results) {
        match result {
            Ok(()) => {
                info!(file = %path.display(), rows = records.len(), "wrote local artifact");
                written.push(path.clone());
            }
            Err(err) => report_local_failure(stats, path, err),
        }
    }
    written
}

/// Write the finalized statistics artifact. Always attempted, last.
#[instrument(skip(run))]
pub async fn write_stats_artifact(run: &ExtractionRun, out_dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("failed to create output folder {}", out_dir.display()))?;

    let path = out_dir.join(stats_file_name(&run.timestamp_suffix()));
    let doc = json!({
        "extraction_date": run.started_at.to_rfc3339(),
        "statistics": run.stats,
    });
    let bytes = serde_json::to_vec_pretty(&doc).context("serialize run statistics")?;
    write_atomic(&path, &bytes).await?;
    info!(file = %path.display(), "wrote statistics artifact");
    Ok(path)
}

fn serialize_csv(records: &[JournalRecord]) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for record in records {
        wtr.serialize(record).context("serialize record to CSV")?;
    }
    // serde only emits the header once a row is written; keep the header for
    // empty runs too.
    if records.is_empty() {
        wtr.write_record(crate::model::CSV_COLUMNS)
            .context("write CSV header")?;
    }
    wtr.flush().context("flush CSV writer")?;
    wtr.into_inner()
        .map_err(|e| anyhow::anyhow!("finalize CSV writer: {e}"))
}

/// Stage to a temporary sibling, then rename. Rename within one directory is
/// atomic on the filesystems we target.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().context("artifact path has no parent")?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("artifact path has no file name")?;
    let tmp = dir.join(format!(".{name}.{}.tmp", Uuid::new_v4()));

    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("write staging file {}", tmp.display()))?;
    if let Err(err) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(err).with_context(|| format!("publish artifact {}", path.display()));
    }
    Ok(())
}

fn report_local_failure(stats: &mut RunStats, path: &Path, err: anyhow::Error) {
    warn!(?err, file = %path.display(), "failed to write local artifact");
    stats.local_write_errors += 1;
    stats.record_error(format!("local write {}: {err:#}", path.display()));
}
