//! Extract phase: read raw scraper output from the input folder.
//!
//! The scraper drops one JSON file per result page; each file holds either a
//! single raw entry object or an array of them. The shape inside is not
//! trusted — coercion happens in [`crate::transform`].
use crate::model::RunStats;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use tracing::{info, instrument, warn};

/// One raw entry as produced by the scraper, tagged with its source file.
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub source_file: String,
    pub value: Value,
}

/// Read all `*.json` files under `input_folder`, sorted by file name.
/// Unreadable or unparsable files are tallied in `stats` and skipped.
#[instrument(skip(stats))]
pub async fn read_entries(input_folder: &Path, stats: &mut RunStats) -> Result<Vec<RawEntry>> {
    let mut dir = tokio::fs::read_dir(input_folder)
        .await
        .with_context(|| format!("failed to read input folder {}", input_folder.display()))?;

    let mut files = Vec::new();
    while let Some(entry) = dir.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        warn!(folder = %input_folder.display(), "no JSON files found in input folder");
        return Ok(Vec::new());
    }
    info!(count = files.len(), "found input files");

    let mut entries = Vec::new();
    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(err) => {
                warn!(file = %name, ?err, "failed to read input file");
                stats.record_error(format!("read {name}: {err}"));
                continue;
            }
        };
        let value: Value = match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(err) => {
                warn!(file = %name, ?err, "failed to parse input file");
                stats.record_error(format!("parse {name}: {err}"));
                continue;
            }
        };
        stats.files_read += 1;

        match value {
            Value::Array(items) => {
                for item in items {
                    entries.push(RawEntry {
                        source_file: name.clone(),
                        value: item,
                    });
                }
            }
            other => entries.push(RawEntry {
                source_file: name,
                value: other,
            }),
        }
    }

    stats.records_extracted = entries.len() as u32;
    info!(records = entries.len(), files = stats.files_read, "extract complete");
    Ok(entries)
}
