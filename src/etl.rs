//! ETL orchestration: extract → transform → local write → remote write →
//! stats.
//!
//! The run walks `Init → Extracted → Transformed → LocallyWritten →
//! RemoteResolved → RemoteWritten | RemoteSkipped → Finalized`. Local
//! artifacts are the durability baseline; nothing in the remote phase can
//! abort local production. The remote destination is computed exactly once
//! from the run's fixed timestamp.
use crate::config::Config;
use crate::model::{ExtractionRun, RemoteOutcome, RunState};
use crate::storage::{
    BackendSelector, HdfsCliBackend, StorageBackend, StorageError, StorageTarget, WebHdfsBackend,
};
use crate::{extract, sink, transform};
use anyhow::Result;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Outcome of one ETL run.
#[derive(Debug)]
pub struct RunReport {
    pub run: ExtractionRun,
    pub final_state: RunState,
    pub local_artifacts: Vec<PathBuf>,
    pub stats_path: Option<PathBuf>,
}

pub struct Etl {
    cfg: Config,
    selector: BackendSelector,
    started_at: DateTime<Local>,
}

impl Etl {
    /// Wire the real backends from configuration. A native client that fails
    /// to initialize (bad URL) is treated as absent; the health check path
    /// then lands on the subprocess fallback.
    pub fn new(cfg: Config) -> Self {
        let native: Option<Arc<dyn StorageBackend>> =
            match WebHdfsBackend::new(&cfg.hdfs.url, cfg.hdfs.user.clone()) {
                Ok(backend) => Some(Arc::new(backend)),
                Err(err) => {
                    warn!(?err, "native WebHDFS client failed to initialize");
                    None
                }
            };
        let fallback: Arc<dyn StorageBackend> = Arc::new(HdfsCliBackend::new(
            cfg.hdfs.cli_bin.clone(),
            Duration::from_secs(cfg.hdfs.op_timeout_secs),
        ));
        Self::with_backends(cfg, native, fallback)
    }

    /// Inject backends directly; used by tests and embedders.
    pub fn with_backends(
        cfg: Config,
        native: Option<Arc<dyn StorageBackend>>,
        fallback: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            cfg,
            selector: BackendSelector::new(native, fallback),
            started_at: Local::now(),
        }
    }

    /// Pin the run timestamp (and thus artifact names and the partition
    /// path). Defaults to the construction instant.
    pub fn with_started_at(mut self, started_at: DateTime<Local>) -> Self {
        self.started_at = started_at;
        self
    }

    /// Drive the whole run. Consumes the orchestrator: backend selection is
    /// run-scoped and never shared across runs.
    #[instrument(skip(self), fields(started_at = %self.started_at))]
    pub async fn run(self) -> Result<RunReport> {
        let mut state = RunState::Init;
        let mut run = ExtractionRun::new(self.started_at);
        let out_dir = PathBuf::from(&self.cfg.app.output_folder);
        let format = self.cfg.app.output_format;

        info!(
            input = %self.cfg.app.input_folder,
            output = %out_dir.display(),
            %format,
            hdfs = self.cfg.hdfs.enabled,
            "starting ETL run"
        );

        let entries =
            extract::read_entries(Path::new(&self.cfg.app.input_folder), &mut run.stats).await?;
        advance(&mut state, RunState::Extracted);

        run.records = transform::transform_entries(&entries, run.started_at, &mut run.stats);
        advance(&mut state, RunState::Transformed);

        let suffix = run.timestamp_suffix();
        let local_artifacts =
            sink::write_data_artifacts(&run.records, &out_dir, &suffix, format, &mut run.stats)
                .await;
        advance(&mut state, RunState::LocallyWritten);

        let mut remote = RemoteOutcome::Disabled;
        let mut remote_stats_dest = None;
        if self.cfg.hdfs.enabled {
            let target = StorageTarget::resolve(&self.cfg.hdfs.base_path, run.started_at);
            advance(&mut state, RunState::RemoteResolved);

            let (outcome, stats_dest) = self
                .remote_phase(&target, &local_artifacts, &mut run.stats)
                .await;
            remote = outcome;
            remote_stats_dest = stats_dest;
            match remote {
                RemoteOutcome::Written | RemoteOutcome::Partial => {
                    advance(&mut state, RunState::RemoteWritten)
                }
                _ => advance(&mut state, RunState::RemoteSkipped),
            }
        }

        // Finalize: duration, backend, remote outcome; then the stats
        // artifact, locally first, remotely best-effort.
        run.stats.backend = Some(self.selector.selected_kind().await);
        run.stats.remote = Some(remote);
        run.stats.duration_secs = (Local::now() - run.started_at).num_milliseconds() as f64 / 1000.0;

        let stats_path = match sink::write_stats_artifact(&run, &out_dir).await {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(?err, "failed to write statistics artifact");
                run.stats.local_write_errors += 1;
                None
            }
        };

        if let (Some(local_stats), Some(remote_dest)) = (&stats_path, &remote_stats_dest) {
            if let Some(backend) = self.selector.select().await {
                if let Err(err) = backend.write_file(local_stats, remote_dest).await {
                    warn!(%err, "failed to persist statistics artifact remotely");
                }
            }
        }

        advance(&mut state, RunState::Finalized);
        info!(
            records = run.stats.records_transformed,
            transform_errors = run.stats.transformation_errors,
            backend = run.stats.backend.map(|b| b.as_str()).unwrap_or("none"),
            duration_secs = run.stats.duration_secs,
            "ETL run finalized"
        );

        Ok(RunReport {
            run,
            final_state: state,
            local_artifacts,
            stats_path,
        })
    }

    /// Upload the local artifacts under the date partition. Returns the
    /// remote outcome and, when a backend is active, the remote destination
    /// for the stats artifact.
    async fn remote_phase(
        &self,
        target: &StorageTarget,
        local_artifacts: &[PathBuf],
        stats: &mut crate::model::RunStats,
    ) -> (RemoteOutcome, Option<String>) {
        let mut backend = match self.selector.select().await {
            Some(b) => b,
            None => {
                stats.record_error("remote: no storage backend available".to_string());
                return (RemoteOutcome::Skipped, None);
            }
        };

        let dir = target.directory();
        if !self.ensured_directory(&mut backend, &dir, stats).await {
            return (RemoteOutcome::Skipped, None);
        }

        let mut uploaded = 0usize;
        for artifact in local_artifacts {
            let name = artifact
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let dest = target.file_path(&name);

            match backend.write_file(artifact, &dest).await {
                Ok(()) => {
                    info!(backend = backend.kind().as_str(), %dest, "uploaded artifact");
                    uploaded += 1;
                }
                Err(StorageError::OperationFailed(msg)) => {
                    warn!(%dest, %msg, "remote write failed, artifact stays local-only");
                    stats.remote_write_errors += 1;
                    stats.record_error(format!(
                        "remote write {dest} via {}: {msg}",
                        backend.kind().as_str()
                    ));
                }
                Err(StorageError::Unavailable(msg)) => {
                    stats.record_error(format!(
                        "backend {} became unavailable: {msg}",
                        backend.kind().as_str()
                    ));
                    backend = match self.selector.mark_unavailable().await {
                        Some(next) => next,
                        None => {
                            stats.remote_write_errors += 1;
                            break;
                        }
                    };
                    if !self.ensured_directory(&mut backend, &dir, stats).await {
                        break;
                    }
                    match backend.write_file(artifact, &dest).await {
                        Ok(()) => {
                            info!(backend = backend.kind().as_str(), %dest, "uploaded artifact");
                            uploaded += 1;
                        }
                        Err(err) => {
                            warn!(%dest, %err, "retry after fallback failed");
                            stats.remote_write_errors += 1;
                            stats.record_error(format!("remote write {dest}: {err}"));
                        }
                    }
                }
            }
        }

        let stats_dest = target.file_path(&sink::stats_file_name(
            &self.started_at.format("%Y%m%d_%H%M%S").to_string(),
        ));
        let outcome = if uploaded == 0 {
            RemoteOutcome::Skipped
        } else if uploaded == local_artifacts.len() {
            RemoteOutcome::Written
        } else {
            RemoteOutcome::Partial
        };
        (outcome, Some(stats_dest))
    }

    /// `ensure_directory` with the single permitted fallback on
    /// `Unavailable`. Returns false when the remote phase cannot proceed.
    async fn ensured_directory(
        &self,
        backend: &mut Arc<dyn StorageBackend>,
        dir: &str,
        stats: &mut crate::model::RunStats,
    ) -> bool {
        match backend.ensure_directory(dir).await {
            Ok(()) => true,
            Err(StorageError::OperationFailed(msg)) => {
                warn!(%dir, %msg, "failed to create remote partition directory");
                stats.remote_write_errors += 1;
                stats.record_error(format!("remote mkdir {dir}: {msg}"));
                false
            }
            Err(StorageError::Unavailable(msg)) => {
                stats.record_error(format!(
                    "backend {} became unavailable: {msg}",
                    backend.kind().as_str()
                ));
                match self.selector.mark_unavailable().await {
                    Some(next) => {
                        *backend = next;
                        match backend.ensure_directory(dir).await {
                            Ok(()) => true,
                            Err(err) => {
                                warn!(%dir, %err, "fallback mkdir failed");
                                stats.remote_write_errors += 1;
                                stats.record_error(format!("remote mkdir {dir}: {err}"));
                                false
                            }
                        }
                    }
                    None => {
                        stats.remote_write_errors += 1;
                        false
                    }
                }
            }
        }
    }
}

fn advance(state: &mut RunState, next: RunState) {
    info!(from = state.as_str(), to = next.as_str(), "run state transition");
    *state = next;
}

/// Convenience for embedders: run with defaults derived from `cfg` only.
pub async fn run_with_config(cfg: Config) -> Result<RunReport> {
    Etl::new(cfg).run().await
}
