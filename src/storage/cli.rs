//! Subprocess fallback backend: shells out to the `hdfs dfs` client per
//! operation.
//!
//! Strictly slower than the native binding (one process spawn per call) but
//! has no dependency beyond the Hadoop CLI being on PATH. Exit code zero is
//! success; non-zero is an operation failure carrying the captured stderr; a
//! launch failure (binary not found) marks the backend unavailable.
use crate::model::BackendKind;
use crate::storage::{StorageBackend, StorageError};
use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

pub struct HdfsCliBackend {
    bin: String,
    op_timeout: Duration,
}

impl HdfsCliBackend {
    pub fn new(bin: impl Into<String>, op_timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            op_timeout,
        }
    }

    /// Run `{bin} dfs <args>` bounded by the configured timeout.
    async fn run_dfs(&self, args: &[&str], what: &str) -> Result<Output, StorageError> {
        debug!(bin = %self.bin, ?args, "spawning hdfs cli");
        let fut = Command::new(&self.bin)
            .arg("dfs")
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::Unavailable(format!(
                    "hdfs binary {:?} not found: {err}",
                    self.bin
                )));
            }
            Ok(Err(err)) => {
                return Err(StorageError::OperationFailed(format!(
                    "{what}: failed to spawn {:?}: {err}",
                    self.bin
                )));
            }
            Err(_) => {
                return Err(StorageError::OperationFailed(format!(
                    "{what}: timed out after {:?}",
                    self.op_timeout
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StorageError::OperationFailed(format!(
                "{what}: exit status {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(output)
    }
}

#[async_trait]
impl StorageBackend for HdfsCliBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::SubprocessFallback
    }

    async fn health_check(&self) -> bool {
        let fut = Command::new(&self.bin)
            .arg("version")
            .kill_on_drop(true)
            .output();
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(output)) => output.status.success(),
            Ok(Err(err)) => {
                debug!(?err, bin = %self.bin, "hdfs cli health check failed");
                false
            }
            Err(_) => false,
        }
    }

    async fn ensure_directory(&self, path: &str) -> Result<(), StorageError> {
        // -p makes this idempotent and concurrency-safe.
        self.run_dfs(&["-mkdir", "-p", path], "mkdir").await?;
        Ok(())
    }

    async fn write_file(&self, local_path: &Path, remote_path: &str) -> Result<(), StorageError> {
        let local = local_path
            .to_str()
            .ok_or_else(|| StorageError::OperationFailed("local path is not valid UTF-8".into()))?;

        // Stage under a unique name, publish with a move. A cancelled or
        // failed upload never leaves a partial file at the final path.
        let stage = format!("{remote_path}._stage_{}", Uuid::new_v4());
        self.run_dfs(&["-put", "-f", local, &stage], "put").await?;

        // Overwrite policy: clear any previous artifact of the same name.
        // -f keeps the call quiet when there is nothing to remove.
        let _ = self.run_dfs(&["-rm", "-f", remote_path], "rm").await;

        if let Err(err) = self.run_dfs(&["-mv", &stage, remote_path], "mv").await {
            let _ = self.run_dfs(&["-rm", "-f", &stage], "rm").await;
            return Err(err);
        }
        Ok(())
    }

    async fn list_files(&self, path: &str) -> Result<Vec<String>, StorageError> {
        let output = self.run_dfs(&["-ls", path], "ls").await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut entries: Vec<String> = stdout
            .lines()
            .filter(|line| !line.is_empty() && !line.starts_with("Found "))
            .filter_map(|line| line.split_whitespace().last())
            .map(str::to_string)
            .collect();
        entries.sort();
        Ok(entries)
    }
}
