//! Storage backend abstraction for remote (HDFS) persistence.
//!
//! Two variants implement one capability contract: a WebHDFS REST client
//! (native binding, no process spawn per operation) and the `hdfs dfs`
//! command-line client invoked as a child process (guaranteed-available
//! fallback). The selector picks one per run; local artifacts never depend
//! on either.
use crate::model::BackendKind;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::path::Path;
use thiserror::Error;

pub mod cli;
pub mod select;
pub mod webhdfs;

pub use cli::HdfsCliBackend;
pub use select::BackendSelector;
pub use webhdfs::WebHdfsBackend;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The target filesystem cannot be reached at all. Triggers the one-time
    /// fallback negotiation.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    /// The target is reachable but this specific call failed. Reported and
    /// the run continues.
    #[error("storage operation failed: {0}")]
    OperationFailed(String),
}

/// Capability contract for "write bytes/records to a remote path".
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Availability probe. Never errors; unavailable backends return false.
    async fn health_check(&self) -> bool;

    /// Create all missing path segments. Idempotent; succeeds silently if the
    /// path already exists.
    async fn ensure_directory(&self, path: &str) -> Result<(), StorageError>;

    /// Copy a local artifact to the remote path, overwriting any existing
    /// file there (retry-safe).
    async fn write_file(&self, local_path: &Path, remote_path: &str) -> Result<(), StorageError>;

    /// Ordered listing of entries under a path. Verification only; the write
    /// path never depends on it.
    async fn list_files(&self, path: &str) -> Result<Vec<String>, StorageError>;
}

/// A resolved remote destination: base root plus the run's date partition.
/// Derived purely from the run timestamp; same timestamp, same partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageTarget {
    base_path: String,
    partition: String,
}

impl StorageTarget {
    pub fn resolve(base_path: &str, run_timestamp: DateTime<Local>) -> Self {
        Self {
            base_path: base_path.trim_end_matches('/').to_string(),
            partition: run_timestamp.format("%Y/%m/%d").to_string(),
        }
    }

    /// The partition directory, e.g. `/user/sinta/journals/2026/01/12`.
    pub fn directory(&self) -> String {
        format!("{}/{}", self.base_path, self.partition)
    }

    /// Full remote path for one artifact file name.
    pub fn file_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.directory(), file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn partition_path_is_deterministic() {
        let ts = Local.with_ymd_and_hms(2026, 1, 12, 6, 5, 9).unwrap();
        let a = StorageTarget::resolve("/user/sinta/journals", ts);
        let b = StorageTarget::resolve("/user/sinta/journals", ts);
        assert_eq!(a, b);
        assert_eq!(a.directory(), "/user/sinta/journals/2026/01/12");
    }

    #[test]
    fn partition_segments_are_zero_padded() {
        let ts = Local.with_ymd_and_hms(2026, 3, 4, 0, 0, 0).unwrap();
        let target = StorageTarget::resolve("/data", ts);
        assert_eq!(target.directory(), "/data/2026/03/04");
    }

    #[test]
    fn trailing_slash_on_base_is_normalized() {
        let ts = Local.with_ymd_and_hms(2026, 1, 12, 6, 5, 9).unwrap();
        let target = StorageTarget::resolve("/user/sinta/journals/", ts);
        assert_eq!(
            target.file_path("journals_data_20260112_060509.csv"),
            "/user/sinta/journals/2026/01/12/journals_data_20260112_060509.csv"
        );
    }
}
