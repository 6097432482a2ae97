//! Native binding backend: WebHDFS REST client against the NameNode.
//!
//! Preferred path, no process spawn per operation. File creation is the
//! standard two-step WebHDFS dance: the NameNode answers `op=CREATE` with a
//! 307 redirect to a DataNode, and the file bytes are PUT there.
use crate::model::BackendKind;
use crate::storage::{StorageBackend, StorageError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{redirect, Client, StatusCode, Url};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use tracing::debug;

pub struct WebHdfsBackend {
    http: Client,
    base_url: Url,
    user: Option<String>,
}

impl fmt::Debug for WebHdfsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebHdfsBackend")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl WebHdfsBackend {
    /// `url` is the NameNode HTTP address, e.g. `http://localhost:9870`.
    pub fn new(url: &str, user: Option<String>) -> Result<Self> {
        let base_url = Url::parse(url).with_context(|| format!("invalid WebHDFS URL: {url}"))?;
        // Redirects are handled manually: the CREATE body must go to the
        // DataNode location, not be replayed by the client.
        let http = Client::builder()
            .user_agent("sinta-etl/0.1")
            .redirect(redirect::Policy::none())
            .no_proxy()
            .build()
            .context("failed to build WebHDFS HTTP client")?;
        Ok(Self {
            http,
            base_url,
            user,
        })
    }

    pub(crate) fn op_url(&self, path: &str, op: &str) -> Result<Url, StorageError> {
        let joined = format!("webhdfs/v1{}", path);
        let mut url = self
            .base_url
            .join(&joined)
            .map_err(|e| StorageError::OperationFailed(format!("invalid remote path {path}: {e}")))?;
        url.query_pairs_mut().append_pair("op", op);
        if let Some(user) = &self.user {
            url.query_pairs_mut().append_pair("user.name", user);
        }
        Ok(url)
    }

    async fn check_response(
        res: reqwest::Response,
        what: &str,
    ) -> Result<reqwest::Response, StorageError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = res.text().await.unwrap_or_default();
        Err(StorageError::OperationFailed(format!(
            "{what} returned {status}: {body}"
        )))
    }
}

fn transport_error(what: &str, err: reqwest::Error) -> StorageError {
    if err.is_connect() || err.is_timeout() {
        StorageError::Unavailable(format!("{what}: {err}"))
    } else {
        StorageError::OperationFailed(format!("{what}: {err}"))
    }
}

#[async_trait]
impl StorageBackend for WebHdfsBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    async fn health_check(&self) -> bool {
        let url = match self.op_url("/", "GETFILESTATUS") {
            Ok(u) => u,
            Err(_) => return false,
        };
        match self.http.get(url).send().await {
            Ok(res) => res.status().is_success(),
            Err(err) => {
                debug!(?err, "webhdfs health check failed");
                false
            }
        }
    }

    async fn ensure_directory(&self, path: &str) -> Result<(), StorageError> {
        let url = self.op_url(path, "MKDIRS")?;
        debug!(%url, "webhdfs mkdirs");
        let res = self
            .http
            .put(url)
            .send()
            .await
            .map_err(|e| transport_error("MKDIRS", e))?;
        let res = Self::check_response(res, "MKDIRS").await?;

        let payload: BooleanResponse = res
            .json()
            .await
            .map_err(|e| StorageError::OperationFailed(format!("invalid MKDIRS response: {e}")))?;
        if !payload.boolean {
            return Err(StorageError::OperationFailed(format!(
                "MKDIRS reported failure for {path}"
            )));
        }
        Ok(())
    }

    async fn write_file(&self, local_path: &Path, remote_path: &str) -> Result<(), StorageError> {
        let bytes = tokio::fs::read(local_path).await.map_err(|e| {
            StorageError::OperationFailed(format!("read {}: {e}", local_path.display()))
        })?;

        let mut url = self.op_url(remote_path, "CREATE")?;
        url.query_pairs_mut().append_pair("overwrite", "true");
        debug!(%url, size = bytes.len(), "webhdfs create");

        let res = self
            .http
            .put(url)
            .send()
            .await
            .map_err(|e| transport_error("CREATE", e))?;

        if res.status() != StatusCode::TEMPORARY_REDIRECT {
            // Anything but the redirect handshake is a protocol-level failure.
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(StorageError::OperationFailed(format!(
                "CREATE expected 307 redirect, got {status}: {body}"
            )));
        }

        let location = res
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                StorageError::OperationFailed("CREATE redirect missing Location header".into())
            })?
            .to_string();

        let res = self
            .http
            .put(&location)
            .body(bytes)
            .send()
            .await
            .map_err(|e| transport_error("CREATE upload", e))?;
        Self::check_response(res, "CREATE upload").await?;
        Ok(())
    }

    async fn list_files(&self, path: &str) -> Result<Vec<String>, StorageError> {
        let url = self.op_url(path, "LISTSTATUS")?;
        let res = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error("LISTSTATUS", e))?;
        let res = Self::check_response(res, "LISTSTATUS").await?;

        let payload: ListStatusResponse = res.json().await.map_err(|e| {
            StorageError::OperationFailed(format!("invalid LISTSTATUS response: {e}"))
        })?;
        let mut names: Vec<String> = payload
            .file_statuses
            .file_status
            .into_iter()
            .map(|s| s.path_suffix)
            .collect();
        names.sort();
        Ok(names)
    }
}

#[derive(Deserialize)]
struct BooleanResponse {
    boolean: bool,
}

#[derive(Deserialize)]
struct ListStatusResponse {
    #[serde(rename = "FileStatuses")]
    file_statuses: FileStatuses,
}

#[derive(Deserialize)]
struct FileStatuses {
    #[serde(rename = "FileStatus")]
    file_status: Vec<FileStatus>,
}

#[derive(Deserialize)]
struct FileStatus {
    #[serde(rename = "pathSuffix")]
    path_suffix: String,
}
