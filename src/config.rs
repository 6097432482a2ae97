//! Configuration loader and validator for the journals ETL.
use crate::model::OutputFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub hdfs: Hdfs,
}

/// Local pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub input_folder: String,
    pub output_folder: String,
    pub output_format: OutputFormat,
}

/// Remote persistence settings. All externally supplied; backends never read
/// ambient environment mid-operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hdfs {
    pub enabled: bool,
    pub url: String,
    #[serde(default)]
    pub user: Option<String>,
    pub base_path: String,
    pub cli_bin: String,
    pub op_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: App {
                input_folder: "output_journals".into(),
                output_folder: "output_data".into(),
                output_format: OutputFormat::Both,
            },
            hdfs: Hdfs {
                enabled: false,
                url: "http://localhost:9870".into(),
                user: None,
                base_path: "/user/sinta/journals".into(),
                cli_bin: "hdfs".into(),
                op_timeout_secs: 60,
            },
        }
    }
}

impl Config {
    /// Ensure the local output directory exists (creates it if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.output_folder.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.output_folder)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `etl.yaml` in the current working directory,
///   falling back to built-in defaults when that file does not exist.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let default = Path::new("etl.yaml");
    let path = match path {
        Some(p) => p,
        None if default.exists() => default,
        None => return Ok(Config::default()),
    };
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.input_folder.trim().is_empty() {
        return Err(ConfigError::Invalid("app.input_folder must be non-empty"));
    }
    if cfg.app.output_folder.trim().is_empty() {
        return Err(ConfigError::Invalid("app.output_folder must be non-empty"));
    }

    if cfg.hdfs.enabled {
        if cfg.hdfs.url.trim().is_empty() {
            return Err(ConfigError::Invalid("hdfs.url must be non-empty when hdfs.enabled"));
        }
        if !cfg.hdfs.base_path.starts_with('/') {
            return Err(ConfigError::Invalid("hdfs.base_path must be an absolute path"));
        }
        if cfg.hdfs.cli_bin.trim().is_empty() {
            return Err(ConfigError::Invalid("hdfs.cli_bin must be non-empty when hdfs.enabled"));
        }
        if cfg.hdfs.op_timeout_secs == 0 {
            return Err(ConfigError::Invalid("hdfs.op_timeout_secs must be > 0"));
        }
    }

    Ok(())
}

/// Example YAML config, also used as a test fixture.
pub fn example() -> &'static str {
    r#"app:
  input_folder: "output_journals"
  output_folder: "output_data"
  output_format: "both"

hdfs:
  enabled: true
  url: "http://localhost:9870"
  user: "hadoop"
  base_path: "/user/sinta/journals"
  cli_bin: "hdfs"
  op_timeout_secs: 60
"#
}
