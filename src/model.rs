use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Column order for the CSV artifact. The JSON artifact serializes the same
/// fields via serde, which preserves declaration order.
pub const CSV_COLUMNS: [&str; 23] = [
    "journal_id",
    "journal_name",
    "profile_url",
    "google_scholar_url",
    "website_url",
    "editor_url",
    "affiliation",
    "affiliation_url",
    "p_issn",
    "e_issn",
    "subject_area",
    "accreditation",
    "is_scopus_indexed",
    "is_garuda_indexed",
    "garuda_url",
    "impact_score",
    "h5_index",
    "citations_5yr",
    "citations_total",
    "cover_image_url",
    "source_file",
    "extraction_index",
    "extracted_at",
];

/// One scraped journal entry, normalized. Missing fields are explicit empty
/// strings / false, never dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalRecord {
    pub journal_id: String,
    pub journal_name: String,
    pub profile_url: String,
    pub google_scholar_url: String,
    pub website_url: String,
    pub editor_url: String,
    pub affiliation: String,
    pub affiliation_url: String,
    pub p_issn: String,
    pub e_issn: String,
    pub subject_area: String,
    pub accreditation: String,
    pub is_scopus_indexed: bool,
    pub is_garuda_indexed: bool,
    pub garuda_url: String,
    pub impact_score: String,
    pub h5_index: String,
    pub citations_5yr: String,
    pub citations_total: String,
    pub cover_image_url: String,
    pub source_file: String,
    pub extraction_index: u32,
    pub extracted_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Json,
    Both,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Both => "both",
        }
    }

    pub fn wants_csv(&self) -> bool {
        matches!(self, OutputFormat::Csv | OutputFormat::Both)
    }

    pub fn wants_json(&self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Both)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            "both" => Ok(OutputFormat::Both),
            other => Err(format!("unknown output format: {other:?} (expected csv|json|both)")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which storage backend variant served a run's remote writes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BackendKind {
    #[serde(rename = "native")]
    Native,
    #[serde(rename = "subprocess-fallback")]
    SubprocessFallback,
    #[serde(rename = "none")]
    None,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Native => "native",
            BackendKind::SubprocessFallback => "subprocess-fallback",
            BackendKind::None => "none",
        }
    }
}

/// Outcome of the remote persistence phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RemoteOutcome {
    /// Remote persistence was not requested for the run.
    Disabled,
    /// All artifacts landed remotely.
    Written,
    /// At least one artifact landed remotely, at least one did not.
    Partial,
    /// No backend was usable; local artifacts are the source of truth.
    Skipped,
}

/// Pipeline state. `Finalized` is terminal regardless of the remote path taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Extracted,
    Transformed,
    LocallyWritten,
    RemoteResolved,
    RemoteWritten,
    RemoteSkipped,
    Finalized,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Init => "init",
            RunState::Extracted => "extracted",
            RunState::Transformed => "transformed",
            RunState::LocallyWritten => "locally_written",
            RunState::RemoteResolved => "remote_resolved",
            RunState::RemoteWritten => "remote_written",
            RunState::RemoteSkipped => "remote_skipped",
            RunState::Finalized => "finalized",
        }
    }
}

/// Counters accumulated over one run. Every error kind is tallied; messages
/// are kept for the stats artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub files_read: u32,
    pub records_extracted: u32,
    pub records_transformed: u32,
    pub transformation_errors: u32,
    pub local_write_errors: u32,
    pub remote_write_errors: u32,
    pub duration_secs: f64,
    pub backend: Option<BackendKind>,
    pub remote: Option<RemoteOutcome>,
    pub errors: Vec<String>,
}

impl RunStats {
    pub fn record_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }
}

/// One execution of extract→transform→load. The timestamp is fixed at
/// construction and drives every artifact name and the partition path.
#[derive(Debug, Clone)]
pub struct ExtractionRun {
    pub started_at: DateTime<Local>,
    pub records: Vec<JournalRecord>,
    pub stats: RunStats,
}

impl ExtractionRun {
    pub fn new(started_at: DateTime<Local>) -> Self {
        Self {
            started_at,
            records: Vec::new(),
            stats: RunStats::default(),
        }
    }

    /// Shared filename suffix for every artifact of this run.
    pub fn timestamp_suffix(&self) -> String {
        self.started_at.format("%Y%m%d_%H%M%S").to_string()
    }
}
