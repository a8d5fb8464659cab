use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Manifest rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HrlStatus {
    Pending,
    Found,
    NotFound,
}

impl HrlStatus {
    /// Text written into the manifest's status column. `Pending` leaves the cell as-is.
    pub fn cell_text(&self) -> Option<&'static str> {
        match self {
            Self::Pending => None,
            Self::Found => Some("HRL Found"),
            Self::NotFound => Some("Not Found"),
        }
    }
}

impl fmt::Display for HrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Found => write!(f, "found"),
            Self::NotFound => write!(f, "not_found"),
        }
    }
}

/// One line of the approved-list sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestRow {
    /// 0-based row in the detail sheet (header is row 0).
    pub sheet_row: usize,
    pub config_type: String,
    pub config_name: String,
    pub hrl_status: HrlStatus,
    /// Source paths relative to the artifact root, in resolution order.
    pub matched_paths: Vec<String>,
}

impl ManifestRow {
    pub fn new(sheet_row: usize, config_type: impl Into<String>, config_name: impl Into<String>) -> Self {
        Self {
            sheet_row,
            config_type: config_type.into(),
            config_name: config_name.into(),
            hrl_status: HrlStatus::Pending,
            matched_paths: Vec::new(),
        }
    }

    pub fn has_name(&self) -> bool {
        !self.config_name.trim().is_empty()
    }

    /// Record a matched source path, skipping filenames already recorded.
    pub fn add_match(&mut self, relative_path: String) {
        let file_name = |p: &str| p.rsplit(&['/', '\\'][..]).next().unwrap_or(p).to_string();
        let incoming = file_name(&relative_path);
        if self.matched_paths.iter().any(|p| file_name(p) == incoming) {
            return;
        }
        self.matched_paths.push(relative_path);
    }

    /// Paths as written to the manifest: comma-joined.
    pub fn joined_paths(&self) -> String {
        self.matched_paths.join(", ")
    }
}

// ---------------------------------------------------------------------------
// Versioning policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionPolicy {
    #[default]
    Latest,
    Oldest,
    All,
}

impl fmt::Display for VersionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::Oldest => write!(f, "oldest"),
            Self::All => write!(f, "all"),
        }
    }
}

impl FromStr for VersionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "latest" | "l" => Ok(Self::Latest),
            "oldest" | "o" => Ok(Self::Oldest),
            "all" | "a" => Ok(Self::All),
            other => Err(format!("unknown version policy: \"{other}\" (expected latest, oldest or all)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for JobId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(JobId)
            .map_err(|e| format!("invalid job id '{s}': {e}"))
    }
}

/// What the caller asks for. The driver owns everything derived from it.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub job_id: JobId,
    pub manifest_path: PathBuf,
    pub artifact_root: PathBuf,
    pub policy: VersionPolicy,
    /// Base directory for `HRLS_<timestamp>`; `None` uses the config or the
    /// artifact root's parent.
    pub output_base: Option<PathBuf>,
}

impl JobRequest {
    pub fn new(manifest_path: impl Into<PathBuf>, artifact_root: impl Into<PathBuf>, policy: VersionPolicy) -> Self {
        Self {
            job_id: JobId::new(),
            manifest_path: manifest_path.into(),
            artifact_root: artifact_root.into(),
            policy,
            output_base: None,
        }
    }

    pub fn with_output_base(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_base = Some(dir.into());
        self
    }

    pub fn with_job_id(mut self, job_id: JobId) -> Self {
        self.job_id = job_id;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Initializing,
    CatalogingFolders,
    ReconcilingRows,
    AssemblingOutput,
    Done,
    Cancelled,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::CatalogingFolders => write!(f, "cataloging_folders"),
            Self::ReconcilingRows => write!(f, "reconciling_rows"),
            Self::AssemblingOutput => write!(f, "assembling_output"),
            Self::Done => write!(f, "done"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Sentinel progress for cancelled and failed jobs.
pub const PROGRESS_ABORTED: i32 = -1;

/// Share of progress reserved for row reconciliation; the rest is output assembly.
pub const PROGRESS_ROWS_SHARE: i32 = 95;

/// Snapshot published to the job store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: JobId,
    pub state: JobState,
    /// -1 (cancelled/failed) or 0..=100.
    pub progress: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl JobStatus {
    pub fn new(job_id: JobId, state: JobState, progress: i32) -> Self {
        Self {
            job_id,
            state,
            progress,
            output_path: None,
            error: None,
            updated_at: Utc::now(),
        }
    }
}

/// Terminal result of a job that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed(JobReport),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub job_id: JobId,
    /// The saved annotated workbook.
    pub output_path: PathBuf,
    /// The `HRLS_<timestamp>` folder holding the workbook and copied artifacts.
    pub output_root: PathBuf,
    pub rows_total: usize,
    pub rows_found: usize,
    pub rows_not_found: usize,
    pub files_copied: usize,
}

/// `round(processed / total * 95)`, with an empty manifest counting as done.
pub fn row_progress(processed: usize, total: usize) -> i32 {
    if total == 0 {
        return PROGRESS_ROWS_SHARE;
    }
    ((processed as f64 / total as f64) * PROGRESS_ROWS_SHARE as f64).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_match_dedups_by_filename() {
        let mut row = ManifestRow::new(1, "Product", "Alpha");
        row.add_match("Product/Product.Alpha.2024-01-01.hrl".into());
        row.add_match("Product/Product.Alpha.2024-01-01.hrl".into());
        row.add_match("Other/Product.Alpha.2024-01-01.hrl".into());
        row.add_match("Product/Product.Alpha.2024-03-01.hrl".into());
        assert_eq!(
            row.joined_paths(),
            "Product/Product.Alpha.2024-01-01.hrl, Product/Product.Alpha.2024-03-01.hrl"
        );
    }

    #[test]
    fn policy_parses_short_and_long_forms() {
        assert_eq!("latest".parse::<VersionPolicy>().unwrap(), VersionPolicy::Latest);
        assert_eq!(" O ".parse::<VersionPolicy>().unwrap(), VersionPolicy::Oldest);
        assert_eq!("ALL".parse::<VersionPolicy>().unwrap(), VersionPolicy::All);
        assert!("newest".parse::<VersionPolicy>().is_err());
    }

    #[test]
    fn job_id_round_trips_through_text() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<JobId>().is_err());
    }

    #[test]
    fn row_progress_rounds_to_ninety_five() {
        assert_eq!(row_progress(0, 10), 0);
        assert_eq!(row_progress(1, 3), 32);
        assert_eq!(row_progress(10, 10), 95);
        assert_eq!(row_progress(0, 0), 95);
    }
}
