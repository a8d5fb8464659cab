//! `hrlf run`, `hrlf start` and `hrlf validate`: launching and checking filtration jobs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Args;
use serde::Serialize;

use hrlfilter_recon::manifest::{check_load_order, load_manifest, plan_partitions};
use hrlfilter_recon::{
    start_job, ConfigError, FileJobStore, FiltrationError, JobId, JobOutcome, JobRequest, JobState, JobStatus,
    JobStore, VersionPolicy,
};

use crate::exit_codes::{filtration_exit_code, EXIT_CANCELLED, EXIT_CONFIG, EXIT_ERROR};
use crate::{paths, CliError, GlobalOpts};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Inputs shared by `run` and `start`.
#[derive(Args, Debug, Clone)]
pub struct JobArgs {
    /// Manifest workbook with the summary and approved-list sheets
    pub manifest: PathBuf,

    /// Artifact root holding one folder per config type
    pub artifact_root: PathBuf,

    /// Which versions to take when a name has several files: latest, oldest or all
    #[arg(long, short = 'p', default_value = "latest")]
    pub policy: VersionPolicy,

    /// Base directory for the HRLS_<timestamp> folder [default: next to the artifact root]
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

impl JobArgs {
    fn check_inputs(&self) -> Result<(), CliError> {
        if !self.manifest.is_file() {
            return Err(CliError::args(format!("manifest not found: {}", self.manifest.display())));
        }
        if !self.artifact_root.is_dir() {
            return Err(CliError::args(format!(
                "artifact root is not a directory: {}",
                self.artifact_root.display()
            ))
            .with_hint("pass the folder that contains the per-config-type folders"));
        }
        Ok(())
    }

    fn request(&self, job_id: JobId) -> JobRequest {
        let request = JobRequest::new(&self.manifest, &self.artifact_root, self.policy).with_job_id(job_id);
        match &self.output_dir {
            Some(dir) => request.with_output_base(dir),
            None => request,
        }
    }
}

/// Map a job failure onto the CLI error contract.
pub fn job_error(err: FiltrationError) -> CliError {
    let code = filtration_exit_code(&err);
    let hint = match &err {
        FiltrationError::Config(ConfigError::MissingSheet { .. } | ConfigError::MissingColumn { .. }) => {
            Some("sheet and column names are set in the [manifest] section of filtration.toml".to_string())
        }
        FiltrationError::Config(ConfigError::LoadOrder(_)) => {
            Some("reorder the manifest rows or set matching.enforce_load_order = false".to_string())
        }
        FiltrationError::DirectoryCollision(_) => {
            Some("remove the file or choose another --output-dir".to_string())
        }
        _ => None,
    };
    CliError { code, message: err.to_string(), hint }
}

// ============================================================================
// run
// ============================================================================

#[derive(Serialize)]
struct RunSummary {
    job_id: String,
    state: JobState,
    output_path: PathBuf,
    output_root: PathBuf,
    rows_total: usize,
    rows_found: usize,
    rows_not_found: usize,
    files_copied: usize,
}

pub fn cmd_run(
    globals: &GlobalOpts,
    args: JobArgs,
    job_id: Option<JobId>,
    json: bool,
    quiet: bool,
) -> Result<(), CliError> {
    let store: Arc<dyn JobStore> = Arc::new(FileJobStore::new(globals.jobs_dir()));
    let prepared = args
        .check_inputs()
        .and_then(|()| paths::load_config(globals.config.as_deref()));
    let config = match prepared {
        Ok(config) => config,
        Err(err) => {
            // A worker launched by `hrlf start` already has a record to close.
            if let Some(id) = job_id {
                mark_failed(store.as_ref(), id, &err.message);
            }
            return Err(err);
        }
    };
    let request = args.request(job_id.unwrap_or_default());
    let job_id = request.job_id;

    let handle = start_job(Arc::clone(&store), config, request).map_err(|e| CliError {
        code: EXIT_ERROR,
        message: format!("cannot start job: {e}"),
        hint: None,
    })?;

    let show_progress = !quiet && !json;
    let mut last: Option<(JobState, i32)> = None;
    loop {
        if show_progress {
            if let Ok(Some(status)) = store.read_status(&job_id) {
                let seen = (status.state, status.progress);
                if last != Some(seen) {
                    eprintln!("[{:>3}%] {}", status.progress.max(0), status.state);
                    last = Some(seen);
                }
            }
        }
        if handle.is_finished() {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    match handle.join().map_err(job_error)? {
        JobOutcome::Completed(report) => {
            if json {
                let summary = RunSummary {
                    job_id: report.job_id.to_string(),
                    state: JobState::Done,
                    output_path: report.output_path,
                    output_root: report.output_root,
                    rows_total: report.rows_total,
                    rows_found: report.rows_found,
                    rows_not_found: report.rows_not_found,
                    files_copied: report.files_copied,
                };
                let text = serde_json::to_string_pretty(&summary)
                    .map_err(|e| CliError::io(format!("cannot serialize result: {e}")))?;
                println!("{text}");
            } else {
                if !quiet {
                    eprintln!(
                        "{} rows: {} found, {} not found; {} files copied",
                        report.rows_total, report.rows_found, report.rows_not_found, report.files_copied
                    );
                }
                println!("{}", report.output_path.display());
            }
            Ok(())
        }
        JobOutcome::Cancelled => Err(CliError {
            code: EXIT_CANCELLED,
            message: format!("job {job_id} cancelled"),
            hint: None,
        }),
    }
}

// ============================================================================
// start
// ============================================================================

/// Launch `hrlf run` as a detached process and print the job id.
pub fn cmd_start(globals: &GlobalOpts, args: JobArgs, json: bool) -> Result<(), CliError> {
    args.check_inputs()?;
    // Fail on a bad config here rather than inside the detached process.
    paths::load_config(globals.config.as_deref())?;

    let jobs_dir = globals.jobs_dir();
    let store = FileJobStore::new(&jobs_dir);
    let job_id = JobId::new();
    store
        .write_status(&JobStatus::new(job_id, JobState::Initializing, 0))
        .map_err(|e| CliError::io(format!("cannot write job record in {}: {e}", jobs_dir.display())))?;

    let exe = std::env::current_exe().map_err(|e| CliError::io(format!("cannot locate hrlf: {e}")))?;
    let log_path = jobs_dir.join(format!("{job_id}.log"));
    let log_file = fs::File::create(&log_path)
        .map_err(|e| CliError::io(format!("cannot create {}: {e}", log_path.display())))?;

    let mut command = Command::new(exe);
    command
        .arg("--jobs-dir")
        .arg(&jobs_dir)
        .arg("run")
        .arg(absolute(&args.manifest))
        .arg(absolute(&args.artifact_root))
        .arg("--policy")
        .arg(args.policy.to_string())
        .arg("--job-id")
        .arg(job_id.to_string())
        .arg("--quiet");
    if let Some(dir) = &args.output_dir {
        command.arg("--output-dir").arg(absolute(dir));
    }
    if let Some(config) = &globals.config {
        command.arg("--config").arg(absolute(config));
    }

    if let Err(e) = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::from(log_file))
        .spawn()
    {
        let message = format!("cannot spawn worker: {e}");
        mark_failed(&store, job_id, &message);
        return Err(CliError::io(message));
    }
    log::debug!("job {job_id}: worker log at {}", log_path.display());

    if json {
        println!("{}", serde_json::json!({ "job_id": job_id.to_string() }));
    } else {
        println!("{job_id}");
    }
    Ok(())
}

fn mark_failed(store: &dyn JobStore, job_id: JobId, message: &str) {
    let mut failed = JobStatus::new(job_id, JobState::Failed, -1);
    failed.error = Some(message.to_string());
    if let Err(e) = store.write_status(&failed) {
        log::warn!("job {job_id}: cannot record failure: {e}");
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

// ============================================================================
// validate
// ============================================================================

#[derive(Serialize)]
struct TypeReport {
    config_type: String,
    rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    folder: Option<String>,
}

#[derive(Serialize)]
struct ValidateReport {
    manifest: PathBuf,
    rows: usize,
    named_rows: usize,
    config_types: Vec<TypeReport>,
    load_order_violations: Vec<String>,
}

pub fn cmd_validate(
    globals: &GlobalOpts,
    manifest_path: PathBuf,
    artifacts: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    if !manifest_path.is_file() {
        return Err(CliError::args(format!("manifest not found: {}", manifest_path.display())));
    }
    let config = paths::load_config(globals.config.as_deref())?;
    let manifest = load_manifest(&manifest_path, &config.manifest).map_err(job_error)?;
    let violations: Vec<String> = check_load_order(&manifest.rows, &config.matching)
        .iter()
        .map(|v| v.to_string())
        .collect();

    let config_types = match &artifacts {
        Some(root) => plan_partitions(&manifest.rows, root, &config.matching)
            .map_err(job_error)?
            .into_iter()
            .filter(|p| !p.key.is_empty())
            .map(|p| TypeReport {
                folder: p.folder_name(),
                rows: p.rows.len(),
                config_type: p.config_type,
            })
            .collect(),
        None => {
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for row in manifest.rows.iter().filter(|r| !r.config_type.is_empty()) {
                *counts.entry(row.config_type.as_str()).or_default() += 1;
            }
            counts
                .into_iter()
                .map(|(t, rows)| TypeReport {
                    config_type: t.to_string(),
                    rows,
                    folder: None,
                })
                .collect()
        }
    };

    let report = ValidateReport {
        rows: manifest.rows.len(),
        named_rows: manifest.rows.iter().filter(|r| r.has_name()).count(),
        manifest: manifest_path,
        config_types,
        load_order_violations: violations,
    };

    if json {
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::io(format!("cannot serialize report: {e}")))?;
        println!("{text}");
    } else {
        println!(
            "{}: {} rows ({} named), {} config types",
            report.manifest.display(),
            report.rows,
            report.named_rows,
            report.config_types.len()
        );
        for t in &report.config_types {
            match (&artifacts, &t.folder) {
                (Some(_), Some(folder)) => println!("  {:<30} {:>5} rows  folder {folder}", t.config_type, t.rows),
                (Some(_), None) => println!("  {:<30} {:>5} rows  NO FOLDER", t.config_type, t.rows),
                (None, _) => println!("  {:<30} {:>5} rows", t.config_type, t.rows),
            }
        }
        for v in &report.load_order_violations {
            eprintln!("warning: load order: {v}");
        }
    }

    if config.matching.enforce_load_order && !report.load_order_violations.is_empty() {
        return Err(CliError {
            code: EXIT_CONFIG,
            message: format!("{} load order violation(s)", report.load_order_violations.len()),
            hint: Some("reorder the manifest rows or set matching.enforce_load_order = false".into()),
        });
    }
    Ok(())
}
