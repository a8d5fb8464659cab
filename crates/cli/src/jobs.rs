//! `hrlf status`, `hrlf cancel` and `hrlf jobs`: the polling side of the job store.

use hrlfilter_recon::{request_cancel, FileJobStore, JobId, JobStatus, JobStore};

use crate::exit_codes::{EXIT_UNKNOWN_JOB, EXIT_USAGE};
use crate::{CliError, GlobalOpts};

/// Resolve a full id or a unique prefix of one.
fn find_job(store: &FileJobStore, id_text: &str) -> Result<JobStatus, CliError> {
    let io_err = |e: std::io::Error| CliError::io(format!("cannot read job store {}: {e}", store.dir().display()));

    if let Ok(id) = id_text.parse::<JobId>() {
        if let Some(status) = store.read_status(&id).map_err(io_err)? {
            return Ok(status);
        }
    }

    let prefix = id_text.trim().to_lowercase();
    let mut matches: Vec<JobStatus> = if prefix.is_empty() {
        Vec::new()
    } else {
        store
            .list()
            .map_err(io_err)?
            .into_iter()
            .filter(|s| s.job_id.to_string().starts_with(&prefix))
            .collect()
    };

    if matches.len() > 1 {
        return Err(CliError {
            code: EXIT_USAGE,
            message: format!("'{id_text}' matches {} jobs", matches.len()),
            hint: Some("use a longer prefix".into()),
        });
    }
    matches.pop().ok_or_else(|| CliError {
        code: EXIT_UNKNOWN_JOB,
        message: format!("no job matching '{id_text}'"),
        hint: Some("run `hrlf jobs` to list known jobs".into()),
    })
}

fn status_line(status: &JobStatus) -> String {
    let mut line = format!(
        "{}  {:<18} {:>4}%  {}",
        status.job_id,
        status.state.to_string(),
        status.progress,
        status.updated_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(path) = &status.output_path {
        line.push_str(&format!("  {}", path.display()));
    }
    line
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::io(format!("cannot serialize: {e}")))?;
    println!("{text}");
    Ok(())
}

pub fn cmd_status(globals: &GlobalOpts, job: String, json: bool) -> Result<(), CliError> {
    let store = FileJobStore::new(globals.jobs_dir());
    let status = find_job(&store, &job)?;

    if json {
        return print_json(&status);
    }
    println!("{}", status_line(&status));
    if let Some(error) = &status.error {
        println!("  error: {error}");
    }
    Ok(())
}

pub fn cmd_cancel(globals: &GlobalOpts, job: String) -> Result<(), CliError> {
    let store = FileJobStore::new(globals.jobs_dir());
    let status = find_job(&store, &job)?;

    let requested = request_cancel(&store, &status.job_id)
        .map_err(|e| CliError::io(format!("cannot request cancellation: {e}")))?;
    if requested {
        eprintln!("cancellation requested for {}", status.job_id);
    } else {
        eprintln!("job {} already {}", status.job_id, status.state);
    }
    Ok(())
}

pub fn cmd_jobs(globals: &GlobalOpts, json: bool) -> Result<(), CliError> {
    let store = FileJobStore::new(globals.jobs_dir());
    let jobs = store
        .list()
        .map_err(|e| CliError::io(format!("cannot read job store {}: {e}", store.dir().display())))?;

    if json {
        return print_json(&jobs);
    }
    if jobs.is_empty() {
        eprintln!("no jobs in {}", store.dir().display());
        return Ok(());
    }
    for status in &jobs {
        println!("{}", status_line(status));
    }
    Ok(())
}
