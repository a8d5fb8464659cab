//! Caller-side job API: start, poll, cancel.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::FiltrationConfig;
use crate::engine::Reconciler;
use crate::error::FiltrationError;
use crate::model::{JobId, JobOutcome, JobRequest, JobState, JobStatus, PROGRESS_ABORTED};
use crate::store::JobStore;

/// A job running on its own worker thread.
pub struct JobHandle {
    pub job_id: JobId,
    store: Arc<dyn JobStore>,
    handle: JoinHandle<Result<JobOutcome, FiltrationError>>,
}

impl JobHandle {
    /// Wait for the worker. A panicked worker is reported as a workbook error
    /// and its record is marked `Failed`.
    pub fn join(self) -> Result<JobOutcome, FiltrationError> {
        let job_id = self.job_id;
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => {
                let message = format!("job {job_id} worker panicked");
                log::error!("{message}");
                let mut status = JobStatus::new(job_id, JobState::Failed, PROGRESS_ABORTED);
                status.error = Some(message.clone());
                if let Err(e) = self.store.write_status(&status) {
                    log::warn!("job {job_id}: cannot publish status: {e}");
                }
                Err(FiltrationError::Workbook(message))
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Run a job on the calling thread.
pub fn run_job(
    request: &JobRequest,
    config: &FiltrationConfig,
    store: &dyn JobStore,
) -> Result<JobOutcome, FiltrationError> {
    Reconciler::new(request, config, store).run()
}

/// Spawn a job on a dedicated thread and return at once.
///
/// The `Initializing` status is published before the thread starts, so an
/// immediate poll never sees an unknown job.
pub fn start_job(
    store: Arc<dyn JobStore>,
    config: FiltrationConfig,
    request: JobRequest,
) -> io::Result<JobHandle> {
    let job_id = request.job_id;
    store.write_status(&JobStatus::new(job_id, JobState::Initializing, 0))?;

    let worker_store = Arc::clone(&store);
    let handle = thread::Builder::new()
        .name(format!("hrl-job-{job_id}"))
        .spawn(move || run_job(&request, &config, worker_store.as_ref()))?;
    Ok(JobHandle { job_id, store, handle })
}

/// Latest published progress: -1 for cancelled/failed, 0..=100 otherwise.
pub fn poll_progress(store: &dyn JobStore, job_id: &JobId) -> io::Result<Option<i32>> {
    Ok(store.read_status(job_id)?.map(|s| s.progress))
}

/// Ask a job to stop at its next checkpoint. Returns false for unknown jobs
/// and for jobs that already reached a terminal state.
pub fn request_cancel(store: &dyn JobStore, job_id: &JobId) -> io::Result<bool> {
    match store.read_status(job_id)? {
        Some(status) if !status.state.is_terminal() => {
            store.request_cancel(job_id)?;
            log::info!("job {job_id}: cancellation requested");
            Ok(true)
        }
        _ => Ok(false),
    }
}
