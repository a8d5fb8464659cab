//! Job-keyed progress and cancellation store.
//!
//! Worker and caller never write the same key: the worker owns the status
//! record, the caller owns the cancel flag. Visibility is poll-based.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::model::{JobId, JobStatus};

pub trait JobStore: Send + Sync {
    /// Publish the worker's latest status, replacing the previous one.
    fn write_status(&self, status: &JobStatus) -> io::Result<()>;

    fn read_status(&self, job_id: &JobId) -> io::Result<Option<JobStatus>>;

    /// Ask the worker to stop at its next checkpoint.
    fn request_cancel(&self, job_id: &JobId) -> io::Result<()>;

    fn cancel_requested(&self, job_id: &JobId) -> io::Result<bool>;

    /// Every known status, most recently updated first.
    fn list(&self) -> io::Result<Vec<JobStatus>>;
}

fn sort_recent_first(statuses: &mut [JobStatus]) {
    statuses.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

// ============================================================================
// In-process store
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryJobStore {
    statuses: RwLock<HashMap<JobId, JobStatus>>,
    cancelled: RwLock<HashSet<JobId>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "job store lock poisoned")
}

impl JobStore for MemoryJobStore {
    fn write_status(&self, status: &JobStatus) -> io::Result<()> {
        let mut map = self.statuses.write().map_err(|_| poisoned())?;
        map.insert(status.job_id, status.clone());
        Ok(())
    }

    fn read_status(&self, job_id: &JobId) -> io::Result<Option<JobStatus>> {
        let map = self.statuses.read().map_err(|_| poisoned())?;
        Ok(map.get(job_id).cloned())
    }

    fn request_cancel(&self, job_id: &JobId) -> io::Result<()> {
        let mut set = self.cancelled.write().map_err(|_| poisoned())?;
        set.insert(*job_id);
        Ok(())
    }

    fn cancel_requested(&self, job_id: &JobId) -> io::Result<bool> {
        let set = self.cancelled.read().map_err(|_| poisoned())?;
        Ok(set.contains(job_id))
    }

    fn list(&self) -> io::Result<Vec<JobStatus>> {
        let map = self.statuses.read().map_err(|_| poisoned())?;
        let mut all: Vec<JobStatus> = map.values().cloned().collect();
        sort_recent_first(&mut all);
        Ok(all)
    }
}

// ============================================================================
// Directory-backed store (shared across processes)
// ============================================================================

/// `<dir>/<job_id>.json` holds the status, `<dir>/<job_id>.cancel` is the flag.
#[derive(Debug, Clone)]
pub struct FileJobStore {
    dir: PathBuf,
}

impl FileJobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn status_path(&self, job_id: &JobId) -> PathBuf {
        self.dir.join(format!("{job_id}.json"))
    }

    fn cancel_path(&self, job_id: &JobId) -> PathBuf {
        self.dir.join(format!("{job_id}.cancel"))
    }

    fn parse(path: &Path) -> io::Result<Option<JobStatus>> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{}: {e}", path.display())))
    }
}

impl JobStore for FileJobStore {
    fn write_status(&self, status: &JobStatus) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(status)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        // Readers must never observe a half-written record.
        let target = self.status_path(&status.job_id);
        let tmp = self.dir.join(format!(".{}.{}.tmp", status.job_id, std::process::id()));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &target)
    }

    fn read_status(&self, job_id: &JobId) -> io::Result<Option<JobStatus>> {
        Self::parse(&self.status_path(job_id))
    }

    fn request_cancel(&self, job_id: &JobId) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.cancel_path(job_id), b"")
    }

    fn cancel_requested(&self, job_id: &JobId) -> io::Result<bool> {
        Ok(self.cancel_path(job_id).exists())
    }

    fn list(&self) -> io::Result<Vec<JobStatus>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut all = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                match Self::parse(&path) {
                    Ok(Some(status)) => all.push(status),
                    Ok(None) => {}
                    Err(e) => log::warn!("ignoring unreadable job record: {e}"),
                }
            }
        }
        sort_recent_first(&mut all);
        Ok(all)
    }
}
