//! Reconciliation driver.
//!
//! ```text
//! Initializing -> CatalogingFolders -> ReconcilingRows -> AssemblingOutput -> Done
//!                                             |                  |
//!                                             +---> Cancelled <--+
//! any state ---> Failed
//! ```
//!
//! The driver is the only writer of its rows and of its status record. The
//! cancel flag is polled before each partition, before each row and before
//! assembly; nothing is deleted on cancel, but the workbook is never saved.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use hrlfilter_io::xlsx;

use crate::assemble::{assemble, FolderSummary};
use crate::classify::{classify, ArtifactCatalog};
use crate::config::FiltrationConfig;
use crate::copy::{copy_artifact, ensure_dir, CopyOutcome, RetryPolicy};
use crate::error::{ConfigError, FiltrationError};
use crate::manifest::{check_load_order, load_manifest, plan_partitions, Partition};
use crate::model::{
    row_progress, HrlStatus, JobOutcome, JobReport, JobRequest, JobState, JobStatus, PROGRESS_ABORTED,
};
use crate::resolve::{lookup_key, resolve};
use crate::store::JobStore;

/// Runs one job to a terminal state.
pub struct Reconciler<'a> {
    request: &'a JobRequest,
    config: &'a FiltrationConfig,
    store: &'a dyn JobStore,
}

/// A partition with its catalog built. `None` when no folder backs the type.
struct Catalogued {
    partition: Partition,
    catalog: Option<ArtifactCatalog>,
}

/// Early exit from the row loop.
enum Halt {
    Cancelled,
    Failed(FiltrationError),
}

impl From<FiltrationError> for Halt {
    fn from(e: FiltrationError) -> Self {
        Halt::Failed(e)
    }
}

impl<'a> Reconciler<'a> {
    pub fn new(request: &'a JobRequest, config: &'a FiltrationConfig, store: &'a dyn JobStore) -> Self {
        Self { request, config, store }
    }

    /// Drive the job. Every exit path publishes a terminal status: `Done`
    /// with 100, or `Cancelled`/`Failed` with -1.
    pub fn run(&self) -> Result<JobOutcome, FiltrationError> {
        log::info!(
            "job {}: manifest {} against {} ({} policy)",
            self.request.job_id,
            self.request.manifest_path.display(),
            self.request.artifact_root.display(),
            self.request.policy
        );
        match self.execute() {
            Ok(report) => {
                log::info!(
                    "job {}: done, {} found / {} not found, {} files copied, saved {}",
                    report.job_id,
                    report.rows_found,
                    report.rows_not_found,
                    report.files_copied,
                    report.output_path.display()
                );
                Ok(JobOutcome::Completed(report))
            }
            Err(Halt::Cancelled) => {
                log::info!("job {}: cancelled", self.request.job_id);
                self.publish(JobStatus::new(self.request.job_id, JobState::Cancelled, PROGRESS_ABORTED));
                Ok(JobOutcome::Cancelled)
            }
            Err(Halt::Failed(e)) => {
                log::error!("job {}: failed: {e}", self.request.job_id);
                let mut status = JobStatus::new(self.request.job_id, JobState::Failed, PROGRESS_ABORTED);
                status.error = Some(e.to_string());
                self.publish(status);
                Err(e)
            }
        }
    }

    fn execute(&self) -> Result<JobReport, Halt> {
        // Initializing
        self.publish_progress(JobState::Initializing, 0);
        let manifest = load_manifest(&self.request.manifest_path, &self.config.manifest)?;
        let violations = check_load_order(&manifest.rows, &self.config.matching);
        if !violations.is_empty() {
            let listed: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
            if self.config.matching.enforce_load_order {
                return Err(Halt::Failed(ConfigError::LoadOrder(listed.join("; ")).into()));
            }
            for line in &listed {
                log::warn!("load order: {line}");
            }
        }
        let partitions = plan_partitions(&manifest.rows, &self.request.artifact_root, &self.config.matching)?;
        let output_root = self.output_root()?;

        // CatalogingFolders
        self.publish_progress(JobState::CatalogingFolders, 0);
        let mut catalogued = Vec::with_capacity(partitions.len());
        for partition in partitions {
            let catalog = match &partition.folder {
                Some(folder) => Some(classify(folder)?),
                None => None,
            };
            catalogued.push(Catalogued { partition, catalog });
        }

        // ReconcilingRows
        self.publish_progress(JobState::ReconcilingRows, 0);
        let mut rows = manifest.rows.clone();
        let total = rows.len();
        let mut processed = 0usize;
        let mut files_copied = 0usize;
        let mut densities: BTreeMap<usize, usize> = BTreeMap::new();
        let mut folders: Vec<FolderSummary> = Vec::new();
        let retry = RetryPolicy {
            max_retries: self.config.copy.max_retries,
            backoff: self.config.copy.backoff(),
        };
        let substitutions = &self.config.matching.substitutions;
        let empty = ArtifactCatalog::new();

        for entry in &catalogued {
            self.check_cancel()?;
            let partition = &entry.partition;
            let catalog = entry.catalog.as_ref().unwrap_or(&empty);
            let folder_name = partition.folder_name();
            if let Some(name) = &folder_name {
                folders.push(FolderSummary {
                    folder_name: name.clone(),
                    file_count: catalog.file_count(),
                });
            }
            log::info!(
                "job {}: {} ({} rows, {} catalogued names)",
                self.request.job_id,
                partition.config_type,
                partition.rows.len(),
                catalog.len()
            );

            for &index in &partition.rows {
                self.check_cancel()?;
                let row = &mut rows[index];
                if row.has_name() {
                    row.matched_paths.clear();
                    densities.insert(row.sheet_row, catalog.version_count(&lookup_key(&row.config_name, substitutions)));

                    let matches = resolve(&row.config_name, catalog, self.request.policy, substitutions);
                    match (&partition.folder, folder_name.as_deref()) {
                        (Some(folder), Some(name)) if !matches.is_empty() => {
                            row.hrl_status = HrlStatus::Found;
                            for file in matches {
                                let dst = output_root.join(name).join(&file);
                                if copy_artifact(&folder.join(&file), &dst, &retry)? != CopyOutcome::AlreadyPresent {
                                    files_copied += 1;
                                }
                                row.add_match(format!("{name}/{file}"));
                            }
                        }
                        _ => row.hrl_status = HrlStatus::NotFound,
                    }
                    log::debug!("row {}: {} -> {}", row.sheet_row + 1, row.config_name, row.hrl_status);
                }
                processed += 1;
                self.publish_progress(JobState::ReconcilingRows, row_progress(processed, total));
            }
        }

        // AssemblingOutput
        self.check_cancel()?;
        self.publish_progress(JobState::AssemblingOutput, row_progress(processed, total));
        let palette = self.config.colors.palette().map_err(FiltrationError::from)?;
        let workbook = assemble(&manifest, &rows, &folders, &densities, &palette);

        ensure_dir(&output_root)?;
        let output_path = output_root.join(output_file_name(&self.request.manifest_path));
        xlsx::export(&workbook, &output_path)
            .map_err(|e| FiltrationError::Workbook(format!("{}: {e}", output_path.display())))?;

        let mut done = JobStatus::new(self.request.job_id, JobState::Done, 100);
        done.output_path = Some(output_path.clone());
        self.publish(done);

        Ok(JobReport {
            job_id: self.request.job_id,
            output_path,
            output_root,
            rows_total: total,
            rows_found: rows.iter().filter(|r| r.hrl_status == HrlStatus::Found).count(),
            rows_not_found: rows.iter().filter(|r| r.hrl_status == HrlStatus::NotFound).count(),
            files_copied,
        })
    }

    /// `<base>/<prefix><timestamp>`; nothing is created here.
    fn output_root(&self) -> Result<PathBuf, FiltrationError> {
        let base = self
            .request
            .output_base
            .clone()
            .or_else(|| self.config.output.dir.clone())
            .or_else(|| self.request.artifact_root.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| self.request.artifact_root.clone());

        let mut folder = self.config.output.folder_prefix.clone();
        write!(folder, "{}", chrono::Local::now().format(&self.config.output.timestamp_format)).map_err(|_| {
            ConfigError::Validation(format!(
                "output.timestamp_format: cannot format '{}'",
                self.config.output.timestamp_format
            ))
        })?;
        Ok(base.join(folder))
    }

    fn check_cancel(&self) -> Result<(), Halt> {
        match self.store.cancel_requested(&self.request.job_id) {
            Ok(true) => Err(Halt::Cancelled),
            Ok(false) => Ok(()),
            Err(e) => {
                log::warn!("job {}: cannot read cancel flag: {e}", self.request.job_id);
                Ok(())
            }
        }
    }

    fn publish_progress(&self, state: JobState, progress: i32) {
        self.publish(JobStatus::new(self.request.job_id, state, progress));
    }

    fn publish(&self, status: JobStatus) {
        if let Err(e) = self.store.write_status(&status) {
            log::warn!("job {}: cannot publish status: {e}", status.job_id);
        }
    }
}

/// The manifest's file name with an `.xlsx` extension.
fn output_file_name(manifest_path: &Path) -> String {
    let stem = manifest_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "manifest".to_string());
    format!("{stem}.xlsx")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_name_keeps_stem() {
        assert_eq!(output_file_name(Path::new("/in/Approved List.xlsx")), "Approved List.xlsx");
        assert_eq!(output_file_name(Path::new("legacy.xls")), "legacy.xlsx");
    }
}
