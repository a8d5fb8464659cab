//! `hrlfilter-recon`: manifest/artifact filtration engine.
//!
//! Classifies exported artifact files by config name, resolves manifest rows
//! against them under a versioning policy, copies matches into a timestamped
//! output tree and writes the annotated manifest. Progress and cancellation
//! go through a job-keyed [`store::JobStore`].

pub mod assemble;
pub mod classify;
pub mod config;
pub mod copy;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod manifest;
pub mod model;
pub mod resolve;
pub mod store;

pub use config::FiltrationConfig;
pub use error::{ConfigError, FiltrationError};
pub use jobs::{poll_progress, request_cancel, run_job, start_job, JobHandle};
pub use model::{JobId, JobOutcome, JobReport, JobRequest, JobState, JobStatus, VersionPolicy};
pub use store::{FileJobStore, JobStore, MemoryJobStore};
