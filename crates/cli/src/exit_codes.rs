//! CLI Exit Code Registry
//!
//! Single source of truth for `hrlf` exit codes. Scripts that start and
//! poll jobs rely on these values.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | General error                                        |
//! | 2    | Usage error (bad arguments, unreadable config file)  |
//! | 3    | Manifest or configuration error                      |
//! | 4    | Filesystem or workbook I/O failure                   |
//! | 5    | Job was cancelled                                    |
//! | 6    | Unknown job id                                       |

use hrlfilter_recon::FiltrationError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing input file, unreadable config.
pub const EXIT_USAGE: u8 = 2;

/// Manifest sheet/column missing, invalid config, enforced load-order violation.
pub const EXIT_CONFIG: u8 = 3;

/// Copy, directory or workbook failure.
pub const EXIT_IO: u8 = 4;

/// The job stopped on a cancellation request.
pub const EXIT_CANCELLED: u8 = 5;

/// No job record matches the given id.
pub const EXIT_UNKNOWN_JOB: u8 = 6;

/// Map a job failure to its exit code.
pub fn filtration_exit_code(err: &FiltrationError) -> u8 {
    match err {
        FiltrationError::Config(_) => EXIT_CONFIG,
        FiltrationError::Io { .. } | FiltrationError::DirectoryCollision(_) | FiltrationError::Workbook(_) => EXIT_IO,
    }
}
