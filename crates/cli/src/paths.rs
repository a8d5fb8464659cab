//! Well-known locations: filtration config and the job store directory.

use std::fs;
use std::path::{Path, PathBuf};

use hrlfilter_recon::FiltrationConfig;

use crate::exit_codes::{EXIT_CONFIG, EXIT_USAGE};
use crate::CliError;

/// `<config_dir>/hrlfilter/filtration.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("hrlfilter").join("filtration.toml"))
}

/// Platform state directory holding job records.
pub fn default_jobs_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let base = std::env::var("XDG_STATE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local/state")
            });
        base.join("hrlfilter/jobs")
    }

    #[cfg(not(target_os = "linux"))]
    {
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("hrlfilter")
            .join("jobs")
    }
}

/// Load the filtration config.
///
/// An explicit path must exist. Without one, the default location is used
/// when present, otherwise built-in defaults apply.
pub fn load_config(explicit: Option<&Path>) -> Result<FiltrationConfig, CliError> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match default_config_path().filter(|p| p.is_file()) {
            Some(p) => p,
            None => {
                log::debug!("no filtration config found, using defaults");
                return Ok(FiltrationConfig::default());
            }
        },
    };

    let text = fs::read_to_string(&path).map_err(|e| CliError {
        code: EXIT_USAGE,
        message: format!("cannot read config {}: {e}", path.display()),
        hint: None,
    })?;
    log::debug!("loaded filtration config from {}", path.display());
    FiltrationConfig::from_toml(&text).map_err(|e| CliError {
        code: EXIT_CONFIG,
        message: format!("{}: {e}", path.display()),
        hint: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_config_must_exist() {
        let err = load_config(Some(Path::new("/nonexistent/filtration.toml"))).unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
    }

    #[test]
    fn invalid_config_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filtration.toml");
        fs::write(&path, "[copy]\nmax_retries = 99\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert_eq!(err.code, EXIT_CONFIG);
        assert!(err.message.contains("max_retries"));
    }

    #[test]
    fn explicit_config_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filtration.toml");
        fs::write(&path, "[output]\nfolder_prefix = \"OUT_\"\n").unwrap();
        assert_eq!(load_config(Some(&path)).unwrap().output.folder_prefix, "OUT_");
    }
}
