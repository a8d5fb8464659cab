use std::fmt;
use std::io;
use std::path::PathBuf;

/// Manifest or configuration problems. Always fatal; no partial output.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parse / deserialization error.
    Parse(String),
    /// Config validation error (bad color, empty sheet name, etc.).
    Validation(String),
    /// Required sheet absent from the manifest workbook.
    MissingSheet { sheet: String, available: Vec<String> },
    /// Required header absent from a manifest sheet.
    MissingColumn { sheet: String, column: String },
    /// Rows out of dependency order while enforcement is on.
    LoadOrder(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "config parse error: {msg}"),
            Self::Validation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingSheet { sheet, available } => {
                write!(f, "manifest has no sheet '{sheet}' (found: {})", available.join(", "))
            }
            Self::MissingColumn { sheet, column } => {
                write!(f, "sheet '{sheet}': missing column '{column}'")
            }
            Self::LoadOrder(msg) => write!(f, "load order violation: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug)]
pub enum FiltrationError {
    Config(ConfigError),
    /// Filesystem failure. Permission failures land here only after retries.
    Io {
        context: String,
        path: PathBuf,
        source: io::Error,
    },
    /// A regular file sits where an output directory must go.
    DirectoryCollision(PathBuf),
    /// Workbook read/write failure.
    Workbook(String),
}

impl FiltrationError {
    pub fn io(context: impl Into<String>, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            path: path.into(),
            source,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl fmt::Display for FiltrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{e}"),
            Self::Io { context, path, source } => {
                write!(f, "{context} '{}': {source}", path.display())
            }
            Self::DirectoryCollision(path) => {
                write!(f, "cannot create directory '{}': a file already exists there", path.display())
            }
            Self::Workbook(msg) => write!(f, "workbook error: {msg}"),
        }
    }
}

impl std::error::Error for FiltrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for FiltrationError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
