use std::path::PathBuf;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use hrlfilter_io::Fill;
use serde::Deserialize;

use crate::classify::normalize_name;
use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Filtration settings. Every section has defaults, so an empty document is valid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FiltrationConfig {
    #[serde(default)]
    pub manifest: ManifestLayout,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub copy: CopyConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub colors: ColorConfig,
}

// ---------------------------------------------------------------------------
// Manifest layout
// ---------------------------------------------------------------------------

/// Sheet and header names. Headers match case-insensitively, ignoring whitespace.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManifestLayout {
    pub summary_sheet: String,
    pub detail_sheet: String,
    pub config_type_column: String,
    pub config_name_column: String,
    pub status_column: String,
    pub paths_column: String,
}

impl Default for ManifestLayout {
    fn default() -> Self {
        Self {
            summary_sheet: "Main".into(),
            detail_sheet: "Business Approved List".into(),
            config_type_column: "Config Type".into(),
            config_name_column: "Config Name".into(),
            status_column: "HRL Available?".into(),
            paths_column: "File Name is correct in Export Sheet".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Literal replacement applied to manifest config names before normalizing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Substitution {
    pub from: String,
    pub to: String,
}

impl Substitution {
    pub fn new(from: &str, to: &str) -> Self {
        Self { from: from.into(), to: to.into() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchingConfig {
    /// Config types in dependency order. Unlisted types are processed last.
    pub load_order: Vec<String>,
    /// Applied in order.
    pub substitutions: Vec<Substitution>,
    /// Treat out-of-order manifest rows as a fatal config error.
    pub enforce_load_order: bool,
}

pub const DEFAULT_LOAD_ORDER: [&str; 15] = [
    "ValueList",
    "AttributeType",
    "UserDefinedTerm",
    "LineOfBusiness",
    "Product",
    "ServiceCategory",
    "BenefitNetwork",
    "NetworkDefinitionComponent",
    "BenefitPlanComponent",
    "WrapAroundBenefitPlan",
    "BenefitPlanRider",
    "BenefitPlanTemplate",
    "Account",
    "BenefitPlan",
    "AccountPlanSelection",
];

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            load_order: DEFAULT_LOAD_ORDER.iter().map(|s| s.to_string()).collect(),
            substitutions: vec![
                Substitution::new("&", "and"),
                Substitution::new("%", "perc"),
                Substitution::new("$", "dollar"),
            ],
            enforce_load_order: false,
        }
    }
}

impl MatchingConfig {
    /// Position of a config type in the load order, compared on normalized names.
    pub fn load_rank(&self, config_type: &str) -> Option<usize> {
        let key = normalize_name(config_type);
        self.load_order.iter().position(|t| normalize_name(t) == key)
    }
}

// ---------------------------------------------------------------------------
// Copy + Output + Colors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CopyConfig {
    /// Retries after a permission failure.
    pub max_retries: u32,
    /// Backoff before retry n is `n * backoff_ms`.
    pub backoff_ms: u64,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_ms: 250,
        }
    }
}

impl CopyConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Base directory for job folders. Defaults to the artifact root's parent.
    pub dir: Option<PathBuf>,
    pub folder_prefix: String,
    /// chrono format string for the folder suffix.
    pub timestamp_format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: None,
            folder_prefix: "HRLS_".into(),
            timestamp_format: "%Y%m%d_%H%M%S".into(),
        }
    }
}

/// Version-density highlight colors, 6-digit RGB hex.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorConfig {
    /// Zero or one catalogued version.
    pub thin: String,
    /// Exactly two versions.
    pub pair: String,
    /// Three or more.
    pub many: String,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            thin: "FFC7CE".into(),
            pair: "C6EFCE".into(),
            many: "BDD7EE".into(),
        }
    }
}

/// Parsed form of [`ColorConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DensityPalette {
    pub thin: Fill,
    pub pair: Fill,
    pub many: Fill,
}

impl DensityPalette {
    /// Fill for a catalogued version count. 0 shares the 1-version color.
    pub fn for_count(&self, versions: usize) -> Fill {
        match versions {
            0 | 1 => self.thin,
            2 => self.pair,
            _ => self.many,
        }
    }
}

impl ColorConfig {
    pub fn palette(&self) -> Result<DensityPalette, ConfigError> {
        let parse = |field: &str, hex: &str| {
            Fill::from_hex(hex).ok_or_else(|| {
                ConfigError::Validation(format!("colors.{field}: '{hex}' is not a 6-digit hex color"))
            })
        };
        Ok(DensityPalette {
            thin: parse("thin", &self.thin)?,
            pair: parse("pair", &self.pair)?,
            many: parse("many", &self.many)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

const MAX_COPY_RETRIES: u32 = 20;

impl FiltrationConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: FiltrationConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.manifest;
        for (field, value) in [
            ("summary_sheet", &m.summary_sheet),
            ("detail_sheet", &m.detail_sheet),
            ("config_type_column", &m.config_type_column),
            ("config_name_column", &m.config_name_column),
            ("status_column", &m.status_column),
            ("paths_column", &m.paths_column),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("manifest.{field} must not be empty")));
            }
        }

        if m.summary_sheet.trim().eq_ignore_ascii_case(m.detail_sheet.trim()) {
            return Err(ConfigError::Validation(
                "manifest.summary_sheet and manifest.detail_sheet must differ".into(),
            ));
        }

        if let Some(sub) = self.matching.substitutions.iter().find(|s| s.from.is_empty()) {
            return Err(ConfigError::Validation(format!(
                "matching.substitutions: empty 'from' (to = \"{}\")",
                sub.to
            )));
        }

        if self.copy.max_retries > MAX_COPY_RETRIES {
            return Err(ConfigError::Validation(format!(
                "copy.max_retries must be at most {MAX_COPY_RETRIES}, got {}",
                self.copy.max_retries
            )));
        }

        if self.output.folder_prefix.contains(&['/', '\\'][..]) {
            return Err(ConfigError::Validation(
                "output.folder_prefix must not contain path separators".into(),
            ));
        }

        let bad_format = StrftimeItems::new(&self.output.timestamp_format).any(|item| matches!(item, Item::Error));
        if bad_format || self.output.timestamp_format.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "output.timestamp_format: '{}' is not a valid strftime format",
                self.output.timestamp_format
            )));
        }

        self.colors.palette()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = FiltrationConfig::from_toml("").unwrap();
        assert_eq!(config.manifest.summary_sheet, "Main");
        assert_eq!(config.manifest.detail_sheet, "Business Approved List");
        assert_eq!(config.matching.load_order.len(), 15);
        assert_eq!(config.matching.substitutions[0], Substitution::new("&", "and"));
        assert_eq!(config.copy.max_retries, 3);
        assert_eq!(config.output.folder_prefix, "HRLS_");
        assert!(!config.matching.enforce_load_order);
    }

    #[test]
    fn parse_overrides() {
        let input = r##"
[manifest]
detail_sheet = "Approved"
status_column = "Status"

[matching]
load_order = ["Product", "Account"]
enforce_load_order = true
substitutions = [
  { from = "+", to = "plus" },
]

[copy]
max_retries = 5
backoff_ms = 10

[output]
dir = "/srv/hrl"

[colors]
many = "#112233"
"##;
        let config = FiltrationConfig::from_toml(input).unwrap();
        assert_eq!(config.manifest.detail_sheet, "Approved");
        assert_eq!(config.manifest.summary_sheet, "Main");
        assert_eq!(config.manifest.status_column, "Status");
        assert_eq!(config.matching.load_order, vec!["Product", "Account"]);
        assert!(config.matching.enforce_load_order);
        assert_eq!(config.matching.substitutions, vec![Substitution::new("+", "plus")]);
        assert_eq!(config.copy.backoff(), Duration::from_millis(10));
        assert_eq!(config.output.dir, Some(PathBuf::from("/srv/hrl")));
        assert_eq!(config.colors.palette().unwrap().many, Fill(0x112233));
    }

    #[test]
    fn load_rank_compares_normalized_names() {
        let matching = MatchingConfig::default();
        assert_eq!(matching.load_rank("ValueList"), Some(0));
        assert_eq!(matching.load_rank("valuelist"), Some(0));
        assert_eq!(matching.load_rank("Service Category"), Some(5));
        assert_eq!(matching.load_rank("Unknown"), None);
    }

    #[test]
    fn palette_by_version_count() {
        let palette = ColorConfig::default().palette().unwrap();
        assert_eq!(palette.for_count(0), Fill(0xFFC7CE));
        assert_eq!(palette.for_count(1), Fill(0xFFC7CE));
        assert_eq!(palette.for_count(2), Fill(0xC6EFCE));
        assert_eq!(palette.for_count(7), Fill(0xBDD7EE));
    }

    #[test]
    fn reject_bad_color() {
        let err = FiltrationConfig::from_toml("[colors]\nthin = \"red\"\n").unwrap_err();
        assert!(err.to_string().contains("colors.thin"));
    }

    #[test]
    fn reject_unknown_key() {
        let err = FiltrationConfig::from_toml("[copy]\nretries = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn reject_same_sheet_names() {
        let err = FiltrationConfig::from_toml("[manifest]\ndetail_sheet = \"main\"\n").unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn reject_empty_substitution() {
        let input = "[matching]\nsubstitutions = [{ from = \"\", to = \"x\" }]\n";
        assert!(FiltrationConfig::from_toml(input).is_err());
    }

    #[test]
    fn reject_bad_timestamp_format() {
        let err = FiltrationConfig::from_toml("[output]\ntimestamp_format = \"%Y%Q\"\n").unwrap_err();
        assert!(err.to_string().contains("timestamp_format"));
    }

    #[test]
    fn reject_excessive_retries() {
        let err = FiltrationConfig::from_toml("[copy]\nmax_retries = 100\n").unwrap_err();
        assert!(err.to_string().contains("max_retries"));
    }
}
