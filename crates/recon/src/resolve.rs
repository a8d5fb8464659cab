use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::classify::{normalize_name, ArtifactCatalog, VersionSet};
use crate::config::Substitution;
use crate::model::VersionPolicy;

/// A candidate file with the date pulled from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedCandidate {
    pub filename: String,
    pub extracted_date: Option<NaiveDate>,
}

impl VersionedCandidate {
    pub fn new(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            extracted_date: extract_date(filename),
        }
    }

    /// Undated files sort as the earliest possible date.
    pub fn sort_date(&self) -> NaiveDate {
        self.extracted_date.unwrap_or(NaiveDate::MIN)
    }
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\.(\d{4}-\d{2}-\d{2})\.").expect("static date regex"))
}

/// First dot-delimited `YYYY-MM-DD` segment, if it is a real calendar date.
pub fn extract_date(filename: &str) -> Option<NaiveDate> {
    let caps = date_pattern().captures(filename)?;
    NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok()
}

/// Apply literal substitutions in order.
pub fn apply_substitutions(name: &str, substitutions: &[Substitution]) -> String {
    substitutions
        .iter()
        .fold(name.to_string(), |acc, sub| acc.replace(&sub.from, &sub.to))
}

/// Catalog key for a manifest config name: substitutions, then normalization.
pub fn lookup_key(config_name: &str, substitutions: &[Substitution]) -> String {
    normalize_name(&apply_substitutions(config_name, substitutions))
}

/// Pick the files satisfying a manifest config name under `policy`.
///
/// Empty means not found. Multi-version candidates are ordered by date with a
/// stable sort, so equal dates keep observation order: `Latest` takes the
/// last of the newest, `Oldest` the first of the oldest, `All` returns every
/// candidate oldest first.
pub fn resolve(
    config_name: &str,
    catalog: &ArtifactCatalog,
    policy: VersionPolicy,
    substitutions: &[Substitution],
) -> Vec<String> {
    let key = lookup_key(config_name, substitutions);
    if key.is_empty() {
        return Vec::new();
    }

    match catalog.get(&key) {
        None => Vec::new(),
        Some(VersionSet::Single(file)) => vec![file.clone()],
        Some(VersionSet::Multi(files)) => {
            let mut dated: Vec<VersionedCandidate> =
                files.iter().map(|f| VersionedCandidate::new(f)).collect();
            dated.sort_by_key(VersionedCandidate::sort_date);

            match policy {
                VersionPolicy::Latest => dated.pop().map(|c| vec![c.filename]).unwrap_or_default(),
                VersionPolicy::Oldest => dated
                    .into_iter()
                    .next()
                    .map(|c| vec![c.filename])
                    .unwrap_or_default(),
                VersionPolicy::All => dated.into_iter().map(|c| c.filename).collect(),
            }
        }
    }
}
