//! Filename classification: artifact filenames → normalized config names,
//! bucketed by how many versions each name has.
//!
//! Filename grammar (canonical):
//!
//! ```text
//! <ConfigType>.<Name>[.<Name>...][.<YYYY-MM-DD>].<ext>
//! ```
//!
//! The extension is always dropped, and a date-shaped segment right before it
//! is dropped with it. Whatever remains after the config-type prefix, joined
//! back with `.`, is the raw config name. Files that leave no name segment
//! (`Product.hrl`, `README`) are skipped.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::FiltrationError;

/// Strip everything except ASCII letters, digits and `.`, then lowercase.
pub fn normalize_name(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// True for segments shaped like `YYYY-MM-DD`. Shape only; calendar validity
/// is checked when dates are compared.
pub fn is_date_segment(segment: &str) -> bool {
    let b = segment.as_bytes();
    b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter()
            .enumerate()
            .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit())
}

/// Raw (un-normalized) config name of an artifact filename, if it has one.
pub fn raw_config_name(filename: &str) -> Option<String> {
    let parts: Vec<&str> = filename.split('.').collect();
    if parts.len() < 3 {
        return None;
    }

    // Drop extension, then a trailing date if present.
    let mut head = &parts[..parts.len() - 1];
    if head.len() >= 3 && is_date_segment(head[head.len() - 1]) {
        head = &head[..head.len() - 1];
    }

    let name = head[1..].join(".");
    if name.trim().is_empty() {
        return None;
    }
    Some(name)
}

/// Versions catalogued for one normalized name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSet {
    Single(String),
    /// Two or more filenames, in observation order.
    Multi(Vec<String>),
}

impl VersionSet {
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multi(files) => files.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn files(&self) -> Vec<&str> {
        match self {
            Self::Single(f) => vec![f.as_str()],
            Self::Multi(files) => files.iter().map(|f| f.as_str()).collect(),
        }
    }
}

/// Per-folder catalog. A name lives in exactly one state: absent, single or multi.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactCatalog {
    entries: BTreeMap<String, VersionSet>,
    /// Regular files seen, including ones the grammar skipped.
    file_count: usize,
}

impl ArtifactCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify filenames in the order given.
    pub fn from_filenames<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut catalog = Self::new();
        for name in names {
            catalog.observe(name.as_ref());
        }
        catalog
    }

    /// Feed one filename. Promotion to multi happens on the second sighting.
    pub fn observe(&mut self, filename: &str) {
        self.file_count += 1;
        let Some(raw) = raw_config_name(filename) else {
            log::debug!("skipping '{filename}': no config name segment");
            return;
        };
        let key = normalize_name(&raw);
        if key.is_empty() {
            log::debug!("skipping '{filename}': config name normalizes to nothing");
            return;
        }

        let next = match self.entries.remove(&key) {
            None => VersionSet::Single(filename.to_string()),
            Some(VersionSet::Single(first)) => VersionSet::Multi(vec![first, filename.to_string()]),
            Some(VersionSet::Multi(mut files)) => {
                files.push(filename.to_string());
                VersionSet::Multi(files)
            }
        };
        self.entries.insert(key, next);
    }

    pub fn get(&self, normalized: &str) -> Option<&VersionSet> {
        self.entries.get(normalized)
    }

    /// Catalogued versions for a normalized name; 0 when unknown.
    pub fn version_count(&self, normalized: &str) -> usize {
        self.entries.get(normalized).map_or(0, VersionSet::len)
    }

    /// `single[name] -> filename` view.
    pub fn single(&self) -> BTreeMap<&str, &str> {
        self.entries
            .iter()
            .filter_map(|(k, v)| match v {
                VersionSet::Single(f) => Some((k.as_str(), f.as_str())),
                VersionSet::Multi(_) => None,
            })
            .collect()
    }

    /// `multi[name] -> filenames` view.
    pub fn multi(&self) -> BTreeMap<&str, &[String]> {
        self.entries
            .iter()
            .filter_map(|(k, v)| match v {
                VersionSet::Multi(files) => Some((k.as_str(), files.as_slice())),
                VersionSet::Single(_) => None,
            })
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.file_count
    }
}

/// Catalog the regular files directly inside `folder`.
///
/// Entries are visited in filename order so "first seen" is stable across
/// platforms. Subdirectories and non-UTF-8 names are ignored.
pub fn classify(folder: &Path) -> Result<ArtifactCatalog, FiltrationError> {
    let names = list_files(folder)?;
    let catalog = ArtifactCatalog::from_filenames(&names);
    log::debug!(
        "catalogued {}: {} files, {} names ({} multi-version)",
        folder.display(),
        catalog.file_count(),
        catalog.len(),
        catalog.multi().len()
    );
    Ok(catalog)
}

/// Sorted names of regular files directly inside `folder`.
pub fn list_files(folder: &Path) -> Result<Vec<String>, FiltrationError> {
    let entries = fs::read_dir(folder)
        .map_err(|e| FiltrationError::io("cannot read artifact folder", folder, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| FiltrationError::io("cannot read artifact folder", folder, e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| FiltrationError::io("cannot stat", entry.path(), e))?;
        if !file_type.is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => log::warn!("skipping non-UTF-8 filename {:?} in {}", raw, folder.display()),
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_symbols_and_lowercases() {
        assert_eq!(normalize_name("Gold Plan (2024)"), "goldplan2024");
        assert_eq!(normalize_name("Plan_1.5-A"), "plan1.5a");
        assert_eq!(normalize_name("  "), "");
    }

    #[test]
    fn date_segment_shape() {
        assert!(is_date_segment("2024-01-31"));
        assert!(is_date_segment("2024-13-99"));
        assert!(!is_date_segment("2024-1-31"));
        assert!(!is_date_segment("20240131"));
        assert!(!is_date_segment("abcd-ef-gh"));
    }

    #[test]
    fn raw_name_grammar() {
        assert_eq!(raw_config_name("Product.Alpha.2024-01-01.hrl").as_deref(), Some("Alpha"));
        assert_eq!(raw_config_name("Product.Alpha.hrl").as_deref(), Some("Alpha"));
        assert_eq!(
            raw_config_name("Product.Gold.Plan.2024-01-01.hrl").as_deref(),
            Some("Gold.Plan")
        );
        assert_eq!(raw_config_name("Product.Gold.Plan.hrl").as_deref(), Some("Gold.Plan"));
        assert_eq!(raw_config_name("Product.hrl"), None);
        assert_eq!(raw_config_name("README"), None);
        // A lone date after the prefix is the name, not a version stamp.
        assert_eq!(raw_config_name("Product.2024-01-01.hrl").as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn promotion_happens_on_second_file() {
        let mut catalog = ArtifactCatalog::new();
        catalog.observe("Product.Alpha.2024-01-01.hrl");
        assert_eq!(catalog.single().get("alpha"), Some(&"Product.Alpha.2024-01-01.hrl"));
        assert!(catalog.multi().is_empty());

        catalog.observe("Product.alpha.2024-03-01.hrl");
        assert!(catalog.single().get("alpha").is_none());
        assert_eq!(
            catalog.multi().get("alpha").map(|f| f.to_vec()),
            Some(vec![
                "Product.Alpha.2024-01-01.hrl".to_string(),
                "Product.alpha.2024-03-01.hrl".to_string()
            ])
        );

        catalog.observe("Product.ALPHA.2024-05-01.hrl");
        assert_eq!(catalog.version_count("alpha"), 3);
    }

    #[test]
    fn every_name_in_exactly_one_bucket() {
        let catalog = ArtifactCatalog::from_filenames([
            "Product.Alpha.2024-01-01.hrl",
            "Product.Beta.2024-01-01.hrl",
            "Product.Alpha.2024-02-01.hrl",
            "Product.Gamma.hrl",
            "Product.Gamma.2023-01-01.hrl",
            "Product.Gamma.2022-01-01.hrl",
            "notes.txt",
        ]);
        let single = catalog.single();
        let multi = catalog.multi();
        for name in catalog.names() {
            assert!(
                single.contains_key(name) ^ multi.contains_key(name),
                "{name} must be in exactly one bucket"
            );
        }
        assert_eq!(single.keys().copied().collect::<Vec<_>>(), vec!["beta"]);
        assert_eq!(multi.keys().copied().collect::<Vec<_>>(), vec!["alpha", "gamma"]);
        assert_eq!(catalog.file_count(), 7);
    }

    #[test]
    fn classify_reads_only_top_level_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Product.Beta.2024-02-01.hrl"), b"b2").unwrap();
        fs::write(dir.path().join("Product.Beta.2024-01-01.hrl"), b"b1").unwrap();
        fs::write(dir.path().join("Product.hrl"), b"x").unwrap();
        fs::create_dir(dir.path().join("Product.Nested.hrl")).unwrap();

        let catalog = classify(dir.path()).unwrap();
        assert_eq!(catalog.file_count(), 3);
        assert_eq!(
            catalog.get("beta"),
            Some(&VersionSet::Multi(vec![
                "Product.Beta.2024-01-01.hrl".to_string(),
                "Product.Beta.2024-02-01.hrl".to_string(),
            ]))
        );
        assert!(catalog.get("nested").is_none());
    }

    #[test]
    fn classify_missing_folder_is_io_error() {
        let err = classify(Path::new("/nonexistent/hrl-folder")).unwrap_err();
        assert!(matches!(err, FiltrationError::Io { .. }));
    }
}
