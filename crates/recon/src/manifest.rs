//! Manifest loading, load-order checks and partition planning.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use hrlfilter_io::{xlsx, SheetData, WorkbookData};

use crate::classify::normalize_name;
use crate::config::{ManifestLayout, MatchingConfig};
use crate::error::{ConfigError, FiltrationError};
use crate::model::ManifestRow;

/// Column positions in the detail sheet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestColumns {
    pub config_type: usize,
    pub config_name: usize,
    pub status: usize,
    pub paths: usize,
}

/// A loaded manifest: the source workbook plus the rows parsed from its detail sheet.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub workbook: WorkbookData,
    pub summary_index: usize,
    pub detail_index: usize,
    pub columns: ManifestColumns,
    pub rows: Vec<ManifestRow>,
}

impl Manifest {
    pub fn summary_sheet(&self) -> &SheetData {
        &self.workbook.sheets[self.summary_index]
    }

    pub fn detail_sheet(&self) -> &SheetData {
        &self.workbook.sheets[self.detail_index]
    }
}

/// Read a manifest workbook from disk and validate its layout.
pub fn load_manifest(path: &Path, layout: &ManifestLayout) -> Result<Manifest, FiltrationError> {
    if !path.is_file() {
        return Err(FiltrationError::io(
            "cannot open manifest",
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        ));
    }
    let workbook = xlsx::import(path)
        .map_err(|e| FiltrationError::Workbook(format!("{}: {e}", path.display())))?;
    Ok(parse_manifest(workbook, layout)?)
}

/// Validate sheets and columns, then parse every detail row.
pub fn parse_manifest(workbook: WorkbookData, layout: &ManifestLayout) -> Result<Manifest, ConfigError> {
    let find_sheet = |name: &str| {
        workbook.sheet_index(name).ok_or_else(|| ConfigError::MissingSheet {
            sheet: name.to_string(),
            available: workbook.sheet_names().iter().map(|s| s.to_string()).collect(),
        })
    };
    let summary_index = find_sheet(&layout.summary_sheet)?;
    let detail_index = find_sheet(&layout.detail_sheet)?;

    let detail = &workbook.sheets[detail_index];
    let column = |name: &str| {
        detail.find_column(name).ok_or_else(|| ConfigError::MissingColumn {
            sheet: detail.name.clone(),
            column: name.to_string(),
        })
    };
    let columns = ManifestColumns {
        config_type: column(&layout.config_type_column)?,
        config_name: column(&layout.config_name_column)?,
        status: column(&layout.status_column)?,
        paths: column(&layout.paths_column)?,
    };

    let rows = (1..detail.rows.len())
        .map(|r| {
            ManifestRow::new(
                r,
                detail.cell(r, columns.config_type).trim(),
                detail.cell(r, columns.config_name).trim(),
            )
        })
        .collect();

    Ok(Manifest {
        workbook,
        summary_index,
        detail_index,
        columns,
        rows,
    })
}

// ============================================================================
// Load order
// ============================================================================

/// A row whose config type must load before a type listed above it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOrderViolation {
    pub sheet_row: usize,
    pub config_type: String,
    /// The later-loading type that precedes it.
    pub after: String,
}

impl std::fmt::Display for LoadOrderViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "row {}: '{}' listed after '{}'",
            self.sheet_row + 1,
            self.config_type,
            self.after
        )
    }
}

/// Rows out of dependency order. Types outside the load order are ignored.
pub fn check_load_order(rows: &[ManifestRow], matching: &MatchingConfig) -> Vec<LoadOrderViolation> {
    let mut violations = Vec::new();
    let mut highest: Option<(usize, &str)> = None;

    for row in rows {
        let Some(rank) = matching.load_rank(&row.config_type) else {
            continue;
        };
        match highest {
            Some((top, top_type)) if rank < top => violations.push(LoadOrderViolation {
                sheet_row: row.sheet_row,
                config_type: row.config_type.clone(),
                after: top_type.to_string(),
            }),
            Some((top, _)) if rank == top => {}
            _ => highest = Some((rank, row.config_type.as_str())),
        }
    }
    violations
}

// ============================================================================
// Partitions
// ============================================================================

/// One config type's rows and the artifact folder backing them, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Normalized config type.
    pub key: String,
    /// Config type as first written in the manifest.
    pub config_type: String,
    pub folder: Option<PathBuf>,
    /// Indices into the manifest row list, in sheet order.
    pub rows: Vec<usize>,
}

impl Partition {
    /// On-disk folder name, used for the output subfolder and the summary sheet.
    pub fn folder_name(&self) -> Option<String> {
        self.folder
            .as_ref()
            .and_then(|f| f.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }
}

/// Group rows by config type and pair each type with its folder under
/// `artifact_root` (matched on normalized names).
///
/// Known types come first in load order; the rest follow alphabetically.
pub fn plan_partitions(
    rows: &[ManifestRow],
    artifact_root: &Path,
    matching: &MatchingConfig,
) -> Result<Vec<Partition>, FiltrationError> {
    let folders = artifact_folders(artifact_root)?;

    let mut by_key: BTreeMap<String, Partition> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        let key = normalize_name(&row.config_type);
        by_key
            .entry(key.clone())
            .or_insert_with(|| Partition {
                folder: folders.get(&key).cloned(),
                key,
                config_type: row.config_type.clone(),
                rows: Vec::new(),
            })
            .rows
            .push(i);
    }

    let mut partitions: Vec<Partition> = by_key.into_values().collect();
    partitions.sort_by_key(|p| (matching.load_rank(&p.config_type).unwrap_or(usize::MAX), p.key.clone()));

    for p in &partitions {
        if p.folder.is_none() && !p.key.is_empty() {
            log::warn!(
                "no folder for config type '{}' under {}; its {} row(s) will be not found",
                p.config_type,
                artifact_root.display(),
                p.rows.len()
            );
        }
    }
    Ok(partitions)
}

/// Subdirectories of the artifact root keyed by normalized name. On a
/// normalization clash the first folder in name order wins.
fn artifact_folders(artifact_root: &Path) -> Result<BTreeMap<String, PathBuf>, FiltrationError> {
    let entries = fs::read_dir(artifact_root)
        .map_err(|e| FiltrationError::io("cannot read artifact root", artifact_root, e))?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| FiltrationError::io("cannot read artifact root", artifact_root, e))?;
        if entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();

    let mut folders: BTreeMap<String, PathBuf> = BTreeMap::new();
    for dir in dirs {
        let Some(name) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let key = normalize_name(&name);
        if key.is_empty() {
            continue;
        }
        if let Some(existing) = folders.get(&key) {
            log::warn!("folder {} shadowed by {}", dir.display(), existing.display());
            continue;
        }
        folders.insert(key, dir);
    }
    Ok(folders)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workbook(detail_header: &[&str], detail_rows: &[&[&str]]) -> WorkbookData {
        let mut wb = WorkbookData::new();
        let mut main = SheetData::new("Main");
        main.push_row(["Config Type", "Count"]);
        wb.push_sheet(main);
        let mut detail = SheetData::new("Business Approved List");
        detail.push_row(detail_header.iter().copied());
        for row in detail_rows {
            detail.push_row(row.iter().copied());
        }
        wb.push_sheet(detail);
        wb
    }

    const HEADER: [&str; 4] = [
        "Config Type",
        "Config Name",
        "HRL Available?",
        "File Name is correct in Export Sheet",
    ];

    #[test]
    fn parses_rows_with_tolerant_headers() {
        let wb = workbook(
            &[" config type", "CONFIG NAME ", "hrl available?", "file name is correct in export sheet", "Notes"],
            &[&["Product", " Alpha ", "", "", "x"], &["Account", "", "", ""]],
        );
        let manifest = parse_manifest(wb, &ManifestLayout::default()).unwrap();
        assert_eq!(manifest.columns.status, 2);
        assert_eq!(manifest.rows.len(), 2);
        assert_eq!(manifest.rows[0].config_name, "Alpha");
        assert_eq!(manifest.rows[0].sheet_row, 1);
        assert!(!manifest.rows[1].has_name());
    }

    #[test]
    fn missing_column_is_config_error() {
        let wb = workbook(&HEADER[..3], &[]);
        match parse_manifest(wb, &ManifestLayout::default()).unwrap_err() {
            ConfigError::MissingColumn { column, .. } => {
                assert_eq!(column, "File Name is correct in Export Sheet")
            }
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn missing_sheet_lists_available() {
        let mut wb = WorkbookData::new();
        wb.push_sheet(SheetData::new("Main"));
        match parse_manifest(wb, &ManifestLayout::default()).unwrap_err() {
            ConfigError::MissingSheet { sheet, available } => {
                assert_eq!(sheet, "Business Approved List");
                assert_eq!(available, vec!["Main"]);
            }
            other => panic!("expected MissingSheet, got {other:?}"),
        }
    }

    #[test]
    fn load_order_flags_rows_that_go_backwards() {
        let rows = vec![
            ManifestRow::new(1, "ValueList", "a"),
            ManifestRow::new(2, "Product", "b"),
            ManifestRow::new(3, "Custom", "c"),
            ManifestRow::new(4, "Product", "d"),
            ManifestRow::new(5, "AttributeType", "e"),
            ManifestRow::new(6, "Account", "f"),
        ];
        let violations = check_load_order(&rows, &MatchingConfig::default());
        assert_eq!(
            violations,
            vec![LoadOrderViolation {
                sheet_row: 5,
                config_type: "AttributeType".into(),
                after: "Product".into(),
            }]
        );
        assert_eq!(violations[0].to_string(), "row 6: 'AttributeType' listed after 'Product'");
    }

    #[test]
    fn partitions_follow_load_order_and_match_folders() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("Product")).unwrap();
        fs::create_dir(root.path().join("value_list")).unwrap();
        fs::create_dir(root.path().join("Zeta")).unwrap();
        fs::write(root.path().join("Account"), b"not a folder").unwrap();

        let rows = vec![
            ManifestRow::new(1, "Zeta", "z"),
            ManifestRow::new(2, "Product", "p1"),
            ManifestRow::new(3, "Account", "a"),
            ManifestRow::new(4, "ValueList", "v"),
            ManifestRow::new(5, "product", "p2"),
        ];
        let parts = plan_partitions(&rows, root.path(), &MatchingConfig::default()).unwrap();
        let order: Vec<&str> = parts.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(order, vec!["valuelist", "product", "account", "zeta"]);

        assert_eq!(parts[0].folder_name().as_deref(), Some("value_list"));
        assert_eq!(parts[1].rows, vec![1, 4]);
        assert!(parts[2].folder.is_none());
        assert_eq!(parts[3].folder_name().as_deref(), Some("Zeta"));
    }

    #[test]
    fn missing_artifact_root_is_io_error() {
        let err = plan_partitions(&[], Path::new("/nonexistent/hrl-root"), &MatchingConfig::default())
            .unwrap_err();
        assert!(matches!(err, FiltrationError::Io { .. }));
    }
}
