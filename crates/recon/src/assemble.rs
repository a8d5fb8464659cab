//! Output workbook assembly: summary sheet first, annotated detail sheet
//! second, then any other manifest sheets as plain values in their original
//! order.

use std::collections::BTreeMap;

use hrlfilter_io::{SheetData, WorkbookData};

use crate::config::DensityPalette;
use crate::manifest::Manifest;
use crate::model::ManifestRow;

/// Placeholder written into the status fields of appended summary rows.
pub const SUMMARY_PLACEHOLDER: &str = "Pending";

/// One processed artifact folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderSummary {
    pub folder_name: String,
    /// Regular files in the folder, including ones the grammar skipped.
    pub file_count: usize,
}

/// Build the output workbook.
///
/// `densities` maps a detail-sheet row to the catalogued version count for
/// its config name; rows with a name but no entry count as 0.
pub fn assemble(
    manifest: &Manifest,
    rows: &[ManifestRow],
    folders: &[FolderSummary],
    densities: &BTreeMap<usize, usize>,
    palette: &DensityPalette,
) -> WorkbookData {
    let mut output = WorkbookData::new();
    output.push_sheet(summary_sheet(manifest.summary_sheet(), folders));
    output.push_sheet(detail_sheet(manifest, rows, densities, palette));
    for (index, sheet) in manifest.workbook.sheets.iter().enumerate() {
        if index != manifest.summary_index && index != manifest.detail_index {
            output.push_sheet(sheet.clone());
        }
    }
    output
}

fn summary_sheet(original: &SheetData, folders: &[FolderSummary]) -> SheetData {
    let mut sheet = SheetData::new(original.name.clone());
    sheet.rows = original.rows.clone();
    for folder in folders {
        sheet.push_row([
            folder.folder_name.clone(),
            folder.file_count.to_string(),
            SUMMARY_PLACEHOLDER.to_string(),
            SUMMARY_PLACEHOLDER.to_string(),
            SUMMARY_PLACEHOLDER.to_string(),
        ]);
    }
    sheet
}

fn detail_sheet(
    manifest: &Manifest,
    rows: &[ManifestRow],
    densities: &BTreeMap<usize, usize>,
    palette: &DensityPalette,
) -> SheetData {
    let original = manifest.detail_sheet();
    let cols = manifest.columns;

    let mut sheet = SheetData::new(original.name.clone());
    sheet.rows = original.rows.clone();

    for row in rows {
        if let Some(text) = row.hrl_status.cell_text() {
            sheet.set_cell(row.sheet_row, cols.status, text);
            sheet.set_cell(row.sheet_row, cols.paths, row.joined_paths());
        }
        if row.has_name() {
            let versions = densities.get(&row.sheet_row).copied().unwrap_or(0);
            sheet.set_fill(row.sheet_row, cols.config_name, palette.for_count(versions));
        }
    }
    sheet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColorConfig, ManifestLayout};
    use crate::manifest::parse_manifest;
    use crate::model::HrlStatus;
    use hrlfilter_io::Fill;

    fn manifest() -> Manifest {
        let mut wb = WorkbookData::new();
        let mut main = SheetData::new("Main");
        main.push_row(["Config Type", "Files", "Loaded", "Verified", "Signed Off"]);
        wb.push_sheet(main);
        let mut detail = SheetData::new("Business Approved List");
        detail.push_row([
            "Config Type",
            "Config Name",
            "HRL Available?",
            "File Name is correct in Export Sheet",
        ]);
        detail.push_row(["Product", "Alpha", "", "stale"]);
        detail.push_row(["Product", "Gamma", "", ""]);
        detail.push_row(["Product", "", "keep", ""]);
        let mut scratch = SheetData::new("Scratch");
        scratch.push_row(["notes"]);
        wb.push_sheet(scratch);
        wb.push_sheet(detail);
        parse_manifest(wb, &ManifestLayout::default()).unwrap()
    }

    #[test]
    fn summary_first_then_detail_then_the_rest() {
        let m = manifest();
        let folders = vec![FolderSummary {
            folder_name: "Product".into(),
            file_count: 4,
        }];
        let palette = ColorConfig::default().palette().unwrap();
        let out = assemble(&m, &m.rows, &folders, &BTreeMap::new(), &palette);

        assert_eq!(out.sheet_names(), vec!["Main", "Business Approved List", "Scratch"]);
        let summary = &out.sheets[0];
        assert_eq!(summary.rows.len(), 2);
        assert_eq!(summary.rows[1], vec!["Product", "4", "Pending", "Pending", "Pending"]);
        assert_eq!(out.sheets[2].cell(0, 0), "notes");
    }

    #[test]
    fn detail_rows_annotated_and_colored() {
        let m = manifest();
        let mut rows = m.rows.clone();
        rows[0].hrl_status = HrlStatus::Found;
        rows[0].add_match("Product/Product.Alpha.2024-03-01.hrl".into());
        rows[1].hrl_status = HrlStatus::NotFound;

        let densities = BTreeMap::from([(1, 3)]);
        let palette = ColorConfig::default().palette().unwrap();
        let out = assemble(&m, &rows, &[], &densities, &palette);
        let detail = &out.sheets[1];

        assert_eq!(detail.cell(1, 2), "HRL Found");
        assert_eq!(detail.cell(1, 3), "Product/Product.Alpha.2024-03-01.hrl");
        assert_eq!(detail.cell(2, 2), "Not Found");
        assert_eq!(detail.cell(2, 3), "");
        assert_eq!(detail.cell(3, 2), "keep");

        assert_eq!(detail.fill(1, 1), Some(Fill(0xBDD7EE)));
        assert_eq!(detail.fill(2, 1), Some(Fill(0xFFC7CE)));
        assert_eq!(detail.fill(3, 1), None);
    }
}
