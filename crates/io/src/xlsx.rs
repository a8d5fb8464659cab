// Excel manifest import (xlsx, xls, xlsb, ods) and export (xlsx only)
//
// Import: every sheet becomes a grid of display strings. Formulas are read
//         by their cached values; styling is dropped.
// Export: fresh workbook, sheets written in order. Only background fills and
//         a bold header row are carried.

use std::path::Path;
use std::time::Instant;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use chrono::{Duration, NaiveDate};
use rust_xlsxwriter::{Color, Format, Workbook as XlsxWorkbook};

use crate::workbook::{SheetData, WorkbookData};

/// Manifests are small; anything past this is almost certainly a mistake.
const MAX_ROWS: usize = 1_048_576;
const MAX_COLS: usize = 16_384;

/// Result of an Excel export operation
#[derive(Debug, Default)]
pub struct ExportResult {
    pub sheets_exported: usize,
    pub cells_exported: usize,
    pub fills_exported: usize,
    pub export_duration_ms: u128,
}

/// Import an Excel workbook into plain string grids.
pub fn import(path: &Path) -> Result<WorkbookData, String> {
    let mut workbook: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| format!("Failed to open Excel file: {}", e))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err("Excel file contains no sheets".to_string());
    }

    let mut result = WorkbookData::new();

    for sheet_name in &sheet_names {
        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| format!("Failed to read sheet '{}': {}", sheet_name, e))?;

        let mut sheet = SheetData::new(sheet_name.clone());
        let (height, width) = range.get_size();
        if height == 0 || width == 0 {
            result.push_sheet(sheet);
            continue;
        }

        // Range start offset (data may not begin at A1)
        let (start_row, start_col) = range.start().unwrap_or((0, 0));

        for (row_idx, row) in range.rows().enumerate() {
            let target_row = start_row as usize + row_idx;
            if target_row >= MAX_ROWS {
                break;
            }
            for (col_idx, cell) in row.iter().enumerate() {
                let target_col = start_col as usize + col_idx;
                if target_col >= MAX_COLS {
                    break;
                }
                let text = cell_text(cell);
                if !text.is_empty() {
                    sheet.set_cell(target_row, target_col, text);
                }
            }
        }

        result.push_sheet(sheet);
    }

    Ok(result)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            // Format nicely: integers without decimals
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::Error(e) => format!("#{:?}", e),
        Data::DateTime(dt) => serial_to_text(dt.as_f64()),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

/// Render an Excel date serial (1900 system) as ISO text.
fn serial_to_text(serial: f64) -> String {
    let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30) else {
        return serial.to_string();
    };
    let days = serial.floor();
    let seconds = ((serial - days) * 86_400.0).round() as i64;
    let Some(date) = epoch.checked_add_signed(Duration::days(days as i64)) else {
        return serial.to_string();
    };
    if seconds == 0 {
        return date.format("%Y-%m-%d").to_string();
    }
    match date.and_hms_opt(0, 0, 0) {
        Some(midnight) => (midnight + Duration::seconds(seconds))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => date.format("%Y-%m-%d").to_string(),
    }
}

/// Export sheets to an XLSX file, preserving sheet order.
pub fn export(workbook: &WorkbookData, path: &Path) -> Result<ExportResult, String> {
    let start_time = Instant::now();
    let mut result = ExportResult::default();

    if workbook.sheets.is_empty() {
        return Err("Workbook has no sheets to export".to_string());
    }

    let mut xlsx_workbook = XlsxWorkbook::new();
    let header_format = Format::new().set_bold();

    for sheet in &workbook.sheets {
        let worksheet = xlsx_workbook
            .add_worksheet()
            .set_name(&sheet.name)
            .map_err(|e| format!("Failed to create sheet '{}': {}", sheet.name, e))?;

        for (row_idx, row) in sheet.rows.iter().enumerate() {
            if row_idx >= MAX_ROWS {
                break;
            }
            for (col_idx, value) in row.iter().enumerate() {
                if col_idx >= MAX_COLS {
                    break;
                }
                let fill = sheet.fill(row_idx, col_idx);
                if value.is_empty() && fill.is_none() {
                    continue;
                }

                let mut format = if row_idx == 0 { header_format.clone() } else { Format::new() };
                if let Some(fill) = fill {
                    format = format.set_background_color(Color::RGB(fill.rgb()));
                    result.fills_exported += 1;
                }

                let (r, c) = (row_idx as u32, col_idx as u16);
                if value.is_empty() {
                    worksheet
                        .write_blank(r, c, &format)
                        .map_err(|e| format!("Failed to write cell ({}, {}): {}", r, c, e))?;
                } else {
                    worksheet
                        .write_string_with_format(r, c, value, &format)
                        .map_err(|e| format!("Failed to write cell ({}, {}): {}", r, c, e))?;
                    result.cells_exported += 1;
                }
            }
        }

        // Fills on cells past the end of a row (no text) still need writing.
        for (&(row_idx, col_idx), fill) in &sheet.fills {
            let has_cell = sheet.rows.get(row_idx).map_or(false, |r| col_idx < r.len());
            if has_cell {
                continue;
            }
            let format = Format::new().set_background_color(Color::RGB(fill.rgb()));
            worksheet
                .write_blank(row_idx as u32, col_idx as u16, &format)
                .map_err(|e| format!("Failed to write fill ({}, {}): {}", row_idx, col_idx, e))?;
            result.fills_exported += 1;
        }

        result.sheets_exported += 1;
    }

    if let Ok(ws) = xlsx_workbook.worksheet_from_index(0) {
        let _ = ws.set_active(true);
    }

    xlsx_workbook
        .save(path)
        .map_err(|e| format!("Failed to save XLSX file: {}", e))?;

    result.export_duration_ms = start_time.elapsed().as_millis();
    Ok(result)
}
