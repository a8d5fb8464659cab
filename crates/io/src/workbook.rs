// In-memory workbook model shared by import and export.
//
// Deliberately flat: every cell is text, and the only styling carried is a
// solid background fill. The manifest format needs nothing more.

use std::collections::BTreeMap;

/// Solid background fill as 0xRRGGBB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fill(pub u32);

impl Fill {
    /// Parse a 6-digit hex color (`"FFC7CE"`, optional leading `#`).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 {
            return None;
        }
        u32::from_str_radix(digits, 16).ok().map(Fill)
    }

    pub fn rgb(&self) -> u32 {
        self.0
    }
}

/// One worksheet as a dense grid of strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetData {
    pub name: String,
    pub rows: Vec<Vec<String>>,
    /// Background fills keyed by (row, col), both 0-based.
    pub fills: BTreeMap<(usize, usize), Fill>,
}

impl SheetData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
            fills: BTreeMap::new(),
        }
    }

    /// Header row (row 0), or an empty slice for an empty sheet.
    pub fn header(&self) -> &[String] {
        self.rows.first().map(|r| r.as_slice()).unwrap_or(&[])
    }

    /// Locate a header column by name. Case-insensitive, ignores surrounding whitespace.
    pub fn find_column(&self, name: &str) -> Option<usize> {
        let target = name.trim().to_lowercase();
        self.header()
            .iter()
            .position(|h| h.trim().to_lowercase() == target)
    }

    /// Cell text, `""` when out of range.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    /// Set a cell, growing the grid as needed.
    pub fn set_cell(&mut self, row: usize, col: usize, value: impl Into<String>) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let r = &mut self.rows[row];
        if r.len() <= col {
            r.resize(col + 1, String::new());
        }
        r[col] = value.into();
    }

    pub fn push_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    pub fn set_fill(&mut self, row: usize, col: usize, fill: Fill) {
        self.fills.insert((row, col), fill);
    }

    pub fn fill(&self, row: usize, col: usize) -> Option<Fill> {
        self.fills.get(&(row, col)).copied()
    }

    /// Number of rows below the header.
    pub fn data_row_count(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }
}

/// Ordered collection of sheets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkbookData {
    pub sheets: Vec<SheetData>,
}

impl WorkbookData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Find a sheet by exact name, falling back to a trimmed case-insensitive match.
    pub fn sheet(&self, name: &str) -> Option<&SheetData> {
        self.sheet_index(name).map(|i| &self.sheets[i])
    }

    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        if let Some(i) = self.sheets.iter().position(|s| s.name == name) {
            return Some(i);
        }
        let target = name.trim().to_lowercase();
        self.sheets
            .iter()
            .position(|s| s.name.trim().to_lowercase() == target)
    }

    pub fn push_sheet(&mut self, sheet: SheetData) {
        self.sheets.push(sheet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_from_hex() {
        assert_eq!(Fill::from_hex("FFC7CE"), Some(Fill(0xFFC7CE)));
        assert_eq!(Fill::from_hex("#bdd7ee"), Some(Fill(0xBDD7EE)));
        assert_eq!(Fill::from_hex("FFC7C"), None);
        assert_eq!(Fill::from_hex("GGGGGG"), None);
    }

    #[test]
    fn find_column_ignores_case_and_whitespace() {
        let mut sheet = SheetData::new("List");
        sheet.push_row(["  Config Type ", "CONFIG NAME", "HRL Available?"]);
        assert_eq!(sheet.find_column("config type"), Some(0));
        assert_eq!(sheet.find_column("Config Name"), Some(1));
        assert_eq!(sheet.find_column(" hrl available? "), Some(2));
        assert_eq!(sheet.find_column("Missing"), None);
    }

    #[test]
    fn set_cell_grows_grid() {
        let mut sheet = SheetData::new("S");
        sheet.set_cell(2, 3, "x");
        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.cell(2, 3), "x");
        assert_eq!(sheet.cell(0, 0), "");
        assert_eq!(sheet.cell(9, 9), "");
    }

    #[test]
    fn sheet_lookup_falls_back_to_case_insensitive() {
        let mut wb = WorkbookData::new();
        wb.push_sheet(SheetData::new("Main"));
        wb.push_sheet(SheetData::new("Business Approved List "));
        assert_eq!(wb.sheet_index("Main"), Some(0));
        assert_eq!(wb.sheet_index("business approved list"), Some(1));
        assert!(wb.sheet("Other").is_none());
    }
}
