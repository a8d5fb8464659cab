// Workbook I/O for manifests and annotated output

pub mod workbook;
pub mod xlsx;

pub use workbook::{Fill, SheetData, WorkbookData};
