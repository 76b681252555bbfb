//! Workbook input and output
//!
//! - Import: .xlsx / .xls / .ods sheets -> cell grids (calamine)
//! - Export: analysis results -> .xlsx with native line charts (rust_xlsxwriter)

mod exporter;
mod importer;

pub use exporter::{sheet_name, WorkbookExporter};
pub use importer::{MemorySource, SheetSource, WorkbookSource};
