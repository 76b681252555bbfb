//! Workbook reader: named sheets -> cell grids

use crate::error::{CycleError, CycleResult};
use crate::types::{Cell, CellGrid};
use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Anything that hands out sheets by name
pub trait SheetSource {
    /// Names of all sheets, in workbook order
    fn sheet_names(&self) -> Vec<String>;

    /// Read one sheet as a grid anchored at A1
    fn sheet(&mut self, name: &str) -> CycleResult<CellGrid>;
}

/// Sheets of an .xlsx / .xls / .ods workbook
pub struct WorkbookSource {
    path: PathBuf,
    workbook: Sheets<BufReader<File>>,
}

impl WorkbookSource {
    /// Open a workbook; the format is detected from the extension
    pub fn open<P: AsRef<Path>>(path: P) -> CycleResult<Self> {
        let path = path.as_ref().to_path_buf();
        let workbook = open_workbook_auto(&path).map_err(|e| {
            CycleError::Import(format!("Failed to open workbook {}: {}", path.display(), e))
        })?;
        Ok(Self { path, workbook })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SheetSource for WorkbookSource {
    fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names().to_vec()
    }

    fn sheet(&mut self, name: &str) -> CycleResult<CellGrid> {
        let range = self.workbook.worksheet_range(name).map_err(|e| {
            CycleError::Import(format!(
                "Failed to read sheet '{}' from {}: {}",
                name,
                self.path.display(),
                e
            ))
        })?;
        Ok(range_to_grid(name, &range))
    }
}

/// Convert a calamine range to a grid whose (0, 0) is cell A1.
///
/// calamine ranges start at the first used cell, so leading empty rows and
/// columns are restored to keep spreadsheet row numbers meaningful.
fn range_to_grid(name: &str, range: &Range<Data>) -> CellGrid {
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; col_offset];
        cells.extend(row.iter().map(convert_cell));
        rows.push(cells);
    }
    CellGrid::new(name, rows)
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::String(s) => Cell::Text(s.clone()),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        _ => Cell::Empty,
    }
}

/// Sheets held in memory, for data produced by other readers and for tests
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    order: Vec<String>,
    sheets: HashMap<String, CellGrid>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, grid: CellGrid) {
        if !self.sheets.contains_key(&grid.sheet) {
            self.order.push(grid.sheet.clone());
        }
        self.sheets.insert(grid.sheet.clone(), grid);
    }

    pub fn with_sheet(mut self, grid: CellGrid) -> Self {
        self.insert(grid);
        self
    }
}

impl SheetSource for MemorySource {
    fn sheet_names(&self) -> Vec<String> {
        self.order.clone()
    }

    fn sheet(&mut self, name: &str) -> CycleResult<CellGrid> {
        self.sheets
            .get(name)
            .cloned()
            .ok_or_else(|| CycleError::Import(format!("Sheet '{}' not found", name)))
    }
}
