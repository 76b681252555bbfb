//! Sheet layout validation and per-region series extraction

use crate::core::cleaner::{clean_cell, NOT_AVAILABLE};
use crate::error::{CycleError, CycleResult};
use crate::types::{Cell, CellGrid, Diagnostic, DiagnosticKind, Period, RegionTable, Series};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// A named value row of a sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRow {
    pub name: String,
    /// 1-based row number, as shown by spreadsheet applications
    pub row: usize,
}

/// Where the period labels and region values live in a sheet.
///
/// Rows are 1-based so a layout can be copied straight from what a
/// spreadsheet application shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLayout {
    pub label_row: usize,
    #[serde(default)]
    pub start_label: Option<String>,
    /// Last period to use, inclusive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_label: Option<String>,
    pub regions: Vec<RegionRow>,
}

impl SheetLayout {
    pub fn new(label_row: usize, regions: Vec<RegionRow>) -> Self {
        Self {
            label_row,
            start_label: None,
            end_label: None,
            regions,
        }
    }

    pub fn starting_at(mut self, label: impl Into<String>) -> Self {
        self.start_label = Some(label.into());
        self
    }

    pub fn ending_at(mut self, label: impl Into<String>) -> Self {
        self.end_label = Some(label.into());
        self
    }

    /// Structural checks that need no sheet
    pub fn check(&self) -> Result<(), String> {
        if self.label_row == 0 {
            return Err("label_row is 1-based and must be at least 1".to_string());
        }
        if self.regions.is_empty() {
            return Err("at least one region row is required".to_string());
        }
        let mut seen = HashSet::new();
        for region in &self.regions {
            if region.row == 0 {
                return Err(format!(
                    "row for region '{}' is 1-based and must be at least 1",
                    region.name
                ));
            }
            if region.row == self.label_row {
                return Err(format!(
                    "region '{}' uses the label row {}",
                    region.name, region.row
                ));
            }
            if !seen.insert(region.name.as_str()) {
                return Err(format!("region '{}' is listed twice", region.name));
            }
        }
        Ok(())
    }

    /// Validate this layout against a concrete sheet
    pub fn validate(&self, grid: &CellGrid) -> CycleResult<()> {
        self.check().map_err(|m| CycleError::layout(&grid.sheet, m))?;

        let height = grid.height();
        if self.label_row > height {
            return Err(CycleError::layout(
                &grid.sheet,
                format!(
                    "label row {} is outside the sheet ({} rows)",
                    self.label_row, height
                ),
            ));
        }
        for region in &self.regions {
            if region.row > height {
                return Err(CycleError::layout(
                    &grid.sheet,
                    format!(
                        "row {} for region '{}' is outside the sheet ({} rows)",
                        region.row, region.name, height
                    ),
                ));
            }
        }

        let has_label = grid
            .row(self.label_row - 1)
            .is_some_and(|cells| cells.iter().any(|c| c.label().is_some()));
        if !has_label {
            return Err(CycleError::layout(
                &grid.sheet,
                format!("label row {} holds no period labels", self.label_row),
            ));
        }
        Ok(())
    }
}

/// Output of [`load_regions`]: the table plus what went wrong on the way
#[derive(Debug, Clone)]
pub struct LoadedSheet {
    pub table: RegionTable,
    pub diagnostics: Vec<Diagnostic>,
}

/// Extract one gap-free series per region from a sheet.
///
/// The start and end labels are searched linearly in the label row. A label
/// that is not found widens the window to the first or last column and is
/// recorded as a `MissingColumn` diagnostic. Columns whose region cells all
/// hold non-numeric text (row headers such as `TIME`) are skipped. Values are
/// cleaned, forward- then backward-filled, and periods where any region is
/// still missing are dropped.
pub fn load_regions(grid: &CellGrid, layout: &SheetLayout) -> CycleResult<LoadedSheet> {
    layout.validate(grid)?;
    let mut diagnostics = Vec::new();

    let label_idx = layout.label_row - 1;
    let width = grid.width();
    let find = |wanted: &str| {
        (0..width).find(|&c| grid.get(label_idx, c).label().as_deref() == Some(wanted))
    };
    let mut missing = |wanted: &str, fallback: &str| {
        let err = CycleError::MissingColumn {
            sheet: grid.sheet.clone(),
            label: wanted.to_string(),
        };
        warn!("{}; {}", err, fallback);
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::MissingColumn,
            &grid.sheet,
            format!("{err}; {fallback}"),
        ));
    };

    let start = match layout.start_label.as_deref() {
        None => 0,
        Some(wanted) => find(wanted).unwrap_or_else(|| {
            missing(wanted, "starting at the first column");
            0
        }),
    };
    let end = match layout.end_label.as_deref() {
        None => width,
        Some(wanted) => match find(wanted) {
            Some(col) if col < start => {
                return Err(CycleError::layout(
                    &grid.sheet,
                    format!(
                        "end label '{}' precedes the start label '{}'",
                        wanted,
                        layout.start_label.as_deref().unwrap_or_default()
                    ),
                ))
            }
            Some(col) => col + 1,
            None => {
                missing(wanted, "ending at the last column");
                width
            }
        },
    };

    let columns: Vec<(usize, Period)> = (start..end)
        .filter_map(|c| grid.get(label_idx, c).label().map(|l| (c, Period::new(l))))
        .filter(|(c, period)| {
            let header = is_header_column(grid, layout, *c);
            if header {
                debug!(sheet = %grid.sheet, column = %period, "skipping header column");
            }
            !header
        })
        .collect();

    let mut seen = HashSet::new();
    for (_, period) in &columns {
        if !seen.insert(period) {
            return Err(CycleError::layout(
                &grid.sheet,
                format!(
                    "period label '{}' appears more than once in row {}",
                    period, layout.label_row
                ),
            ));
        }
    }
    let axis: Vec<Period> = columns.iter().map(|(_, p)| p.clone()).collect();

    let mut unparsed = 0usize;
    let mut series = Vec::with_capacity(layout.regions.len());
    for region in &layout.regions {
        let row_idx = region.row - 1;
        let values = columns
            .iter()
            .map(|(c, _)| {
                let cell = grid.get(row_idx, *c);
                let value = clean_cell(cell);
                if value.is_none()
                    && !cell.is_empty()
                    && cell.label().as_deref().map(str::trim) != Some(NOT_AVAILABLE)
                {
                    unparsed += 1;
                }
                value
            })
            .collect();
        let mut s = Series::from_options(region.name.clone(), &axis, values);
        s.fill_gaps();
        series.push(s);
    }

    if unparsed > 0 {
        let message = format!("{unparsed} cell(s) could not be parsed and were treated as missing");
        warn!(sheet = %grid.sheet, "{}", message);
        diagnostics.push(Diagnostic::new(DiagnosticKind::Conversion, &grid.sheet, message));
    }

    // After filling, a gap can only survive in a region with no values at all
    let keep: Vec<usize> = (0..axis.len())
        .filter(|&i| series.iter().all(|s| s.observations[i].value.is_some()))
        .collect();
    let kept_axis: Vec<Period> = keep.iter().map(|&i| axis[i].clone()).collect();

    let mut table = RegionTable::new(grid.sheet.clone(), kept_axis);
    for s in &series {
        let values = keep
            .iter()
            .filter_map(|&i| s.observations[i].value)
            .collect();
        table.push_region(s.name.clone(), values)?;
    }

    debug!(
        sheet = %grid.sheet,
        periods = table.len(),
        dropped = axis.len() - table.len(),
        "loaded regions"
    );
    Ok(LoadedSheet { table, diagnostics })
}

/// Every region cell holds text that is neither a number nor `:`
fn is_header_column(grid: &CellGrid, layout: &SheetLayout, col: usize) -> bool {
    layout.regions.iter().all(|region| {
        let cell = grid.get(region.row - 1, col);
        matches!(cell, Cell::Text(_))
            && !cell.is_empty()
            && clean_cell(cell).is_none()
            && cell.label().as_deref() != Some(NOT_AVAILABLE)
    })
}
