//! Workbook exporter: decompositions, cycles and volatility with line charts

use crate::core::pipeline::{AnalysisReport, RegionVolatility, VariableAnalysis};
use crate::error::{CycleError, CycleResult};
use crate::report::Emitter;
use crate::types::{merge_periods, Period, Series};
use rust_xlsxwriter::{Chart, ChartType, Format, Workbook, Worksheet, XlsxError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// File name of the exported workbook inside the output directory
pub const WORKBOOK_FILE: &str = "cycles.xlsx";

const MAX_SHEET_NAME: usize = 31;
const FORBIDDEN: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];
/// Rows taken by one chart at the default size
const CHART_ROWS: u32 = 16;

/// Writes one sheet per variable (actual, trend and cycle per region), one
/// `Cycles <region>` sheet per region and a `Volatility` sheet.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkbookExporter;

impl WorkbookExporter {
    pub fn new() -> Self {
        Self
    }

    /// Export the report to an .xlsx file
    pub fn export(&self, report: &AnalysisReport, output_path: &Path) -> CycleResult<()> {
        let mut workbook = Workbook::new();
        let mut used = HashSet::new();
        let header = Format::new().set_bold();

        for variable in &report.variables {
            let name = sheet_name(&variable.name, &mut used);
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&name).map_err(|e| export_err("set worksheet name", e))?;
            write_variable(worksheet, &name, variable, &header)?;
        }

        for region in &report.regions {
            let name = sheet_name(&format!("Cycles {region}"), &mut used);
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&name).map_err(|e| export_err("set worksheet name", e))?;
            write_region_cycles(worksheet, &name, region, &report.variables, &header)?;
        }

        if !report.volatility.is_empty() {
            let name = sheet_name("Volatility", &mut used);
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&name).map_err(|e| export_err("set worksheet name", e))?;
            write_volatility(worksheet, &report.volatility, &header)?;
        }

        workbook
            .save(output_path)
            .map_err(|e| CycleError::Export(format!("Failed to save Excel file: {}", e)))?;
        Ok(())
    }
}

impl Emitter for WorkbookExporter {
    fn name(&self) -> &'static str {
        "workbook"
    }

    fn emit(&self, report: &AnalysisReport, out_dir: &Path) -> CycleResult<Vec<PathBuf>> {
        let path = out_dir.join(WORKBOOK_FILE);
        self.export(report, &path)?;
        Ok(vec![path])
    }
}

fn export_err(action: &str, e: XlsxError) -> CycleError {
    CycleError::Export(format!("Failed to {}: {}", action, e))
}

/// A worksheet name Excel accepts, unique within `used`.
///
/// Forbidden characters become `_`, names are cut to 31 characters and
/// clashes get a ` (n)` suffix.
pub fn sheet_name(name: &str, used: &mut HashSet<String>) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches('\'').trim();
    let base: String = if cleaned.is_empty() {
        "Sheet".to_string()
    } else {
        cleaned.chars().take(MAX_SHEET_NAME).collect()
    };

    let mut candidate = base.clone();
    let mut n = 2;
    while used.contains(&candidate.to_lowercase()) {
        let suffix = format!(" ({n})");
        let keep = MAX_SHEET_NAME - suffix.chars().count();
        candidate = format!("{}{}", base.chars().take(keep).collect::<String>(), suffix);
        n += 1;
    }
    used.insert(candidate.to_lowercase());
    candidate
}

fn write_periods(worksheet: &mut Worksheet, periods: &[Period], header: &Format) -> CycleResult<()> {
    worksheet
        .write_string_with_format(0, 0, "Period", header)
        .map_err(|e| export_err("write header", e))?;
    for (i, period) in periods.iter().enumerate() {
        worksheet
            .write_string(i as u32 + 1, 0, period.as_str())
            .map_err(|e| export_err("write period", e))?;
    }
    worksheet
        .set_column_width(0, 12)
        .map_err(|e| export_err("set column width", e))?;
    Ok(())
}

/// Write `series` into column `col` under `title`, aligned on `periods`;
/// periods the series lacks stay blank
fn write_column(
    worksheet: &mut Worksheet,
    col: u16,
    title: &str,
    periods: &[Period],
    series: &Series,
    header: &Format,
) -> CycleResult<()> {
    worksheet
        .write_string_with_format(0, col, title, header)
        .map_err(|e| export_err("write header", e))?;
    for (i, period) in periods.iter().enumerate() {
        if let Some(value) = series.get(period) {
            worksheet
                .write_number(i as u32 + 1, col, value)
                .map_err(|e| export_err(&format!("write value in column {}", title), e))?;
        }
    }
    worksheet
        .set_column_width(col, 16)
        .map_err(|e| export_err("set column width", e))?;
    Ok(())
}

fn line_chart(title: &str, y_axis: &str) -> Chart {
    let mut chart = Chart::new(ChartType::Line);
    chart.title().set_name(title);
    chart.x_axis().set_name("Period");
    chart.y_axis().set_name(y_axis);
    chart
}

fn write_variable(
    worksheet: &mut Worksheet,
    sheet: &str,
    variable: &VariableAnalysis,
    header: &Format,
) -> CycleResult<()> {
    let Some(first) = variable.decompositions.first() else {
        return Ok(());
    };
    let periods = first.actual.periods();
    let last_row = periods.len() as u32;
    write_periods(worksheet, &periods, header)?;

    let chart_col = 3 * variable.decompositions.len() as u16 + 2;
    for (k, d) in variable.decompositions.iter().enumerate() {
        let col = 1 + 3 * k as u16;
        write_column(worksheet, col, &format!("{} actual", d.region), &periods, &d.actual, header)?;
        write_column(
            worksheet,
            col + 1,
            &format!("{} trend", d.region),
            &periods,
            &d.decomposition.trend,
            header,
        )?;
        write_column(
            worksheet,
            col + 2,
            &format!("{} cycle", d.region),
            &periods,
            &d.decomposition.cycle,
            header,
        )?;

        let mut levels = line_chart(&format!("{} - {}: actual and trend", variable.name, d.region), "Level");
        for (offset, label) in [(0u16, "Actual"), (1, "HP trend")] {
            levels
                .add_series()
                .set_categories((sheet, 1, 0, last_row, 0))
                .set_values((sheet, 1, col + offset, last_row, col + offset))
                .set_name(label);
        }
        let mut cycle = line_chart(&format!("{} - {}: cycle", variable.name, d.region), "Deviation from trend");
        cycle
            .add_series()
            .set_categories((sheet, 1, 0, last_row, 0))
            .set_values((sheet, 1, col + 2, last_row, col + 2))
            .set_name("Cycle");

        let row = 1 + 2 * k as u32 * CHART_ROWS;
        worksheet
            .insert_chart(row, chart_col, &levels)
            .map_err(|e| export_err("insert chart", e))?;
        worksheet
            .insert_chart(row + CHART_ROWS, chart_col, &cycle)
            .map_err(|e| export_err("insert chart", e))?;
    }
    Ok(())
}

fn write_region_cycles(
    worksheet: &mut Worksheet,
    sheet: &str,
    region: &str,
    variables: &[VariableAnalysis],
    header: &Format,
) -> CycleResult<()> {
    let cycles: Vec<(&str, &Series)> = variables
        .iter()
        .filter_map(|v| v.decomposition(region).map(|d| (v.name.as_str(), &d.decomposition.cycle)))
        .collect();
    if cycles.is_empty() {
        return Ok(());
    }
    let axes: Vec<Vec<Period>> = cycles.iter().map(|(_, cycle)| cycle.periods()).collect();
    let periods = merge_periods(axes.iter().map(Vec::as_slice));
    let last_row = periods.len() as u32;
    write_periods(worksheet, &periods, header)?;

    let mut chart = line_chart(&format!("Cyclical components - {region}"), "Deviation from trend");
    for (k, (name, cycle)) in cycles.iter().enumerate() {
        let col = 1 + k as u16;
        write_column(worksheet, col, name, &periods, cycle, header)?;
        chart
            .add_series()
            .set_categories((sheet, 1, 0, last_row, 0))
            .set_values((sheet, 1, col, last_row, col))
            .set_name(*name);
    }
    worksheet
        .insert_chart(1, cycles.len() as u16 + 2, &chart)
        .map_err(|e| export_err("insert chart", e))?;
    Ok(())
}

fn write_volatility(
    worksheet: &mut Worksheet,
    volatility: &[RegionVolatility],
    header: &Format,
) -> CycleResult<()> {
    let mut row = 0u32;
    for region in volatility {
        worksheet
            .write_string_with_format(row, 0, &region.region, header)
            .map_err(|e| export_err("write region", e))?;
        row += 1;
        for (col, title) in ["Variable", "Volatility", "Relative volatility"].iter().enumerate() {
            worksheet
                .write_string_with_format(row, col as u16, *title, header)
                .map_err(|e| export_err("write header", e))?;
        }
        row += 1;
        for (name, absolute) in &region.absolute {
            worksheet
                .write_string(row, 0, name)
                .map_err(|e| export_err("write variable", e))?;
            worksheet
                .write_number(row, 1, *absolute)
                .map_err(|e| export_err("write volatility", e))?;
            match region.table.as_ref().and_then(|t| t.get(name)) {
                Some(entry) => worksheet.write_number(row, 2, entry.relative),
                None => worksheet.write_string(row, 2, "n/a"),
            }
            .map_err(|e| export_err("write relative volatility", e))?;
            row += 1;
        }
        row += 1;
    }
    for col in 0..3 {
        worksheet
            .set_column_width(col, 20)
            .map_err(|e| export_err("set column width", e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_name_strips_forbidden_characters() {
        let mut used = HashSet::new();
        assert_eq!(sheet_name("GDP [2015/Q1]: real?", &mut used), "GDP _2015_Q1__ real_");
    }

    #[test]
    fn test_sheet_name_truncates_to_31_chars() {
        let mut used = HashSet::new();
        let name = sheet_name("Gross fixed capital formation in dwellings", &mut used);
        assert_eq!(name.chars().count(), 31);
    }

    #[test]
    fn test_sheet_name_deduplicates_case_insensitively() {
        let mut used = HashSet::new();
        assert_eq!(sheet_name("GDP", &mut used), "GDP");
        assert_eq!(sheet_name("gdp", &mut used), "gdp (2)");
        assert_eq!(sheet_name("GDP", &mut used), "GDP (3)");
    }

    #[test]
    fn test_sheet_name_empty_falls_back() {
        let mut used = HashSet::new();
        assert_eq!(sheet_name("''", &mut used), "Sheet");
    }

    #[test]
    fn test_sheet_name_keeps_greek_letters() {
        let mut used = HashSet::new();
        assert_eq!(sheet_name("Ακαθάριστο προϊόν", &mut used), "Ακαθάριστο προϊόν");
    }
}
