use crate::error::{CycleError, CycleResult};
use serde::{Deserialize, Serialize};
use std::fmt;

//==============================================================================
// Raw cells
//==============================================================================

/// A raw spreadsheet cell, independent of the workbook reader
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Text used when the cell acts as a period label
    ///
    /// Integral numbers render without a fractional part so a year stored
    /// as `1995.0` labels the period `1995`.
    pub fn label(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Number(n) if !n.is_finite() => None,
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{}", *n as i64))
            }
            Cell::Number(n) => Some(n.to_string()),
            Cell::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

static EMPTY_CELL: Cell = Cell::Empty;

/// A rectangular block of cells read from one sheet, indexed from (0, 0)
#[derive(Debug, Clone, PartialEq)]
pub struct CellGrid {
    pub sheet: String,
    rows: Vec<Vec<Cell>>,
}

impl CellGrid {
    pub fn new(sheet: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            sheet: sheet.into(),
            rows,
        }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Cell at a 0-based position; anything outside the block is empty
    pub fn get(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn row(&self, row: usize) -> Option<&[Cell]> {
        self.rows.get(row).map(Vec::as_slice)
    }
}

//==============================================================================
// Periods and series
//==============================================================================

/// Period label such as `1995-Q1` or `2015`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period(String);

impl Period {
    pub fn new(label: impl Into<String>) -> Self {
        Period(label.into())
    }

    /// Label for sources without a time axis: `start + index`
    pub fn ordinal(start: i64, index: usize) -> Self {
        Period((start + index as i64).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Period {
    fn from(s: &str) -> Self {
        Period(s.to_string())
    }
}

impl From<String> for Period {
    fn from(s: String) -> Self {
        Period(s)
    }
}

/// Build a period axis from string labels
pub fn periods<S: AsRef<str>>(labels: &[S]) -> Vec<Period> {
    labels.iter().map(|l| Period::new(l.as_ref())).collect()
}

/// Ordered union of several period axes.
///
/// Each axis keeps its own order; a period missing from the result is placed
/// right after its predecessor on the axis that brings it.
pub fn merge_periods<'a, I>(axes: I) -> Vec<Period>
where
    I: IntoIterator<Item = &'a [Period]>,
{
    let mut merged: Vec<Period> = Vec::new();
    for axis in axes {
        let mut cursor = 0;
        for period in axis {
            match merged.iter().position(|p| p == period) {
                Some(i) => cursor = i + 1,
                None => {
                    merged.insert(cursor, period.clone());
                    cursor += 1;
                }
            }
        }
    }
    merged
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub period: Period,
    pub value: Option<f64>,
}

/// Ordered observations of one (variable, region) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub observations: Vec<Observation>,
}

impl Series {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            observations: Vec::new(),
        }
    }

    pub fn from_values(name: impl Into<String>, periods: &[Period], values: &[f64]) -> Self {
        let observations = periods
            .iter()
            .zip(values)
            .map(|(p, v)| Observation {
                period: p.clone(),
                value: Some(*v),
            })
            .collect();
        Self {
            name: name.into(),
            observations,
        }
    }

    pub fn from_options(
        name: impl Into<String>,
        periods: &[Period],
        values: Vec<Option<f64>>,
    ) -> Self {
        let observations = periods
            .iter()
            .zip(values)
            .map(|(p, value)| Observation {
                period: p.clone(),
                value,
            })
            .collect();
        Self {
            name: name.into(),
            observations,
        }
    }

    pub fn push(&mut self, period: Period, value: Option<f64>) {
        self.observations.push(Observation { period, value });
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn periods(&self) -> Vec<Period> {
        self.observations.iter().map(|o| o.period.clone()).collect()
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.observations.iter().map(|o| o.value).collect()
    }

    pub fn get(&self, period: &Period) -> Option<f64> {
        self.observations
            .iter()
            .find(|o| &o.period == period)
            .and_then(|o| o.value)
    }

    /// All values, or an error naming the first missing period
    pub fn complete_values(&self) -> CycleResult<Vec<f64>> {
        self.observations
            .iter()
            .map(|o| {
                o.value.ok_or_else(|| CycleError::MissingValues {
                    series: self.name.clone(),
                    period: o.period.to_string(),
                })
            })
            .collect()
    }

    pub fn forward_fill(&mut self) {
        let mut last = None;
        for obs in &mut self.observations {
            match obs.value {
                Some(v) => last = Some(v),
                None => obs.value = last,
            }
        }
    }

    pub fn backward_fill(&mut self) {
        let mut next = None;
        for obs in self.observations.iter_mut().rev() {
            match obs.value {
                Some(v) => next = Some(v),
                None => obs.value = next,
            }
        }
    }

    /// Forward fill, then backward fill the leading gap
    pub fn fill_gaps(&mut self) {
        self.forward_fill();
        self.backward_fill();
    }

    /// Mean of the present values
    pub fn mean(&self) -> Option<f64> {
        let present: Vec<f64> = self.observations.iter().filter_map(|o| o.value).collect();
        if present.is_empty() {
            None
        } else {
            Some(present.iter().sum::<f64>() / present.len() as f64)
        }
    }
}

//==============================================================================
// Region tables
//==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionColumn {
    pub region: String,
    pub values: Vec<f64>,
}

/// Gap-free per-region columns sharing one period axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionTable {
    pub name: String,
    periods: Vec<Period>,
    columns: Vec<RegionColumn>,
}

impl RegionTable {
    pub fn new(name: impl Into<String>, periods: Vec<Period>) -> Self {
        Self {
            name: name.into(),
            periods,
            columns: Vec::new(),
        }
    }

    pub fn push_region(&mut self, region: impl Into<String>, values: Vec<f64>) -> CycleResult<()> {
        let region = region.into();
        if values.len() != self.periods.len() {
            return Err(CycleError::Validation(format!(
                "Region '{}' in '{}' has {} values for {} periods",
                region,
                self.name,
                values.len(),
                self.periods.len()
            )));
        }
        if self.column(&region).is_some() {
            return Err(CycleError::Validation(format!(
                "Region '{}' appears twice in '{}'",
                region, self.name
            )));
        }
        self.columns.push(RegionColumn { region, values });
        Ok(())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn columns(&self) -> &[RegionColumn] {
        &self.columns
    }

    pub fn regions(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.region.as_str()).collect()
    }

    pub fn column(&self, region: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.region == region)
            .map(|c| c.values.as_slice())
    }

    pub fn series(&self, region: &str) -> Option<Series> {
        self.column(region).map(|values| {
            Series::from_values(format!("{} ({})", self.name, region), &self.periods, values)
        })
    }

    /// Keep only the given periods, in the given order
    pub fn select(&self, wanted: &[Period]) -> RegionTable {
        let indices: Vec<usize> = wanted
            .iter()
            .filter_map(|p| self.periods.iter().position(|q| q == p))
            .collect();
        RegionTable {
            name: self.name.clone(),
            periods: indices.iter().map(|&i| self.periods[i].clone()).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| RegionColumn {
                    region: c.region.clone(),
                    values: indices.iter().map(|&i| c.values[i]).collect(),
                })
                .collect(),
        }
    }

    /// Restrict both tables to the periods they share, in this table's order
    pub fn align(&self, other: &RegionTable) -> CycleResult<(RegionTable, RegionTable)> {
        let common: Vec<Period> = self
            .periods
            .iter()
            .filter(|p| other.periods.contains(p))
            .cloned()
            .collect();
        if common.is_empty() {
            return Err(CycleError::EmptyIntersection {
                left: self.name.clone(),
                right: other.name.clone(),
            });
        }
        Ok((self.select(&common), other.select(&common)))
    }

    /// Element-wise combination of two tables on an identical axis.
    ///
    /// `f` returning `None` marks the value missing; gaps are filled forward
    /// then backward, and a region left without any value is an error.
    pub fn combine<F>(&self, other: &RegionTable, name: &str, f: F) -> CycleResult<RegionTable>
    where
        F: Fn(f64, f64) -> Option<f64>,
    {
        if self.periods != other.periods {
            return Err(CycleError::Validation(format!(
                "'{}' and '{}' do not share a period axis",
                self.name, other.name
            )));
        }
        let mut table = RegionTable::new(name, self.periods.clone());
        for column in &self.columns {
            let rhs = other.column(&column.region).ok_or_else(|| {
                CycleError::Validation(format!(
                    "Region '{}' missing from '{}'",
                    column.region, other.name
                ))
            })?;
            let raw = column
                .values
                .iter()
                .zip(rhs)
                .map(|(a, b)| f(*a, *b).filter(|v| v.is_finite()))
                .collect();
            let mut series = Series::from_options(
                format!("{} ({})", name, column.region),
                &self.periods,
                raw,
            );
            series.fill_gaps();
            table.push_region(column.region.clone(), series.complete_values()?)?;
        }
        Ok(table)
    }
}

//==============================================================================
// Analysis results
//==============================================================================

/// HP filter output for one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    pub trend: Series,
    pub cycle: Series,
    pub lambda: f64,
}

impl Decomposition {
    pub fn len(&self) -> usize {
        self.trend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trend.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityRow {
    pub variable: String,
    #[serde(rename = "volatility")]
    pub absolute: f64,
    #[serde(rename = "relative_volatility")]
    pub relative: f64,
}

/// Cyclical volatilities of one region, relative to a base variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityTable {
    pub base: String,
    pub rows: Vec<VolatilityRow>,
}

impl VolatilityTable {
    pub fn get(&self, variable: &str) -> Option<&VolatilityRow> {
        self.rows.iter().find(|r| r.variable == variable)
    }
}

/// Result of checking dlog(nominal) = dlog(real) + dlog(deflator)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdentityCheck {
    pub max_abs_deviation: f64,
    pub periods: usize,
}

//==============================================================================
// Diagnostics
//==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Start or end label absent; the window runs to the sheet edge
    MissingColumn,
    /// Cells that could not be parsed were treated as missing
    Conversion,
    /// Two series shared no periods; the variable was skipped
    EmptyIntersection,
    /// Relative volatility undefined for a region
    DegenerateBase,
    /// Undefined derived values (zero divisors, logs of non-positive
    /// numbers) were replaced by their nearest valid neighbour
    Substitution,
    /// A variable was skipped for another reason
    Skipped,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::MissingColumn => "missing-column",
            DiagnosticKind::Conversion => "conversion",
            DiagnosticKind::EmptyIntersection => "empty-intersection",
            DiagnosticKind::DegenerateBase => "degenerate-base",
            DiagnosticKind::Substitution => "substitution",
            DiagnosticKind::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// A recoverable problem recorded during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub subject: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.subject, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, labels: &[&str], euro: Vec<f64>) -> RegionTable {
        let mut t = RegionTable::new(name, periods(labels));
        t.push_region("Euro", euro).unwrap();
        t
    }

    #[test]
    fn test_cell_label_renders_integral_years() {
        assert_eq!(Cell::Number(1995.0).label(), Some("1995".to_string()));
        assert_eq!(Cell::Number(1.5).label(), Some("1.5".to_string()));
        assert_eq!(Cell::from(" 1995-Q1 ").label(), Some("1995-Q1".to_string()));
        assert_eq!(Cell::Empty.label(), None);
        assert_eq!(Cell::from("   ").label(), None);
    }

    #[test]
    fn test_grid_out_of_bounds_is_empty() {
        let grid = CellGrid::new("s", vec![vec![Cell::Number(1.0)]]);
        assert_eq!(grid.get(0, 0), &Cell::Number(1.0));
        assert_eq!(grid.get(5, 5), &Cell::Empty);
        assert_eq!(grid.width(), 1);
    }

    #[test]
    fn test_merge_periods_keeps_every_window() {
        let late = periods(&["2004", "2005", "2006"]);
        let early = periods(&["2001", "2002", "2003", "2004", "2005"]);
        let shifted = periods(&["2006", "2007"]);
        let merged = merge_periods([late.as_slice(), early.as_slice(), shifted.as_slice()]);
        assert_eq!(
            merged,
            periods(&["2001", "2002", "2003", "2004", "2005", "2006", "2007"])
        );
        assert!(merge_periods(std::iter::empty::<&[Period]>()).is_empty());
    }

    #[test]
    fn test_fill_gaps_forward_then_backward() {
        let mut s = Series::from_options(
            "x",
            &periods(&["a", "b", "c", "d"]),
            vec![None, Some(1.0), None, Some(3.0)],
        );
        s.fill_gaps();
        assert_eq!(s.values(), vec![Some(1.0), Some(1.0), Some(1.0), Some(3.0)]);
    }

    #[test]
    fn test_complete_values_reports_missing_period() {
        let s = Series::from_options("x", &periods(&["a", "b"]), vec![Some(1.0), None]);
        match s.complete_values() {
            Err(CycleError::MissingValues { period, .. }) => assert_eq!(period, "b"),
            other => panic!("Expected MissingValues, got {other:?}"),
        }
    }

    #[test]
    fn test_align_keeps_common_periods_in_order() {
        let a = table("a", &["q1", "q2", "q3"], vec![1.0, 2.0, 3.0]);
        let b = table("b", &["q3", "q2", "q4"], vec![30.0, 20.0, 40.0]);
        let (a2, b2) = a.align(&b).unwrap();
        assert_eq!(a2.periods(), periods(&["q2", "q3"]).as_slice());
        assert_eq!(a2.column("Euro").unwrap(), &[2.0, 3.0]);
        assert_eq!(b2.column("Euro").unwrap(), &[20.0, 30.0]);
    }

    #[test]
    fn test_align_without_overlap_is_empty_intersection() {
        let a = table("a", &["q1"], vec![1.0]);
        let b = table("b", &["q2"], vec![1.0]);
        assert!(matches!(
            a.align(&b),
            Err(CycleError::EmptyIntersection { .. })
        ));
    }

    #[test]
    fn test_combine_fills_invalid_quotients() {
        let a = table("a", &["q1", "q2", "q3"], vec![1.0, 2.0, 3.0]);
        let b = table("b", &["q1", "q2", "q3"], vec![1.0, 0.0, 1.0]);
        let ratio = a.combine(&b, "ratio", |x, y| Some(x / y)).unwrap();
        assert_eq!(ratio.column("Euro").unwrap(), &[1.0, 1.0, 3.0]);
    }

    #[test]
    fn test_push_region_rejects_length_mismatch() {
        let mut t = RegionTable::new("t", periods(&["q1", "q2"]));
        assert!(t.push_region("Euro", vec![1.0]).is_err());
    }
}
