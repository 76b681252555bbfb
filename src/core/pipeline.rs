//! One analysis run: load -> derive -> decompose -> analyze
//!
//! Every variable is processed on its own. A failure in one variable is
//! recorded as a [`Diagnostic`] and the run moves on; results are returned in
//! an [`AnalysisReport`] rather than accumulated in shared state.

use crate::core::derived::{
    base_period, deflator, identity_check, invalid_log_inputs, invalid_quotients,
    real_from_deflator, table_growth,
};
use crate::core::hp_filter::hp_filter;
use crate::core::loader::{load_regions, SheetLayout};
use crate::core::volatility::{absolute_volatilities, relative_volatility};
use crate::error::{CycleError, CycleResult};
use crate::excel::SheetSource;
use crate::parser::{AnalysisConfig, DecomposeOn, PriceSource, VariableConfig};
use crate::types::{
    Decomposition, Diagnostic, DiagnosticKind, IdentityCheck, Period, RegionTable, Series,
    VolatilityTable,
};
use serde::Serialize;
use tracing::{info, warn};

/// Log growth rates of the three views of a variable
#[derive(Debug, Clone, Serialize)]
pub struct GrowthSet {
    pub nominal: RegionTable,
    pub real: RegionTable,
    pub deflator: RegionTable,
}

/// Trend/cycle split of one region's real series
#[derive(Debug, Clone, Serialize)]
pub struct RegionDecomposition {
    pub region: String,
    /// The series that was filtered (real level or its log)
    pub actual: Series,
    pub decomposition: Decomposition,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionSummary {
    pub region: String,
    pub base_period: Option<Period>,
    pub mean_nominal_growth: Option<f64>,
    pub mean_real_growth: Option<f64>,
    pub mean_deflator_growth: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariableAnalysis {
    pub name: String,
    pub nominal: RegionTable,
    pub real: RegionTable,
    pub deflator: RegionTable,
    pub growth: GrowthSet,
    pub identity: IdentityCheck,
    pub summaries: Vec<RegionSummary>,
    pub decompositions: Vec<RegionDecomposition>,
    /// Recoverable problems met while deriving this variable
    pub notes: Vec<Diagnostic>,
}

impl VariableAnalysis {
    pub fn decomposition(&self, region: &str) -> Option<&RegionDecomposition> {
        self.decompositions.iter().find(|d| d.region == region)
    }
}

/// Volatilities of one region across variables
#[derive(Debug, Clone, Serialize)]
pub struct RegionVolatility {
    pub region: String,
    pub absolute: Vec<(String, f64)>,
    /// `None` when the base variable is absent or flat in this region
    pub table: Option<VolatilityTable>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub title: String,
    pub lambda: f64,
    pub base_variable: String,
    pub regions: Vec<String>,
    pub variables: Vec<VariableAnalysis>,
    pub volatility: Vec<RegionVolatility>,
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalysisReport {
    pub fn variable(&self, name: &str) -> Option<&VariableAnalysis> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn region_volatility(&self, region: &str) -> Option<&RegionVolatility> {
        self.volatility.iter().find(|v| v.region == region)
    }
}

/// Per-run state threaded through every stage
pub struct RunContext<'a> {
    config: &'a AnalysisConfig,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> RunContext<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self {
            config,
            diagnostics: Vec::new(),
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    fn record(&mut self, diagnostic: Diagnostic) {
        warn!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }

    fn load(
        &mut self,
        source: &mut dyn SheetSource,
        sheet: &str,
        layout: &SheetLayout,
        name: String,
    ) -> CycleResult<RegionTable> {
        let grid = source.sheet(sheet)?;
        let loaded = load_regions(&grid, layout)?;
        self.diagnostics.extend(loaded.diagnostics);
        Ok(loaded.table.with_name(name))
    }

    /// Load, derive and decompose one variable
    pub fn analyze_variable(
        &mut self,
        source: &mut dyn SheetSource,
        variable: &VariableConfig,
    ) -> CycleResult<VariableAnalysis> {
        let config = self.config;
        let layout = config.layout_for(variable);
        let price = variable.source()?;

        let nominal = self.load(source, &variable.nominal, layout, format!("{} nominal", variable.name))?;
        let second = match price {
            PriceSource::Real(sheet) => {
                Priced::Real(self.load(source, sheet, layout, format!("{} real", variable.name))?)
            }
            PriceSource::Deflator(sheet) => Priced::Deflator(self.load(
                source,
                sheet,
                layout,
                format!("{} deflator", variable.name),
            )?),
        };
        let mut analysis = derive_variable(&variable.name, &nominal, second)?;
        for note in std::mem::take(&mut analysis.notes) {
            self.record(note);
        }
        info!(variable = %variable.name, periods = analysis.nominal.len(), "derived real and deflator series");

        let regions: Vec<String> = analysis.real.regions().iter().map(|r| r.to_string()).collect();
        for region in &regions {
            let real_series = analysis
                .real
                .series(region)
                .ok_or_else(|| CycleError::Validation(format!("Region '{}' missing", region)))?;
            let actual = match config.decompose {
                DecomposeOn::Level => real_series,
                DecomposeOn::Log => log_series(&real_series)?,
            };
            let decomposition = hp_filter(&actual, config.smoothing())?;
            analysis.decompositions.push(RegionDecomposition {
                region: region.to_string(),
                actual,
                decomposition,
            });
        }
        Ok(analysis)
    }

    /// Volatility tables for every region, recording degenerate bases
    pub fn analyze_volatility(
        &mut self,
        variables: &[VariableAnalysis],
        regions: &[String],
    ) -> CycleResult<Vec<RegionVolatility>> {
        let base = &self.config.base_variable;
        let mut out = Vec::new();
        for region in regions {
            let cycles: Vec<(String, Series)> = variables
                .iter()
                .filter_map(|v| {
                    v.decomposition(region)
                        .map(|d| (v.name.clone(), d.decomposition.cycle.clone()))
                })
                .collect();
            let absolute = absolute_volatilities(&cycles)?;
            let table = match relative_volatility(&absolute, base) {
                Ok(table) => Some(table),
                Err(err @ CycleError::DegenerateBase { .. }) => {
                    self.record(Diagnostic::new(
                        DiagnosticKind::DegenerateBase,
                        region,
                        err.to_string(),
                    ));
                    None
                }
                Err(other) => return Err(other),
            };
            out.push(RegionVolatility {
                region: region.clone(),
                absolute,
                table,
            });
        }
        Ok(out)
    }

    /// Run every configured variable, then the volatility analysis
    pub fn run(mut self, source: &mut dyn SheetSource) -> CycleResult<AnalysisReport> {
        let config = self.config;
        let mut variables = Vec::new();
        for variable in &config.variables {
            match self.analyze_variable(source, variable) {
                Ok(analysis) => variables.push(analysis),
                Err(err) => {
                    let kind = match err {
                        CycleError::EmptyIntersection { .. } => DiagnosticKind::EmptyIntersection,
                        _ => DiagnosticKind::Skipped,
                    };
                    self.record(Diagnostic::new(
                        kind,
                        &variable.name,
                        format!("{err}; variable skipped"),
                    ));
                }
            }
        }

        let mut regions: Vec<String> = Vec::new();
        for v in &variables {
            for d in &v.decompositions {
                if !regions.contains(&d.region) {
                    regions.push(d.region.clone());
                }
            }
        }

        let volatility = self.analyze_volatility(&variables, &regions)?;
        info!(
            variables = variables.len(),
            diagnostics = self.diagnostics.len(),
            "analysis finished"
        );

        Ok(AnalysisReport {
            title: config
                .report
                .title
                .clone()
                .unwrap_or_else(|| "Business-cycle analysis".to_string()),
            lambda: config.smoothing(),
            base_variable: config.base_variable.clone(),
            regions,
            variables,
            volatility,
            diagnostics: self.diagnostics,
        })
    }
}

/// The second input of a variable next to its nominal values
#[derive(Debug, Clone)]
pub enum Priced {
    Real(RegionTable),
    Deflator(RegionTable),
}

/// Align nominal with its real or deflator counterpart, derive the missing
/// view, growth rates, the growth identity and per-region summaries.
///
/// The result carries no decompositions yet.
pub fn derive_variable(name: &str, nominal: &RegionTable, second: Priced) -> CycleResult<VariableAnalysis> {
    let mut notes = Vec::new();
    let (nominal, real, deflator) = match second {
        Priced::Real(real) => {
            let (nominal, real) = nominal.align(&real)?;
            note_substitutions(&mut notes, name, "deflator", invalid_quotients(&nominal, &real));
            let defl = deflator(&nominal, &real)?;
            (nominal, real, defl)
        }
        Priced::Deflator(defl) => {
            let (nominal, defl) = nominal.align(&defl)?;
            note_substitutions(&mut notes, name, "real", invalid_quotients(&nominal, &defl));
            let real = real_from_deflator(&nominal, &defl)?;
            (nominal, real, defl)
        }
    };
    for (view, table) in [("nominal", &nominal), ("real", &real), ("deflator", &deflator)] {
        note_substitutions(
            &mut notes,
            name,
            &format!("log {view}"),
            invalid_log_inputs(table),
        );
    }
    let nominal = nominal.with_name(format!("{name} nominal"));
    let real = real.with_name(format!("{name} real"));
    let deflator = deflator.with_name(format!("{name} deflator"));

    let growth = GrowthSet {
        nominal: table_growth(&nominal)?,
        real: table_growth(&real)?,
        deflator: table_growth(&deflator)?,
    };
    let identity = identity_check(&growth.nominal, &growth.real, &growth.deflator)?;

    let mut summaries = Vec::new();
    for region in nominal.regions() {
        let (Some(n), Some(r)) = (nominal.series(region), real.series(region)) else {
            return Err(CycleError::Validation(format!(
                "Region '{}' missing from '{}'",
                region, real.name
            )));
        };
        let mean = |t: &RegionTable| t.series(region).and_then(|s| s.mean());
        summaries.push(RegionSummary {
            region: region.to_string(),
            base_period: base_period(&n, &r),
            mean_nominal_growth: mean(&growth.nominal),
            mean_real_growth: mean(&growth.real),
            mean_deflator_growth: mean(&growth.deflator),
        });
    }

    Ok(VariableAnalysis {
        name: name.to_string(),
        nominal,
        real,
        deflator,
        growth,
        identity,
        summaries,
        decompositions: Vec::new(),
        notes,
    })
}

fn note_substitutions(notes: &mut Vec<Diagnostic>, variable: &str, what: &str, count: usize) {
    if count > 0 {
        notes.push(Diagnostic::new(
            DiagnosticKind::Substitution,
            variable,
            format!("{count} undefined {what} value(s) replaced by the nearest valid value"),
        ));
    }
}

fn log_series(series: &Series) -> CycleResult<Series> {
    let mut logged = Series::new(format!("ln {}", series.name));
    for obs in &series.observations {
        let value = match obs.value {
            Some(v) if v > 0.0 => v.ln(),
            _ => {
                return Err(CycleError::Numerical(format!(
                    "cannot take the log of '{}' at {}",
                    series.name, obs.period
                )))
            }
        };
        logged.push(obs.period.clone(), Some(value));
    }
    Ok(logged)
}

/// Convenience wrapper: a fresh [`RunContext`] over `source`
pub fn run_analysis(config: &AnalysisConfig, source: &mut dyn SheetSource) -> CycleResult<AnalysisReport> {
    RunContext::new(config).run(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::excel::MemorySource;
    use crate::parser::parse_config_str;
    use crate::types::{Cell, CellGrid};

    const RUN: &str = r#"
workbook: unused.xlsx
base_variable: GDP
layout:
  label_row: 1
  start_label: "2000-Q1"
  regions:
    - { name: Euro, row: 2 }
    - { name: Greece, row: 3 }
variables:
  - { name: GDP, nominal: gdp_nom, deflator: gdp_def }
  - { name: Investment, nominal: inv_nom, real: inv_real }
  - { name: Exports, nominal: exp_nom, deflator: exp_def }
"#;

    fn labels(n: usize) -> Vec<Cell> {
        (0..n)
            .map(|i| Cell::Text(format!("{}-Q{}", 2000 + i / 4, i % 4 + 1)))
            .collect()
    }

    fn grid(name: &str, euro: impl Fn(usize) -> f64, greece: impl Fn(usize) -> f64) -> CellGrid {
        let n = 16;
        CellGrid::new(
            name,
            vec![
                labels(n),
                (0..n).map(|i| Cell::Number(euro(i))).collect(),
                (0..n).map(|i| Cell::Number(greece(i))).collect(),
            ],
        )
    }

    fn wave(i: usize) -> f64 {
        (i as f64 * 1.3).sin()
    }

    fn source() -> MemorySource {
        MemorySource::new()
            .with_sheet(grid("gdp_nom", |i| 1000.0 + 10.0 * i as f64 + 5.0 * wave(i), |i| 50.0 + i as f64 + wave(i)))
            .with_sheet(grid("gdp_def", |i| 100.0 + i as f64, |i| 100.0 + 0.5 * i as f64))
            .with_sheet(grid("inv_nom", |i| 300.0 + 3.0 * i as f64 + 9.0 * wave(i), |i| 9.0 + 0.1 * i as f64 + 0.8 * wave(i)))
            .with_sheet(grid("inv_real", |i| 290.0 + 2.0 * i as f64 + 8.0 * wave(i), |i| 9.0 + 0.05 * i as f64 + 0.7 * wave(i)))
    }

    #[test]
    fn test_run_skips_failed_variable_and_continues() {
        let config = parse_config_str(RUN).unwrap();
        let mut src = source();
        let report = run_analysis(&config, &mut src).unwrap();

        assert_eq!(report.variables.len(), 2);
        assert_eq!(report.regions, vec!["Euro", "Greece"]);
        let skipped: Vec<&Diagnostic> = report
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Skipped)
            .collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].subject, "Exports");
    }

    #[test]
    fn test_identity_holds_and_base_is_unit() {
        let config = parse_config_str(RUN).unwrap();
        let report = run_analysis(&config, &mut source()).unwrap();

        for v in &report.variables {
            assert!(v.identity.max_abs_deviation < 1e-6, "{}", v.name);
            assert_eq!(v.growth.nominal.len(), v.nominal.len() - 1);
        }
        let euro = report.region_volatility("Euro").unwrap();
        let table = euro.table.as_ref().unwrap();
        assert_eq!(table.get("GDP").unwrap().relative, 1.0);
        assert!(table.get("Investment").unwrap().absolute > 0.0);
    }

    #[test]
    fn test_deflator_base_period_detected() {
        let config = parse_config_str(RUN).unwrap();
        let report = run_analysis(&config, &mut source()).unwrap();
        let gdp = report.variable("GDP").unwrap();
        // the deflator equals 100 in the first quarter, so nominal == real there
        assert_eq!(gdp.summaries[0].base_period, Some(Period::new("2000-Q1")));
    }

    #[test]
    fn test_missing_base_records_degenerate_diagnostic() {
        let config = parse_config_str(&RUN.replace("base_variable: GDP", "base_variable: Output")).unwrap();
        let report = run_analysis(&config, &mut source()).unwrap();
        assert!(report.volatility.iter().all(|v| v.table.is_none()));
        assert_eq!(
            report
                .diagnostics
                .iter()
                .filter(|d| d.kind == DiagnosticKind::DegenerateBase)
                .count(),
            2
        );
    }

    #[test]
    fn test_disjoint_periods_recorded_as_empty_intersection() {
        let config = parse_config_str(RUN).unwrap();
        let mut shifted = labels(32);
        shifted.drain(..16);
        let mut src = source();
        src.insert(CellGrid::new(
            "inv_real",
            vec![
                shifted,
                (0..16).map(|i| Cell::Number(10.0 + i as f64)).collect(),
                (0..16).map(|i| Cell::Number(10.0 + i as f64)).collect(),
            ],
        ));
        // the starting label is absent from the shifted sheet, so all columns are used
        let report = run_analysis(&config, &mut src).unwrap();
        assert!(report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::EmptyIntersection && d.subject == "Investment"));
        assert!(report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::MissingColumn));
    }

    #[test]
    fn test_zero_divisor_recorded_as_substitution() {
        let config = parse_config_str(RUN).unwrap();
        let mut src = source();
        src.insert(grid(
            "inv_real",
            |i| if i == 4 { 0.0 } else { 290.0 + 2.0 * i as f64 },
            |i| 9.0 + 0.05 * i as f64,
        ));

        let report = run_analysis(&config, &mut src).unwrap();
        let notes: Vec<&Diagnostic> = report
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Substitution)
            .collect();
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|d| d.subject == "Investment"));
        assert!(notes[0].message.starts_with("1 undefined deflator value(s)"));
        assert!(notes[1].message.contains("log real"));

        let inv = report.variable("Investment").unwrap();
        assert!(inv.notes.is_empty());
        let deflator = inv.deflator.column("Euro").unwrap();
        assert_eq!(deflator[4], deflator[3]);
    }

    #[test]
    fn test_log_decomposition() {
        let config = parse_config_str(&format!("{RUN}decompose: log\n")).unwrap();
        let report = run_analysis(&config, &mut source()).unwrap();
        let gdp = report.variable("GDP").unwrap();
        let d = gdp.decomposition("Euro").unwrap();
        let first = d.actual.observations[0].value.unwrap();
        assert!((first - 1000.0f64.ln()).abs() < 1e-9);
    }
}
