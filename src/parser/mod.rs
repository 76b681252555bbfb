use crate::core::hp_filter::Frequency;
use crate::core::loader::SheetLayout;
use crate::error::{CycleError, CycleResult};
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// How the real side of a variable is supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource<'a> {
    /// Sheet with a real (chain-linked / constant price) series
    Real(&'a str),
    /// Sheet with an implicit price deflator (base = 100)
    Deflator(&'a str),
}

/// One national-accounts aggregate to analyze
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableConfig {
    pub name: String,
    /// Sheet holding current-price values
    pub nominal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deflator: Option<String>,
    /// Overrides the run-wide layout for this variable's sheets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<SheetLayout>,
}

impl VariableConfig {
    pub fn source(&self) -> CycleResult<PriceSource<'_>> {
        match (&self.real, &self.deflator) {
            (Some(real), None) => Ok(PriceSource::Real(real)),
            (None, Some(deflator)) => Ok(PriceSource::Deflator(deflator)),
            _ => Err(CycleError::Validation(format!(
                "Variable '{}' needs exactly one of 'real' or 'deflator'",
                self.name
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportOptions {
    #[serde(default = "enabled")]
    pub csv: bool,
    #[serde(default = "enabled")]
    pub workbook: bool,
    #[serde(default = "enabled")]
    pub latex: bool,
    /// Draw PNG figures
    #[serde(default = "enabled")]
    pub figures: bool,
    /// Where figures are written and read by the LaTeX report;
    /// `<output_dir>/figures` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub figures_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

fn enabled() -> bool {
    true
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            csv: true,
            workbook: true,
            latex: true,
            figures: true,
            figures_dir: None,
            title: None,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

/// Which transformation of the real series is HP-filtered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecomposeOn {
    /// Real levels; cycles are in the series' units
    #[default]
    Level,
    /// Natural log of real levels; cycles are proportional deviations
    Log,
}

/// A complete analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub workbook: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub frequency: Frequency,
    /// Explicit smoothing parameter; the frequency's conventional value otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lambda: Option<f64>,
    #[serde(default)]
    pub decompose: DecomposeOn,
    /// Variable whose cyclical volatility normalizes the others
    pub base_variable: String,
    pub layout: SheetLayout,
    pub variables: Vec<VariableConfig>,
    #[serde(default)]
    pub report: ReportOptions,
}

impl AnalysisConfig {
    /// Layout to use for a variable's sheets
    pub fn layout_for<'a>(&'a self, variable: &'a VariableConfig) -> &'a SheetLayout {
        variable.layout.as_ref().unwrap_or(&self.layout)
    }

    /// HP smoothing parameter of this run
    pub fn smoothing(&self) -> f64 {
        self.lambda.unwrap_or_else(|| self.frequency.lambda())
    }

    /// Semantic checks beyond the JSON Schema
    pub fn validate(&self) -> CycleResult<()> {
        let lambda = self.smoothing();
        if !lambda.is_finite() || lambda < 0.0 {
            return Err(CycleError::Validation(format!(
                "lambda must be a non-negative number, got {}",
                lambda
            )));
        }
        self.layout
            .check()
            .map_err(|m| CycleError::Validation(format!("layout: {m}")))?;

        let mut seen = HashSet::new();
        for variable in &self.variables {
            if !seen.insert(variable.name.as_str()) {
                return Err(CycleError::Validation(format!(
                    "Variable '{}' is listed twice",
                    variable.name
                )));
            }
            variable.source()?;
            if let Some(layout) = &variable.layout {
                layout.check().map_err(|m| {
                    CycleError::Validation(format!("layout of '{}': {m}", variable.name))
                })?;
            }
        }
        Ok(())
    }

    /// Make relative paths relative to `base_dir`
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base_dir.join(&*p);
            }
        };
        resolve(&mut self.workbook);
        resolve(&mut self.output_dir);
        if let Some(dir) = self.report.figures_dir.as_mut() {
            resolve(dir);
        }
    }
}

/// Parse and validate a YAML run file.
///
/// The document is checked against the embedded JSON Schema, deserialized,
/// checked semantically, and its relative paths are resolved against the
/// directory containing the file.
///
/// # Example
/// ```no_run
/// use macrocycle::parser::parse_config;
/// use std::path::Path;
///
/// let config = parse_config(Path::new("run.yaml"))?;
/// println!("Variables: {}", config.variables.len());
/// # Ok::<(), macrocycle::error::CycleError>(())
/// ```
pub fn parse_config(path: &Path) -> CycleResult<AnalysisConfig> {
    let content = std::fs::read_to_string(path)?;
    let mut config = parse_config_str(&content)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    config.resolve_paths(base_dir);
    Ok(config)
}

/// Parse a run file from a string; paths are left as written
pub fn parse_config_str(content: &str) -> CycleResult<AnalysisConfig> {
    let yaml: Value = serde_yaml::from_str(content)?;
    validate_against_schema(&yaml)?;
    let config: AnalysisConfig = serde_yaml::from_value(yaml)?;
    config.validate()?;
    Ok(config)
}

/// Validate YAML against the run-file JSON Schema
fn validate_against_schema(yaml: &Value) -> CycleResult<()> {
    let schema_str = include_str!("../../schema/analysis.schema.json");
    let schema_value: serde_json::Value = serde_json::from_str(schema_str)
        .map_err(|e| CycleError::Validation(format!("Failed to parse schema: {}", e)))?;

    let compiled_schema = JSONSchema::compile(&schema_value)
        .map_err(|e| CycleError::Validation(format!("Failed to compile schema: {}", e)))?;

    let json_value: serde_json::Value = serde_json::to_value(yaml)
        .map_err(|e| CycleError::Validation(format!("Failed to convert YAML to JSON: {}", e)))?;

    if let Err(errors) = compiled_schema.validate(&json_value) {
        let error_messages: Vec<String> = errors.map(|e| format!("  - {}", e)).collect();
        return Err(CycleError::Validation(format!(
            "Schema validation failed:\n{}",
            error_messages.join("\n")
        )));
    }

    Ok(())
}
