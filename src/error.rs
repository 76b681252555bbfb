use thiserror::Error;

pub type CycleResult<T> = Result<T, CycleError>;

#[derive(Error, Debug)]
pub enum CycleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Sheet layout error in '{sheet}': {message}")]
    Layout { sheet: String, message: String },

    #[error("Import error: {0}")]
    Import(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Period label '{label}' not found in sheet '{sheet}'")]
    MissingColumn { sheet: String, label: String },

    #[error("No common periods between '{left}' and '{right}'")]
    EmptyIntersection { left: String, right: String },

    #[error("Base variable '{base}' {reason}; relative volatility is undefined")]
    DegenerateBase { base: String, reason: String },

    #[error("Series '{series}' has {len} points, at least {required} required")]
    InsufficientData {
        series: String,
        len: usize,
        required: usize,
    },

    #[error("Series '{series}' has a missing value at period '{period}'")]
    MissingValues { series: String, period: String },

    #[error("Numerical error: {0}")]
    Numerical(String),
}

impl CycleError {
    pub fn layout(sheet: impl Into<String>, message: impl Into<String>) -> Self {
        CycleError::Layout {
            sheet: sheet.into(),
            message: message.into(),
        }
    }

    pub fn degenerate_base(base: impl Into<String>, reason: impl Into<String>) -> Self {
        CycleError::DegenerateBase {
            base: base.into(),
            reason: reason.into(),
        }
    }
}
