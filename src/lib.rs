//! macrocycle - business-cycle analysis of national-accounts series
//!
//! This library loads nominal and real (or deflator) series per region from
//! spreadsheet workbooks or MATLAB `.mat` files, derives deflators and log
//! growth rates, checks the growth identity, splits real series into a
//! Hodrick-Prescott trend and cycle, and measures cyclical volatility
//! relative to a base variable.
//!
//! # Features
//!
//! - Explicit, validated sheet layouts (label row, region rows, start period)
//! - Banded Cholesky HP filter, O(n) in the series length
//! - Per-run diagnostics instead of silent NaNs
//! - CSV, LaTeX, PNG and Excel (with line charts) output
//! - A lagged income-expenditure model for multiplier and policy experiments
//!
//! # Example
//!
//! ```no_run
//! use macrocycle::core::run_analysis;
//! use macrocycle::excel::WorkbookSource;
//! use macrocycle::parser::parse_config;
//! use std::path::Path;
//!
//! let config = parse_config(Path::new("run.yaml"))?;
//! let mut source = WorkbookSource::open(&config.workbook)?;
//! let report = run_analysis(&config, &mut source)?;
//!
//! for region in &report.volatility {
//!     println!("{}: {} variables", region.region, region.absolute.len());
//! }
//! # Ok::<(), macrocycle::error::CycleError>(())
//! ```

pub mod cli;
pub mod core;
pub mod error;
pub mod excel;
pub mod mat;
pub mod multiplier;
pub mod parser;
pub mod report;
pub mod types;

// Re-export commonly used types
pub use error::{CycleError, CycleResult};
pub use types::{Decomposition, Period, RegionTable, Series, VolatilityTable};
