//! Numerical core: cleaning, loading, derivation, filtering, volatility

pub mod cleaner;
pub mod derived;
pub mod hp_filter;
pub mod loader;
pub mod pipeline;
pub mod volatility;

pub use hp_filter::{hp_filter, Frequency, QUARTERLY_LAMBDA};
pub use loader::{load_regions, SheetLayout};
pub use pipeline::{run_analysis, AnalysisReport, RunContext};
