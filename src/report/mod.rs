//! Output emitters over a finished [`AnalysisReport`]
//!
//! The numerical core never calls into this module; an emitter only reads the
//! structured report and writes files into an output directory.

pub mod delimited;
pub mod figures;
pub mod latex;

pub use delimited::CsvEmitter;
pub use figures::{FigureEmitter, FIGURES_DIR};
pub use latex::{add_captions, figure_appendix, LatexEmitter};

use crate::core::pipeline::AnalysisReport;
use crate::error::CycleResult;
use crate::types::{Diagnostic, DiagnosticKind};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Something that turns a report into files
pub trait Emitter {
    /// Short name used in logs and diagnostics
    fn name(&self) -> &'static str;

    /// Write into `out_dir`, returning the files created
    fn emit(&self, report: &AnalysisReport, out_dir: &Path) -> CycleResult<Vec<PathBuf>>;
}

/// Run every emitter; a failing emitter is reported and the rest still run
pub fn emit_all(
    emitters: &[Box<dyn Emitter>],
    report: &AnalysisReport,
    out_dir: &Path,
) -> CycleResult<(Vec<PathBuf>, Vec<Diagnostic>)> {
    std::fs::create_dir_all(out_dir)?;
    let mut written = Vec::new();
    let mut failures = Vec::new();
    for emitter in emitters {
        match emitter.emit(report, out_dir) {
            Ok(files) => {
                info!(emitter = emitter.name(), files = files.len(), "emitted");
                written.extend(files);
            }
            Err(err) => {
                let diagnostic = Diagnostic::new(DiagnosticKind::Skipped, emitter.name(), err.to_string());
                warn!("{}", diagnostic);
                failures.push(diagnostic);
            }
        }
    }
    Ok((written, failures))
}

/// File-name stem for a variable or region name
pub fn file_stem(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_whitespace() || c == '/' || c == '\\' { '_' } else { c })
        .collect()
}
