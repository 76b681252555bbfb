//! LaTeX output: the analysis report fragment, the figure appendix and the
//! caption pass over `tcolorbox` environments

use super::Emitter;
use crate::core::pipeline::{AnalysisReport, RegionVolatility, VariableAnalysis};
use crate::error::CycleResult;
use regex::{Captures, Regex};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// File name of the report fragment inside the output directory
pub const REPORT_FILE: &str = "report.tex";

const CAPTION: &str = r"\captionof{figure}";
const LISTING: &str = r"\begin{lstlisting}";

#[derive(Debug, Default, Clone)]
pub struct LatexEmitter {
    /// Figures referenced with `\includegraphics`
    pub figures_dir: Option<PathBuf>,
}

impl LatexEmitter {
    pub fn new(figures_dir: Option<PathBuf>) -> Self {
        Self { figures_dir }
    }
}

impl Emitter for LatexEmitter {
    fn name(&self) -> &'static str {
        "latex"
    }

    fn emit(&self, report: &AnalysisReport, out_dir: &Path) -> CycleResult<Vec<PathBuf>> {
        let path = out_dir.join(REPORT_FILE);
        std::fs::write(&path, render_report(report, self.figures_dir.as_deref())?)?;
        Ok(vec![path])
    }
}

/// Escape LaTeX special characters in free text
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

fn fixed(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.4}"),
        None => "--".to_string(),
    }
}

/// The whole `report.tex` fragment
pub fn render_report(report: &AnalysisReport, figures_dir: Option<&Path>) -> CycleResult<String> {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "% Generated by macrocycle {} on {}",
        env!("CARGO_PKG_VERSION"),
        chrono::Local::now().format("%Y-%m-%d %H:%M")
    );
    let _ = writeln!(out, "\\section*{{{}}}\n", escape(&report.title));

    out.push_str(&growth_section(&report.variables));
    out.push_str(&volatility_section(report));

    if let Some(dir) = figures_dir {
        let files = png_files(dir)?;
        if !files.is_empty() {
            out.push_str("\\subsection*{Figures}\n\n");
            for file in files {
                let caption = file
                    .file_stem()
                    .map(|s| s.to_string_lossy().replace('_', " "))
                    .unwrap_or_default();
                let _ = writeln!(
                    out,
                    "\\begin{{figure}}[htbp]\n  \\centering\n  \\includegraphics[width=0.9\\textwidth]{{{}}}\n  \\caption{{{}}}\n\\end{{figure}}\n",
                    file.display(),
                    escape(&caption)
                );
            }
        }
    }

    if !report.diagnostics.is_empty() {
        out.push_str("\\subsection*{Diagnostics}\n\\begin{itemize}\n");
        for d in &report.diagnostics {
            let _ = writeln!(out, "  \\item {}", escape(&d.to_string()));
        }
        out.push_str("\\end{itemize}\n");
    }
    Ok(out)
}

/// Growth identity, base periods and mean log growth of each variable
pub fn growth_section(variables: &[VariableAnalysis]) -> String {
    let mut out = String::new();
    out.push_str("\\subsection*{Growth identity}\n\n");
    out.push_str("\\begin{tabular}{lrr}\n\\hline\nVariable & Periods & Max.\\ deviation \\\\\n\\hline\n");
    for v in variables {
        let _ = writeln!(
            out,
            "{} & {} & {:.3e} \\\\",
            escape(&v.name),
            v.identity.periods,
            v.identity.max_abs_deviation
        );
    }
    out.push_str("\\hline\n\\end{tabular}\n\n");

    out.push_str("\\subsection*{Base periods and mean log growth}\n\n");
    out.push_str(
        "\\begin{tabular}{lllrrr}\n\\hline\nVariable & Region & Base period & Nominal & Real & Deflator \\\\\n\\hline\n",
    );
    for v in variables {
        for s in &v.summaries {
            let _ = writeln!(
                out,
                "{} & {} & {} & {} & {} & {} \\\\",
                escape(&v.name),
                escape(&s.region),
                s.base_period
                    .as_ref()
                    .map(|p| escape(p.as_str()))
                    .unwrap_or_else(|| "--".to_string()),
                fixed(s.mean_nominal_growth),
                fixed(s.mean_real_growth),
                fixed(s.mean_deflator_growth)
            );
        }
    }
    out.push_str("\\hline\n\\end{tabular}\n\n");
    out
}

fn volatility_section(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\\subsection*{{Cyclical volatility}}\n\nHP filter with $\\lambda = {}$; volatilities relative to {}.\n",
        report.lambda,
        escape(&report.base_variable)
    );
    for region in &report.volatility {
        out.push_str(&volatility_table(region));
    }
    out
}

fn volatility_table(region: &RegionVolatility) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\\paragraph{{{}}}\n", escape(&region.region));
    out.push_str("\\begin{tabular}{lrr}\n\\hline\nVariable & Volatility & Relative \\\\\n\\hline\n");
    for (name, absolute) in &region.absolute {
        let relative = region.table.as_ref().and_then(|t| t.get(name)).map(|r| r.relative);
        let _ = writeln!(
            out,
            "{} & {} & {} \\\\",
            escape(name),
            fixed(Some(*absolute)),
            fixed(relative)
        );
    }
    out.push_str("\\hline\n\\end{tabular}\n\n");
    out
}

/// `.png` files directly inside `dir`, sorted by name
pub fn png_files(dir: &Path) -> CycleResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .map(|e| e.eq_ignore_ascii_case("png"))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// A LaTeX appendix with one titled `tcolorbox` per figure in `dir`
pub fn figure_appendix(dir: &Path) -> CycleResult<String> {
    let mut out = String::new();
    out.push_str("% Figure appendix generated by macrocycle\n");
    out.push_str("\\chapter{Appendix: Generated figures}\n\n");
    let _ = writeln!(out, "\\graphicspath{{{{{}/}}}}\n", dir.display());

    for file in png_files(dir)? {
        let Some(name) = file.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let title = file
            .file_stem()
            .map(|s| s.to_string_lossy().replace('_', " "))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "\\begin{{tcolorbox}}[colback=white,colframe=black,title={{{}}}]",
            escape(&title)
        );
        out.push_str("  \\centering\n");
        let _ = writeln!(out, "  \\includegraphics[width=0.8\\textwidth]{{{}}}", name);
        out.push_str("  \\vspace{0.5em}\n");
        out.push_str("\\end{tcolorbox}\n\n\\FloatBarrier\n\n");
    }
    Ok(out)
}

fn tcolorbox_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)(\\begin\{tcolorbox\}\[.*?\])(.*?)(\\end\{tcolorbox\})")
            .expect("tcolorbox pattern is valid")
    })
}

/// Add an empty `\captionof{figure}{}` to every `tcolorbox` that has no
/// caption and holds no code listing
pub fn add_captions(content: &str) -> String {
    tcolorbox_pattern()
        .replace_all(content, |caps: &Captures| {
            let body = &caps[2];
            if body.contains(CAPTION) || body.contains(LISTING) {
                caps[0].to_string()
            } else {
                format!("{}{}\n{}{{}}{}", &caps[1], body, CAPTION, &caps[3])
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_escape_special_characters() {
        assert_eq!(escape("R&D_share 5%"), r"R\&D\_share 5\%");
        assert_eq!(escape("a~b^c"), r"a\textasciitilde{}b\textasciicircum{}c");
    }

    #[test]
    fn test_add_caption_to_plain_box() {
        let input = "\\begin{tcolorbox}[title={GDP}]\n  \\includegraphics{gdp.png}\n\\end{tcolorbox}";
        let expected =
            "\\begin{tcolorbox}[title={GDP}]\n  \\includegraphics{gdp.png}\n\n\\captionof{figure}{}\\end{tcolorbox}";
        assert_eq!(add_captions(input), expected);
    }

    #[test]
    fn test_existing_caption_and_listing_untouched() {
        let input = concat!(
            "\\begin{tcolorbox}[a]\\captionof{figure}{Done}\\end{tcolorbox}\n",
            "\\begin{tcolorbox}[b]\\begin{lstlisting}\nx = 1\n\\end{lstlisting}\\end{tcolorbox}\n",
        );
        assert_eq!(add_captions(input), input);
    }

    #[test]
    fn test_box_without_options_untouched() {
        let input = "\\begin{tcolorbox}body\\end{tcolorbox}";
        assert_eq!(add_captions(input), input);
    }

    #[test]
    fn test_figure_appendix_lists_png_files_sorted() {
        let dir = TempDir::new().unwrap();
        for name in ["b_cycle.png", "a_trend.PNG", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let tex = figure_appendix(dir.path()).unwrap();
        let a = tex.find("title={a trend}").unwrap();
        let b = tex.find("title={b cycle}").unwrap();
        assert!(a < b);
        assert!(tex.contains("\\includegraphics[width=0.8\\textwidth]{b_cycle.png}"));
        assert!(!tex.contains("notes"));
        assert_eq!(tex.matches("\\begin{tcolorbox}").count(), 2);
    }

    #[test]
    fn test_appendix_then_captions() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("gdp_cycle.png"), b"x").unwrap();
        let captioned = add_captions(&figure_appendix(dir.path()).unwrap());
        assert_eq!(captioned.matches(CAPTION).count(), 1);
        // idempotent
        assert_eq!(add_captions(&captioned), captioned);
    }
}
