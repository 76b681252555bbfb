//! PNG figures: actual against trend, cycles and growth rates
//!
//! Figures are drawn without text. Their titles live in the file names,
//! which the LaTeX report turns into captions.

use super::{file_stem, Emitter};
use crate::core::pipeline::{AnalysisReport, VariableAnalysis};
use crate::error::{CycleError, CycleResult};
use crate::types::{merge_periods, Period, Series};
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Figures directory inside the output directory when none is configured
pub const FIGURES_DIR: &str = "figures";

const SIZE: (u32, u32) = (1024, 576);

const PALETTE: [RGBColor; 6] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
];

const ZERO_LINE: RGBColor = RGBColor(120, 120, 120);

/// One line of a figure, indexed on the figure's period axis
struct Line {
    values: Vec<Option<f64>>,
    color: RGBColor,
}

impl Line {
    fn new(series: &Series, axis: &[Period], k: usize) -> Self {
        Self {
            values: axis.iter().map(|p| series.get(p)).collect(),
            color: PALETTE[k % PALETTE.len()],
        }
    }
}

/// Draws the analysis figures as PNG files.
///
/// Per variable and region: `<variable>_<region>_trend.png`,
/// `<variable>_<region>_cycle.png` and `<variable>_<region>_growth.png`.
/// Per region: `cycles_<region>.png` with every variable's cycle.
#[derive(Debug, Default, Clone)]
pub struct FigureEmitter {
    /// Where figures go; `<out_dir>/figures` when unset
    pub dir: Option<PathBuf>,
}

impl FigureEmitter {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn target(&self, out_dir: &Path) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| out_dir.join(FIGURES_DIR))
    }
}

impl Emitter for FigureEmitter {
    fn name(&self) -> &'static str {
        "figures"
    }

    fn emit(&self, report: &AnalysisReport, out_dir: &Path) -> CycleResult<Vec<PathBuf>> {
        let dir = self.target(out_dir);
        std::fs::create_dir_all(&dir)?;

        let mut written = Vec::new();
        for variable in &report.variables {
            written.extend(variable_figures(variable, &dir)?);
        }
        for region in &report.regions {
            if let Some(path) = region_cycles_figure(region, &report.variables, &dir)? {
                written.push(path);
            }
        }
        debug!(dir = %dir.display(), figures = written.len(), "figures drawn");
        Ok(written)
    }
}

fn variable_figures(variable: &VariableAnalysis, dir: &Path) -> CycleResult<Vec<PathBuf>> {
    let mut written = Vec::new();
    for d in &variable.decompositions {
        let stem = format!("{}_{}", file_stem(&variable.name), file_stem(&d.region));
        let axis = d.actual.periods();

        let path = dir.join(format!("{stem}_trend.png"));
        let lines = [
            Line::new(&d.actual, &axis, 0),
            Line::new(&d.decomposition.trend, &axis, 1),
        ];
        plot(&path, axis.len(), &lines, false)?;
        written.push(path);

        let path = dir.join(format!("{stem}_cycle.png"));
        plot(&path, axis.len(), &[Line::new(&d.decomposition.cycle, &axis, 0)], true)?;
        written.push(path);

        let growth: Vec<Series> = [
            &variable.growth.nominal,
            &variable.growth.real,
            &variable.growth.deflator,
        ]
        .iter()
        .filter_map(|t| t.series(&d.region))
        .collect();
        if let Some(first) = growth.first() {
            let axis = first.periods();
            let lines: Vec<Line> = growth
                .iter()
                .enumerate()
                .map(|(k, s)| Line::new(s, &axis, k))
                .collect();
            let path = dir.join(format!("{stem}_growth.png"));
            plot(&path, axis.len(), &lines, true)?;
            written.push(path);
        }
    }
    Ok(written)
}

fn region_cycles_figure(
    region: &str,
    variables: &[VariableAnalysis],
    dir: &Path,
) -> CycleResult<Option<PathBuf>> {
    let cycles: Vec<&Series> = variables
        .iter()
        .filter_map(|v| v.decomposition(region).map(|d| &d.decomposition.cycle))
        .collect();
    if cycles.is_empty() {
        return Ok(None);
    }
    let axes: Vec<Vec<Period>> = cycles.iter().map(|c| c.periods()).collect();
    let axis = merge_periods(axes.iter().map(Vec::as_slice));
    let lines: Vec<Line> = cycles
        .iter()
        .enumerate()
        .map(|(k, c)| Line::new(c, &axis, k))
        .collect();

    let path = dir.join(format!("cycles_{}.png", file_stem(region)));
    plot(&path, axis.len(), &lines, true)?;
    Ok(Some(path))
}

fn draw_err(path: &Path, e: impl std::fmt::Display) -> CycleError {
    CycleError::Export(format!("Failed to draw {}: {}", path.display(), e))
}

fn plot(path: &Path, points: usize, lines: &[Line], zero_line: bool) -> CycleResult<()> {
    let (lo, hi) = value_range(lines, zero_line);
    let x_max = points.saturating_sub(1).max(1) as f64;

    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(|e| draw_err(path, e))?;
    let mut chart = ChartBuilder::on(&root)
        .margin(24)
        .build_cartesian_2d(0f64..x_max, lo..hi)
        .map_err(|e| draw_err(path, e))?;
    chart
        .configure_mesh()
        .x_labels(12)
        .y_labels(8)
        .draw()
        .map_err(|e| draw_err(path, e))?;

    if zero_line {
        chart
            .draw_series(LineSeries::new(
                [(0.0, 0.0), (x_max, 0.0)],
                ZERO_LINE.stroke_width(1),
            ))
            .map_err(|e| draw_err(path, e))?;
    }
    for line in lines {
        for run in runs(&line.values) {
            chart
                .draw_series(LineSeries::new(run, line.color.stroke_width(2)))
                .map_err(|e| draw_err(path, e))?;
        }
    }
    root.present().map_err(|e| draw_err(path, e))?;
    Ok(())
}

/// Stretches of consecutive present values as (index, value) points
fn runs(values: &[Option<f64>]) -> Vec<Vec<(f64, f64)>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for (i, value) in values.iter().enumerate() {
        match value {
            Some(v) if v.is_finite() => current.push((i as f64, *v)),
            _ => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Y range of all lines with a 5% margin; never empty
fn value_range(lines: &[Line], include_zero: bool) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    let present = lines
        .iter()
        .flat_map(|l| l.values.iter().flatten())
        .filter(|v| v.is_finite());
    for v in present.chain(include_zero.then_some(&0.0)) {
        lo = lo.min(*v);
        hi = hi.max(*v);
    }
    if !lo.is_finite() {
        return (-1.0, 1.0);
    }
    let span = hi - lo;
    let pad = if span > 0.0 {
        span * 0.05
    } else {
        lo.abs().max(1.0) * 0.05
    };
    (lo - pad, hi + pad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::periods;
    use tempfile::TempDir;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

    fn line(values: Vec<Option<f64>>) -> Line {
        Line {
            values,
            color: PALETTE[0],
        }
    }

    #[test]
    fn test_runs_split_at_gaps() {
        let r = runs(&[Some(1.0), Some(2.0), None, Some(f64::NAN), Some(4.0)]);
        assert_eq!(r, vec![vec![(0.0, 1.0), (1.0, 2.0)], vec![(4.0, 4.0)]]);
        assert!(runs(&[None, None]).is_empty());
    }

    #[test]
    fn test_value_range_pads_and_includes_zero() {
        let (lo, hi) = value_range(&[line(vec![Some(10.0), Some(20.0)])], false);
        assert!((lo - 9.5).abs() < 1e-12 && (hi - 20.5).abs() < 1e-12);

        let (lo, _) = value_range(&[line(vec![Some(10.0), Some(20.0)])], true);
        assert!(lo < 0.0);

        let (lo, hi) = value_range(&[line(vec![Some(3.0), Some(3.0)])], false);
        assert!(lo < 3.0 && hi > 3.0);

        assert_eq!(value_range(&[line(vec![None])], false), (-1.0, 1.0));
    }

    #[test]
    fn test_plot_writes_png() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cycle.png");
        let axis = periods(&["2000", "2001", "2002", "2003"]);
        let cycle = Series::from_values("c", &axis, &[1.0, -0.5, 0.25, -0.75]);
        plot(&path, axis.len(), &[Line::new(&cycle, &axis, 0)], true).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], &PNG_MAGIC);
    }

    #[test]
    fn test_target_defaults_inside_output_dir() {
        let out = Path::new("/tmp/run");
        assert_eq!(FigureEmitter::default().target(out), out.join("figures"));
        let custom = FigureEmitter::new(Some(PathBuf::from("/tmp/figs")));
        assert_eq!(custom.target(out), PathBuf::from("/tmp/figs"));
    }
}
