use crate::core::derived::rebase;
use crate::core::pipeline::{AnalysisReport, RunContext, VariableAnalysis};
use crate::error::{CycleError, CycleResult};
use crate::excel::{SheetSource, WorkbookExporter, WorkbookSource};
use crate::mat::{identity_analysis, MatSource};
use crate::multiplier::{
    dynamic_path, run_scenario, standard_scenarios, steady_state, write_paths_csv, DynamicPath,
    ModelParams,
};
use crate::parser::{self, AnalysisConfig, PriceSource};
use crate::report::delimited::write_growth_csv;
use crate::report::latex::growth_section;
use crate::report::{
    add_captions, emit_all, figure_appendix, file_stem, CsvEmitter, Emitter, FigureEmitter,
    LatexEmitter, FIGURES_DIR,
};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;

/// Format a number for display, removing unnecessary decimal places
fn format_number(n: f64) -> String {
    let rounded = (n * 1e6).round() / 1e6;
    format!("{:.6}", rounded)
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

fn percent(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.3}%", v * 100.0))
        .unwrap_or_else(|| "n/a".to_string())
}

/// Execute the analyze command
pub fn analyze(file: PathBuf, output: Option<PathBuf>, verbose: bool) -> CycleResult<()> {
    println!("{}", "📈 macrocycle - Business-cycle analysis".bold().green());
    println!("   Run file: {}", file.display());

    let mut config = parser::parse_config(&file)?;
    if let Some(dir) = output {
        config.output_dir = dir;
    }
    println!("   Workbook: {}", config.workbook.display());
    println!("   Lambda:   {}\n", format_number(config.smoothing()));

    if verbose {
        println!("{}", "📖 Reading workbook...".cyan());
    }
    let mut source = WorkbookSource::open(&config.workbook)?;

    let report = RunContext::new(&config).run(&mut source)?;
    print_report(&report, verbose);

    let emitters = build_emitters(&config);
    if emitters.is_empty() {
        println!("{}", "⚠️  All outputs are disabled in the run file".yellow());
        return Ok(());
    }
    if verbose {
        println!("{}", "💾 Writing outputs...".cyan());
    }
    let (files, failures) = emit_all(&emitters, &report, &config.output_dir)?;

    println!("{}", "✅ Analysis Complete!".bold().green());
    println!("   Output directory: {}", config.output_dir.display());
    for path in &files {
        println!("   📄 {}", path.display());
    }
    for failure in &failures {
        println!("   {}", format!("❌ {}", failure).red());
    }
    if !report.diagnostics.is_empty() {
        println!(
            "\n{}",
            format!("⚠️  {} diagnostics recorded", report.diagnostics.len()).yellow()
        );
        for d in &report.diagnostics {
            println!("   {}", d.to_string().yellow());
        }
    }
    println!();

    if !failures.is_empty() {
        return Err(CycleError::Export(format!(
            "{} output(s) could not be written",
            failures.len()
        )));
    }
    Ok(())
}

fn build_emitters(config: &AnalysisConfig) -> Vec<Box<dyn Emitter>> {
    let mut emitters: Vec<Box<dyn Emitter>> = Vec::new();
    if config.report.csv {
        emitters.push(Box::new(CsvEmitter));
    }
    if config.report.workbook {
        emitters.push(Box::new(WorkbookExporter::new()));
    }
    let figures_dir = if config.report.figures {
        let dir = figure_target(config);
        emitters.push(Box::new(FigureEmitter::new(Some(dir.clone()))));
        Some(dir)
    } else {
        config.report.figures_dir.clone()
    };
    if config.report.latex {
        emitters.push(Box::new(LatexEmitter::new(figures_dir)));
    }
    emitters
}

fn figure_target(config: &AnalysisConfig) -> PathBuf {
    config
        .report
        .figures_dir
        .clone()
        .unwrap_or_else(|| config.output_dir.join(FIGURES_DIR))
}

fn print_report(report: &AnalysisReport, verbose: bool) {
    for variable in &report.variables {
        println!("   {}", variable.name.bright_blue().bold());
        println!(
            "      {} periods, identity deviation {:.3e}",
            variable.nominal.len(),
            variable.identity.max_abs_deviation
        );
        if verbose {
            print_summaries(variable);
        }
    }
    println!();

    for region in &report.volatility {
        println!("   {} {}", "Volatility".bold(), region.region.bright_blue());
        match &region.table {
            Some(table) => {
                for row in &table.rows {
                    println!(
                        "      {:<24} {:>12} {:>10}",
                        row.variable,
                        format_number(row.absolute),
                        format_number(row.relative)
                    );
                }
            }
            None => {
                for (name, absolute) in &region.absolute {
                    println!("      {:<24} {:>12} {:>10}", name, format_number(*absolute), "n/a");
                }
            }
        }
    }
    println!();
}

fn print_summaries(variable: &VariableAnalysis) {
    for s in &variable.summaries {
        println!(
            "      {:<16} base {:<10} nominal {:>9} real {:>9} deflator {:>9}",
            s.region,
            s.base_period.as_ref().map(|p| p.as_str()).unwrap_or("n/a"),
            percent(s.mean_nominal_growth),
            percent(s.mean_real_growth),
            percent(s.mean_deflator_growth)
        );
    }
}

/// Execute the validate command
pub fn validate(file: PathBuf) -> CycleResult<()> {
    println!("{}", "✅ Validating run file".bold().green());
    println!("   File: {}\n", file.display());

    let config = parser::parse_config(&file)?;
    println!(
        "   Found {} variables, {} regions",
        config.variables.len(),
        config.layout.regions.len()
    );

    let mut source = WorkbookSource::open(&config.workbook)?;
    let mut failures = Vec::new();
    for variable in &config.variables {
        let layout = config.layout_for(variable);
        let second = match variable.source()? {
            PriceSource::Real(sheet) | PriceSource::Deflator(sheet) => sheet,
        };
        for sheet in [variable.nominal.as_str(), second] {
            let checked = source.sheet(sheet).and_then(|grid| layout.validate(&grid));
            match checked {
                Ok(()) => println!("   ✅ {} / {}", variable.name, sheet),
                Err(e) => {
                    println!("   {}", format!("❌ {} / {}: {}", variable.name, sheet, e).red());
                    failures.push(e);
                }
            }
        }
    }

    println!();
    if failures.is_empty() {
        println!("{}", "✅ Run file and sheet layouts are valid!".bold().green());
        Ok(())
    } else {
        println!(
            "{}",
            format!("❌ {} sheet(s) failed validation", failures.len())
                .bold()
                .red()
        );
        Err(CycleError::Validation(format!(
            "{} sheet(s) do not match the configured layout",
            failures.len()
        )))
    }
}

/// Execute the identity command
pub fn identity(
    file: PathBuf,
    nominal: String,
    real: String,
    regions: Vec<String>,
    first_period: i64,
    output: Option<PathBuf>,
) -> CycleResult<()> {
    println!("{}", "📈 macrocycle - Growth identity".bold().green());
    println!("   File: {}", file.display());
    println!("   Arrays: {} / {}\n", nominal, real);

    let source = MatSource::open(&file)?;
    let analysis = identity_analysis(&source, &nominal, &real, &regions, first_period)?;

    let deviation = format!("{:.3e}", analysis.identity.max_abs_deviation);
    println!(
        "   Max |dlog nominal - dlog real - dlog deflator|: {} over {} periods",
        deviation.bold(),
        analysis.identity.periods
    );
    print_summaries(&analysis);
    for note in &analysis.notes {
        println!("   {}", note.to_string().yellow());
    }

    for s in &analysis.summaries {
        let (Some(base), Some(series)) = (&s.base_period, analysis.real.series(&s.region)) else {
            continue;
        };
        let rebased = rebase(&series, base)?;
        if let Some(last) = rebased.observations.last() {
            println!(
                "      {:<16} real index at {} = {} ({} = 100)",
                s.region,
                last.period,
                last.value.map(format_number).unwrap_or_else(|| "n/a".to_string()),
                base
            );
        }
    }
    println!();

    if let Some(dir) = output {
        fs::create_dir_all(&dir)?;
        let csv_path = dir.join(format!("{}_growth.csv", file_stem(&analysis.name)));
        write_growth_csv(&analysis, &csv_path)?;
        let tex_path = dir.join("identity.tex");
        fs::write(&tex_path, growth_section(std::slice::from_ref(&analysis)))?;
        println!("{}", "✅ Identity report written".bold().green());
        println!("   📄 {}", csv_path.display());
        println!("   📄 {}\n", tex_path.display());
    }
    Ok(())
}

/// Execute the multiplier command
pub fn multiplier(
    params: ModelParams,
    periods: usize,
    start_ratio: f64,
    compare: Vec<f64>,
    output: Option<PathBuf>,
) -> CycleResult<()> {
    println!("{}", "🏛️  macrocycle - Income-expenditure model".bold().green());
    println!(
        "   c = {}, alpha = {}, b = {}, G = {}, T = {}, i = {}\n",
        format_number(params.c),
        format_number(params.alpha),
        format_number(params.b),
        format_number(params.g),
        format_number(params.t),
        format_number(params.i)
    );

    let base = steady_state(&params)?;
    println!("   {}", "Steady state".bold());
    println!("      Y* = {}", format_number(base.output).bold());
    println!("      C* = {}", format_number(base.consumption));
    println!("      I* = {}", format_number(base.investment));
    println!("      multiplier = {}\n", format_number(params.multiplier()?));

    let mut paths: Vec<(String, DynamicPath)> = Vec::new();
    println!(
        "   {} (Y at t = -1 is {} of each steady state)",
        "Transitions".bold(),
        format_number(start_ratio)
    );
    for c in compare {
        let p = params.with_propensity(c);
        let ss = steady_state(&p)?;
        let path = dynamic_path(start_ratio * ss.output, &p, periods)?;
        println!(
            "      c = {:<6} Y_0 = {:>9} Y_{} = {:>9} Y* = {:>9}",
            format_number(c),
            format_number(path.output[0]),
            periods,
            format_number(path.output[periods]),
            format_number(ss.output)
        );
        paths.push((format!("c = {}", format_number(c)), path));
    }
    println!();

    println!("   {}", "Policy scenarios (from the base steady state)".bold());
    for scenario in standard_scenarios(&params) {
        let outcome = run_scenario(&params, &scenario, periods)?;
        println!(
            "      {:<24} Y* {:>9} -> {:>9}   L_{} = {:>9}",
            outcome.name,
            format_number(outcome.before.output),
            format_number(outcome.after.output),
            periods,
            format_number(outcome.employment[periods])
        );
        paths.push((outcome.name, outcome.path));
    }
    println!();

    if let Some(dir) = output {
        fs::create_dir_all(&dir)?;
        let csv_path = dir.join("multiplier_paths.csv");
        let labelled: Vec<(String, &DynamicPath)> =
            paths.iter().map(|(name, p)| (name.clone(), p)).collect();
        write_paths_csv(&labelled, &csv_path)?;
        println!("{}", "✅ Paths written".bold().green());
        println!("   📄 {}\n", csv_path.display());
    }
    Ok(())
}

/// Execute the inspect command
pub fn inspect(file: PathBuf, sheet: Option<String>, rows: usize) -> CycleResult<()> {
    println!("{}", "🔍 macrocycle - Workbook inspection".bold().green());
    println!("   File: {}\n", file.display());

    let mut source = WorkbookSource::open(&file)?;
    let Some(name) = sheet else {
        let names = source.sheet_names();
        println!("   Found {} sheets", names.len());
        for name in names {
            println!("   📊 {}", name.bright_blue());
        }
        println!();
        return Ok(());
    };

    let grid = source.sheet(&name)?;
    println!(
        "   📊 {} ({} rows x {} columns)\n",
        name.bright_blue(),
        grid.height(),
        grid.width()
    );
    const MAX_COLUMNS: usize = 8;
    for r in 0..rows.min(grid.height()) {
        let cells: Vec<String> = (0..grid.width().min(MAX_COLUMNS))
            .map(|c| {
                let label = grid.get(r, c).label().unwrap_or_default();
                let short: String = label.chars().take(14).collect();
                format!("{:<14}", short)
            })
            .collect();
        println!("   {:>4} | {}", (r + 1).to_string().dimmed(), cells.join(" "));
    }
    println!();
    Ok(())
}

/// Execute the figures command
pub fn figures(dir: PathBuf, output: PathBuf) -> CycleResult<()> {
    println!("{}", "🖼️  macrocycle - Figure appendix".bold().green());
    println!("   Figures: {}", dir.display());
    println!("   Output:  {}\n", output.display());

    let tex = figure_appendix(&dir)?;
    fs::write(&output, &tex)?;

    let count = tex.matches("\\begin{tcolorbox}").count();
    println!("{}", format!("✅ {} figures written", count).bold().green());
    Ok(())
}

/// Execute the captions command
pub fn captions(input: PathBuf, output: PathBuf) -> CycleResult<()> {
    println!("{}", "🏷️  macrocycle - Caption pass".bold().green());
    println!("   Input:  {}", input.display());
    println!("   Output: {}\n", output.display());

    let content = fs::read_to_string(&input)?;
    let captioned = add_captions(&content);
    fs::write(&output, &captioned)?;

    let marker = "\\captionof{figure}";
    let added = captioned.matches(marker).count() - content.matches(marker).count();
    println!("{}", format!("✅ {} captions added", added).bold().green());
    Ok(())
}
