use clap::{Parser, Subcommand};
use macrocycle::cli;
use macrocycle::error::CycleResult;
use macrocycle::mat::{NOMINAL_ARRAY, REAL_ARRAY};
use macrocycle::multiplier::{ModelParams, DEFAULT_PERIODS};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "macrocycle")]
#[command(about = "Business-cycle analysis of national-accounts series")]
#[command(long_about = "macrocycle - Business-cycle analysis of national-accounts series

Loads nominal and real (or deflator) series per region from a workbook,
derives deflators and log growth rates, checks the growth identity,
splits real series into HP trend and cycle, and reports cyclical
volatility relative to a base variable.

COMMANDS:
  analyze   - Run the full analysis described by a YAML run file
  validate  - Check a run file and the sheets it references
  identity  - Deflator and growth identity from a MATLAB .mat file
  inspect   - List workbook sheets or preview a sheet
  multiplier - Steady state, transitions and policy scenarios of an
              income-expenditure model
  figures   - LaTeX appendix with one box per .png figure
  captions  - Add empty captions to uncaptioned figure boxes

EXAMPLES:
  macrocycle analyze run.yaml -o output
  macrocycle inspect Quarterly_Data.xlsx --sheet \"Sheet 41\" --rows 15
  macrocycle identity GDP_data.mat --regions \"Euro Area,Greece\" --first-period 1995

Logging follows RUST_LOG (default: warn).")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(long_about = "Run the full analysis described by a YAML run file.

RUN FILE:
  workbook: Quarterly_Data.xlsx
  base_variable: GDP
  frequency: quarterly    # optional, sets the default lambda
  lambda: 1600            # optional, HP smoothing parameter
  layout:
    label_row: 10         # 1-based row of period labels
    start_label: 1995-Q1  # first period to use
    end_label: 2022-Q4    # optional, last period to use
    regions:
      - { name: Euro, row: 12 }
      - { name: Greece, row: 13 }
  variables:
    - { name: GDP, nominal: Sheet 41, deflator: Sheet 80 }
    - { name: Consumption, nominal: Sheet 42, real: Sheet 81 }

OUTPUTS (in output_dir):
  relative_volatility_<region>.csv, <variable>_growth.csv, <variable>_hp.csv
  cycles.xlsx with trend/cycle charts
  figures/*.png (or report.figures_dir)
  report.tex

A variable that cannot be processed is skipped with a diagnostic.")]
    /// Run the full analysis described by a YAML run file
    Analyze {
        /// Path to the YAML run file
        file: PathBuf,

        /// Output directory (overrides output_dir in the run file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show per-region summaries and progress
        #[arg(short, long)]
        verbose: bool,
    },

    /// Check a run file and the layout of every sheet it references
    Validate {
        /// Path to the YAML run file
        file: PathBuf,
    },

    #[command(long_about = "Deflator, growth rates and growth identity from a MATLAB .mat file.

The arrays are (periods x regions) numeric matrices. Periods are numbered
from --first-period since MAT files carry no time axis.

EXAMPLE:
  macrocycle identity GDP_data.mat --regions \"Euro Area,Greece\" -o output")]
    /// Deflator and growth identity from a MATLAB .mat file
    Identity {
        /// Path to the .mat file
        file: PathBuf,

        /// Array with nominal values
        #[arg(long, default_value = NOMINAL_ARRAY)]
        nominal: String,

        /// Array with real values
        #[arg(long, default_value = REAL_ARRAY)]
        real: String,

        /// Region names, one per array column
        #[arg(long, value_delimiter = ',')]
        regions: Vec<String>,

        /// Label of the first period (e.g. the first year)
        #[arg(long, default_value_t = 1995, allow_negative_numbers = true)]
        first_period: i64,

        /// Directory for the growth CSV and identity.tex
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List workbook sheets or preview the first rows of one sheet
    Inspect {
        /// Path to the workbook (.xlsx, .xls, .ods)
        file: PathBuf,

        /// Sheet to preview
        #[arg(short, long)]
        sheet: Option<String>,

        /// Number of rows to preview
        #[arg(short, long, default_value_t = 20)]
        rows: usize,
    },

    #[command(long_about = "Steady state, transitions and policy scenarios of a lagged
income-expenditure model.

  C_t = C_bar + c (Y_{t-1} - T)
  I_t = I_bar + alpha Y_{t-1} - b i
  Y_t = C_t + I_t + G

Transitions start at --start-ratio times each steady state, once per
propensity in --compare. Policy scenarios (G +50%, T +30%, i +100bps)
start from the base steady state.

EXAMPLE:
  macrocycle multiplier --propensity 0.5 --compare 0.4,0.5,0.6 -o output")]
    /// Income-expenditure model: steady state, transitions, policy scenarios
    Multiplier {
        /// Marginal propensity to consume (c)
        #[arg(long, default_value_t = 0.5)]
        propensity: f64,

        /// Investment sensitivity to income (alpha)
        #[arg(long, default_value_t = 0.1)]
        alpha: f64,

        /// Investment sensitivity to the interest rate (b)
        #[arg(long, default_value_t = 0.1)]
        rate_sensitivity: f64,

        /// Government spending (G)
        #[arg(long, default_value_t = 1.7)]
        spending: f64,

        /// Taxes (T)
        #[arg(long, default_value_t = 1.7)]
        taxes: f64,

        /// Interest rate (i)
        #[arg(long, default_value_t = 0.04)]
        rate: f64,

        /// Periods after the first one
        #[arg(long, default_value_t = DEFAULT_PERIODS)]
        periods: usize,

        /// Income at t = -1 as a share of the steady state
        #[arg(long, default_value_t = 0.9)]
        start_ratio: f64,

        /// Propensities to compare transitions for
        #[arg(long, value_delimiter = ',', default_values_t = [0.4, 0.5, 0.6])]
        compare: Vec<f64>,

        /// Directory for multiplier_paths.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a LaTeX appendix with one tcolorbox per .png in a directory
    Figures {
        /// Directory containing .png figures
        dir: PathBuf,

        /// Output .tex file
        output: PathBuf,
    },

    /// Add an empty caption to every uncaptioned tcolorbox figure
    Captions {
        /// Input .tex file
        input: PathBuf,

        /// Output .tex file
        output: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "macrocycle=info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .init();
}

fn main() -> CycleResult<()> {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Analyze { verbose: true, .. });
    init_logging(verbose);

    match cli.command {
        Commands::Analyze {
            file,
            output,
            verbose,
        } => cli::analyze(file, output, verbose),

        Commands::Validate { file } => cli::validate(file),

        Commands::Identity {
            file,
            nominal,
            real,
            regions,
            first_period,
            output,
        } => cli::identity(file, nominal, real, regions, first_period, output),

        Commands::Inspect { file, sheet, rows } => cli::inspect(file, sheet, rows),

        Commands::Multiplier {
            propensity,
            alpha,
            rate_sensitivity,
            spending,
            taxes,
            rate,
            periods,
            start_ratio,
            compare,
            output,
        } => {
            let params = ModelParams {
                c: propensity,
                alpha,
                b: rate_sensitivity,
                g: spending,
                t: taxes,
                i: rate,
                ..ModelParams::default()
            };
            cli::multiplier(params, periods, start_ratio, compare, output)
        }

        Commands::Figures { dir, output } => cli::figures(dir, output),

        Commands::Captions { input, output } => cli::captions(input, output),
    }
}
