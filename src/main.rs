//! dqbench CLI
//!
//! Command surface mirrors the benchmark workflow:
//!
//! ```bash
//! dqbench preprocess split combined.csv -o sensors/
//! dqbench preprocess extract sensors/sensor_4.csv --days 7 -o data/
//! dqbench preprocess prepare data/sensor_4_original.csv -o data/ -c bench.toml --seed 42
//! dqbench data-quality show data/sensor_4_processed.csv -w 10000 -v 2000
//! dqbench data-quality verify data/sensor_4_processed.csv odysseus_out.csv -w 10000 -v 2000
//! dqbench benchmark analyze odysseus_out.csv
//! dqbench benchmark compare run_10k.csv run_20k.csv run_30k.csv
//! dqbench show-stats data/sensor_4_processed.csv
//! ```
//!
//! # Exit Codes
//!
//! - 0: success; for `verify`, all windows agreed within tolerance
//! - 1: verification completed with mismatches or missing windows
//! - 2: configuration or validation error
//! - 3: runtime error (I/O, malformed inputs beyond recovery)

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use dqbench::bench;
use dqbench::config::{ConfigError, QualityConfig};
use dqbench::preprocess::{self, stats};
use dqbench::quality;
use dqbench::verify;

/// Data-quality benchmarking toolkit for stream processing engines.
#[derive(Parser, Debug)]
#[command(name = "dqbench")]
#[command(about = "Inject data-quality defects and verify DSMS window metrics offline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dataset preparation: split, extract, prepare.
    #[command(subcommand)]
    Preprocess(PreprocessCmd),

    /// Offline data-quality measurement and verification.
    #[command(name = "data-quality", subcommand)]
    DataQuality(DataQualityCmd),

    /// Latency/throughput analysis of DSMS result files.
    #[command(subcommand)]
    Benchmark(BenchmarkCmd),

    /// Value-distribution statistics for a dataset.
    ShowStats {
        /// Dataset to scan
        input: PathBuf,

        /// Rows per processing chunk
        #[arg(long, default_value_t = 50_000)]
        chunk_size: usize,

        /// Number of most frequent values to list
        #[arg(long, default_value_t = 20)]
        top: usize,
    },
}

#[derive(Subcommand, Debug)]
enum PreprocessCmd {
    /// Split a combined dataset into one file per sensor_id.
    Split {
        /// Combined dataset CSV
        input: PathBuf,

        /// Output directory for the per-sensor files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Rows per processing chunk
        #[arg(long, default_value_t = 50_000)]
        chunk_size: usize,
    },

    /// Extract the first N days of a sensor file.
    Extract {
        /// Sensor dataset CSV
        input: PathBuf,

        /// Number of days to extract
        #[arg(short, long, default_value_t = 7)]
        days: i64,

        /// Output directory for the extracted file
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Rows per processing chunk
        #[arg(long, default_value_t = 50_000)]
        chunk_size: usize,
    },

    /// Inject defects and write the degraded dataset for the DSMS.
    Prepare {
        /// Input dataset CSV (timestamps are normalized to Unix ms)
        input: PathBuf,

        /// Output directory for the processed file
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Configuration file (TOML); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// RNG seed; identical seed and config reproduce the output exactly
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

#[derive(Subcommand, Debug)]
enum DataQualityCmd {
    /// Measure and print per-window data-quality metrics.
    Show {
        /// Degraded dataset CSV
        data_file: PathBuf,

        /// Rows per tumbling window
        #[arg(short, long, default_value_t = 10_000)]
        window_size: usize,

        /// Timeliness decay horizon in milliseconds
        #[arg(short, long, default_value_t = 2000)]
        volatility: i64,

        /// Rows per processing chunk (defaults to the window size)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Also write the metrics to this CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify the DSMS's window metrics against the offline reference.
    Verify {
        /// Degraded dataset CSV (the DSMS's input)
        data_file: PathBuf,

        /// The DSMS's result CSV
        result_file: PathBuf,

        /// Rows per tumbling window
        #[arg(short, long, default_value_t = 10_000)]
        window_size: usize,

        /// Timeliness decay horizon in milliseconds
        #[arg(short, long, default_value_t = 2000)]
        volatility: i64,

        /// Rows per processing chunk (defaults to the window size)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Per-metric comparison tolerance
        #[arg(long, default_value_t = verify::DEFAULT_TOLERANCE)]
        tolerance: f64,

        /// Write the full verification report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum BenchmarkCmd {
    /// Latency and throughput of one DSMS result file.
    Analyze {
        /// DSMS result CSV with trailing TimeInterval columns
        result_file: PathBuf,
    },

    /// Compare several result files and append to a summary CSV.
    Compare {
        /// DSMS result CSVs
        #[arg(required = true)]
        result_files: Vec<PathBuf>,

        /// Summary CSV to append to
        #[arg(short, long, default_value = "comparison.csv")]
        summary: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            error!("{:#}", err);
            if err.downcast_ref::<ConfigError>().is_some() {
                ExitCode::from(2)
            } else {
                ExitCode::from(3)
            }
        }
    }
}

fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Preprocess(cmd) => run_preprocess(cmd),
        Commands::DataQuality(cmd) => run_data_quality(cmd),
        Commands::Benchmark(cmd) => run_benchmark(cmd),
        Commands::ShowStats { input, chunk_size, top } => {
            let stats = stats::calculate_statistics(&input, chunk_size, top)?;
            stats::print_stats(&stats);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_preprocess(cmd: PreprocessCmd) -> Result<ExitCode> {
    match cmd {
        PreprocessCmd::Split { input, output_dir, chunk_size } => {
            let output_dir = ensure_output_dir(output_dir)?;
            let summary = preprocess::split_by_sensor(&input, &output_dir, chunk_size)?;
            println!(
                " split {} rows into {} sensor file(s) under {}",
                summary.rows_written,
                summary.sensors,
                output_dir.display()
            );
        }
        PreprocessCmd::Extract { input, days, output_dir, chunk_size } => {
            let output_dir = ensure_output_dir(output_dir)?;
            let summary = preprocess::extract_first_days(&input, days, &output_dir, chunk_size)?;
            println!(
                " extracted first {} day(s) ({} rows) to {}",
                days,
                summary.rows_written,
                summary.path.display()
            );
        }
        PreprocessCmd::Prepare { input, output_dir, config, seed } => {
            let config = QualityConfig::load(config.as_deref())?;
            let output_dir = ensure_output_dir(output_dir)?;
            let summary = preprocess::prepare_dataset(&input, &output_dir, &config, seed)?;
            println!(" degraded dataset written to {}", summary.path.display());
            println!(
                " rows {}   outliers {}   nulled {}   delayed {}   malformed skipped {}",
                summary.totals.rows,
                summary.totals.outliers,
                summary.totals.nulled,
                summary.totals.delayed,
                summary.reader_stats.malformed_rows
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_data_quality(cmd: DataQualityCmd) -> Result<ExitCode> {
    match cmd {
        DataQualityCmd::Show { data_file, window_size, volatility, chunk_size, output } => {
            validate_window_params(window_size, volatility)?;
            let chunk_size = chunk_size.unwrap_or(window_size);
            let outcome =
                quality::measure_file(&data_file, window_size, volatility, chunk_size, true)?;
            if let Some(output) = output {
                quality::write_metrics_csv(&output, &outcome.windows)?;
                println!(" metrics written to {}", output.display());
            }
            println!(
                " {} window(s), {} trailing row(s) dropped, {} malformed row(s) skipped",
                outcome.windows.len(),
                outcome.trailing_rows_dropped,
                outcome.reader_stats.malformed_rows
            );
            Ok(ExitCode::SUCCESS)
        }
        DataQualityCmd::Verify {
            data_file,
            result_file,
            window_size,
            volatility,
            chunk_size,
            tolerance,
            report,
        } => {
            validate_window_params(window_size, volatility)?;
            let chunk_size = chunk_size.unwrap_or(window_size);
            let outcome =
                quality::measure_file(&data_file, window_size, volatility, chunk_size, false)?;
            let dsms = verify::read_dsms_results(&result_file)?;
            let verification = verify::compare(&outcome.windows, &dsms, tolerance);
            verification.print_summary();
            if let Some(report) = report {
                verification.write_json(&report)?;
                println!(" report written to {}", report.display());
            }
            if verification.is_clean() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(1))
            }
        }
    }
}

fn run_benchmark(cmd: BenchmarkCmd) -> Result<ExitCode> {
    match cmd {
        BenchmarkCmd::Analyze { result_file } => {
            let report = bench::analyze_file(&result_file)?;
            bench::print_report(&report);
        }
        BenchmarkCmd::Compare { result_files, summary } => {
            bench::compare_files(&result_files, &summary)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// CLI window parameters bypass the config file, so they get the same
/// eager validation.
fn validate_window_params(window_size: usize, volatility: i64) -> Result<()> {
    if window_size == 0 {
        return Err(ConfigError::NonPositive { field: "WINDOW_SIZE", value: 0 }.into());
    }
    if volatility <= 0 {
        return Err(ConfigError::NonPositive { field: "VOLATILITY", value: volatility }.into());
    }
    Ok(())
}

fn ensure_output_dir(dir: Option<PathBuf>) -> Result<PathBuf> {
    let dir = dir.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
