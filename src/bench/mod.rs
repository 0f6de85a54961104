//! DSMS Timing Analysis
//!
//! Latency and throughput extracted from the DSMS's own result files. The
//! engine appends a TimeInterval to every emitted window — the trailing two
//! columns hold the window's processing start and end timestamps in
//! milliseconds — but omits their header names, so the header row is shorter
//! than the data rows and parsing works from the END of each line.
//!
//! Latency is `end − start` per window; throughput is windows per second
//! over the full result span. `compare` runs the same analysis over several
//! result files (one per ingestion-rate configuration, typically) and
//! appends the figures to a summary CSV.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

/// Timing figures for one DSMS result file.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingReport {
    pub file: String,
    pub windows: usize,
    pub avg_latency_ms: f64,
    pub throughput_per_sec: f64,
}

/// Header of the comparison summary CSV.
pub const COMPARISON_CSV_HEADER: &str = "File,Average Latency (ms),Throughput (windows/sec)";

/// Analyze a single DSMS result file.
pub fn analyze_file(path: &Path) -> Result<TimingReport> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read result file {}", path.display()))?;

    let mut latency_sum = 0.0f64;
    let mut windows = 0usize;
    let mut span_start = f64::INFINITY;
    let mut span_end = f64::NEG_INFINITY;
    let mut skipped = 0u64;

    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let parsed = match fields.as_slice() {
            [.., start, end] => start.parse::<f64>().ok().zip(end.parse::<f64>().ok()),
            _ => None,
        };
        let Some((start, end)) = parsed else {
            // The header row (with its missing TimeInterval names) lands
            // here, as does any malformed line.
            skipped += 1;
            continue;
        };
        latency_sum += end - start;
        span_start = span_start.min(start);
        span_end = span_end.max(end);
        windows += 1;
    }

    if windows == 0 {
        bail!("no window rows found in {}", path.display());
    }
    if skipped > 1 {
        warn!(skipped, path = %path.display(), "skipped non-window lines");
    }

    let avg_latency_ms = latency_sum / windows as f64;
    let span_ms = span_end - span_start;
    let throughput_per_sec =
        if span_ms > 0.0 { windows as f64 / (span_ms / 1000.0) } else { 0.0 };

    let file = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("result")
        .to_string();
    info!(file = %file, windows, avg_latency_ms, throughput_per_sec, "result file analyzed");
    Ok(TimingReport { file, windows, avg_latency_ms, throughput_per_sec })
}

/// Print one report the way `benchmark analyze` shows it.
pub fn print_report(report: &TimingReport) {
    println!(" total windows processed: {}", report.windows);
    println!(" average latency:         {:.4} ms", report.avg_latency_ms);
    println!(" throughput:              {:.4} windows/sec", report.throughput_per_sec);
}

/// Analyze several result files, print an aligned comparison table, and
/// append each file's figures to `summary_path` (created with a header on
/// first use). Files that fail to parse are reported and skipped.
pub fn compare_files(paths: &[PathBuf], summary_path: &Path) -> Result<Vec<TimingReport>> {
    let mut reports = Vec::new();
    for path in paths {
        match analyze_file(path) {
            Ok(report) => reports.push(report),
            Err(err) => warn!(path = %path.display(), %err, "skipping result file"),
        }
    }
    if reports.is_empty() {
        bail!("none of the provided result files could be analyzed");
    }

    println!(" {:<24} {:>10} {:>18} {:>22}", "file", "windows", "avg latency (ms)", "throughput (win/sec)");
    for report in &reports {
        println!(
            " {:<24} {:>10} {:>18.4} {:>22.4}",
            report.file, report.windows, report.avg_latency_ms, report.throughput_per_sec
        );
    }

    append_summary(summary_path, &reports)?;
    info!(summary = %summary_path.display(), files = reports.len(), "comparison summary updated");
    Ok(reports)
}

fn append_summary(path: &Path, reports: &[TimingReport]) -> Result<()> {
    let needs_header = !path.exists();
    let mut out = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open summary {}", path.display()))?;
    if needs_header {
        writeln!(out, "{}", COMPARISON_CSV_HEADER)?;
    }
    for report in reports {
        writeln!(
            out,
            "{},{:.4},{:.4}",
            report.file, report.avg_latency_ms, report.throughput_per_sec
        )?;
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
