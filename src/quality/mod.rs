//! Windowed Data-Quality Metrics
//!
//! Offline replication of the statistical pipeline the DSMS runs over the
//! degraded stream, so the two outputs are directly comparable window by
//! window. Per tumbling window (count-based, see [`windows`]):
//!
//! - **Accuracy**: null values count as incorrect; among the non-null
//!   values, any whose absolute deviation from the window median exceeds
//!   `3 × MAD × 1.4826` counts as incorrect too.
//!   `accuracy = 1 − incorrect / window_size` — the denominator is the full
//!   window, not the filtered count.
//! - **Completeness**: `1 − missing / window_size`, where a row is missing
//!   when its required-field set has a null (only `value` is nullable in
//!   this model).
//! - **Timeliness**: per row `max(1 − (available_time − timestamp) /
//!   volatility, 0)`, averaged over every row in the window, nulls included.
//!
//! Degenerate windows are pinned to defined values rather than NaN: a window
//! with zero rows scores 1.0 everywhere; a full window whose values are all
//! null scores accuracy 0.0 (every row is incorrect) with zero sentinels for
//! the median diagnostics.

pub mod stats;
pub mod windows;

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::dataset::{AtomicCsvFile, ChunkedReader, ReaderStats, SensorReading};
use self::stats::{mad, mad_threshold, median_in_place};
use self::windows::{Window, WindowAssembler};

/// Header of the metrics CSV (also the layout the DSMS's own export is
/// reconciled against).
pub const METRICS_CSV_HEADER: &str = "Value_Start,Value_End,Accuracy,Completeness,Timeliness";

/// Identity of one tumbling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowKey {
    /// Zero-based position of the window in the stream.
    pub ordinal: u64,
    /// `value_id` of the window's first row.
    pub value_start: i64,
    /// `value_id` of the window's last row.
    pub value_end: i64,
}

/// Per-window metric output, plus the intermediate statistics useful when
/// chasing a mismatch by hand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowMetrics {
    pub key: WindowKey,
    pub accuracy: f64,
    pub completeness: f64,
    pub timeliness: f64,
    /// Median of the window's non-null values (0 when there are none).
    pub median: f64,
    /// Median absolute deviation around that median (0 when undefined).
    pub mad: f64,
    /// Outlier threshold `3 × mad × 1.4826`.
    pub threshold: f64,
    /// Rows counted incorrect by the accuracy metric (nulls + outliers).
    pub incorrect: usize,
}

/// Compute all metrics for one window.
pub fn compute_window_metrics(window: &Window, volatility: i64) -> WindowMetrics {
    let key = WindowKey {
        ordinal: window.ordinal,
        value_start: window.value_start(),
        value_end: window.value_end(),
    };
    let (accuracy, median, mad, threshold, incorrect) = window_accuracy(&window.rows);
    WindowMetrics {
        key,
        accuracy,
        completeness: window_completeness(&window.rows),
        timeliness: window_timeliness(&window.rows, volatility),
        median,
        mad,
        threshold,
        incorrect,
    }
}

/// Accuracy pipeline: returns `(accuracy, median, mad, threshold, incorrect)`.
fn window_accuracy(rows: &[SensorReading]) -> (f64, f64, f64, f64, usize) {
    if rows.is_empty() {
        return (1.0, 0.0, 0.0, 0.0, 0);
    }
    let window_size = rows.len();
    let nulls = rows.iter().filter(|r| r.value.is_none()).count();

    let mut values: Vec<f64> = rows.iter().filter_map(|r| r.value).collect();
    let Some(median) = median_in_place(&mut values) else {
        // Every value is null: every row is incorrect, no median exists.
        return (0.0, 0.0, 0.0, 0.0, nulls);
    };
    // `values` is sorted now; deviations are computed from the same slice.
    let mad = mad(&values, median).unwrap_or(0.0);
    let threshold = mad_threshold(mad);

    let outliers = values.iter().filter(|&&v| (v - median).abs() > threshold).count();
    let incorrect = nulls + outliers;
    let accuracy = 1.0 - incorrect as f64 / window_size as f64;
    (accuracy, median, mad, threshold, incorrect)
}

fn window_completeness(rows: &[SensorReading]) -> f64 {
    if rows.is_empty() {
        return 1.0;
    }
    let missing = rows.iter().filter(|r| r.is_missing()).count();
    1.0 - missing as f64 / rows.len() as f64
}

fn window_timeliness(rows: &[SensorReading], volatility: i64) -> f64 {
    if rows.is_empty() {
        return 1.0;
    }
    let total: f64 = rows
        .iter()
        .map(|r| (1.0 - r.currency_ms() as f64 / volatility as f64).max(0.0))
        .sum();
    total / rows.len() as f64
}

/// Result of measuring one dataset file.
#[derive(Debug, Clone)]
pub struct MeasureOutcome {
    pub windows: Vec<WindowMetrics>,
    pub reader_stats: ReaderStats,
    /// Rows in the trailing partial window, dropped per the tumbling
    /// discipline.
    pub trailing_rows_dropped: usize,
}

/// Stream a dataset through the window assembler and compute metrics for
/// every full window. `chunk_size` only bounds memory; any value yields
/// identical metrics.
pub fn measure_file(
    path: &Path,
    window_size: usize,
    volatility: i64,
    chunk_size: usize,
    show: bool,
) -> Result<MeasureOutcome> {
    info!(
        path = %path.display(),
        window_size,
        volatility,
        chunk_size,
        "measuring data quality"
    );

    let mut reader = ChunkedReader::open(path, chunk_size)?;
    let mut assembler = WindowAssembler::new(window_size);
    let mut metrics = Vec::new();

    while let Some(chunk) = reader.next_chunk()? {
        for window in assembler.push_rows(chunk.rows) {
            let m = compute_window_metrics(&window, volatility);
            if show {
                print_window_line(&m);
            }
            metrics.push(m);
        }
    }

    let trailing_rows_dropped = match assembler.finish() {
        Some(trailing) => {
            warn!(
                rows = trailing.rows.len(),
                first_row_index = trailing.first_row_index,
                "dropping trailing partial window"
            );
            trailing.rows.len()
        }
        None => 0,
    };

    let reader_stats = reader.stats();
    if reader_stats.malformed_rows > 0 {
        warn!(malformed = reader_stats.malformed_rows, "malformed rows were skipped");
    }
    info!(windows = metrics.len(), rows = reader_stats.rows_read, "measurement complete");

    Ok(MeasureOutcome { windows: metrics, reader_stats, trailing_rows_dropped })
}

fn print_window_line(m: &WindowMetrics) {
    println!(
        "window {:>5}  id {:>10}-{:<10}  accuracy {:>8.6}  completeness {:>6.4}  timeliness {:>6.4}",
        m.key.ordinal, m.key.value_start, m.key.value_end, m.accuracy, m.completeness, m.timeliness
    );
}

/// Write the metrics CSV the comparator (and any downstream tooling) reads.
pub fn write_metrics_csv(path: &Path, metrics: &[WindowMetrics]) -> Result<()> {
    let mut out = AtomicCsvFile::create(path, METRICS_CSV_HEADER)?;
    for m in metrics {
        out.write_line(&format!(
            "{},{},{:.6},{:.6},{:.6}",
            m.key.value_start, m.key.value_end, m.accuracy, m.completeness, m.timeliness
        ))?;
    }
    out.finalize()?;
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
