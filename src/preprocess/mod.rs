//! Dataset Preparation
//!
//! Chunked single-pass file jobs that turn a raw sensor export into the
//! datasets the benchmark consumes:
//!
//! - [`split_by_sensor`]: one output file per `sensor_id`.
//! - [`extract_first_days`]: the first N days of one sensor's stream.
//! - [`prepare_dataset`]: the degraded dataset handed to the DSMS — read,
//!   normalize timestamps, inject defects, write atomically.
//!
//! Timestamp normalization (datetime strings to Unix milliseconds) happens
//! inside the dataset reader, so every job here operates on normalized rows.

pub mod stats;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Duration;
use tracing::info;

use crate::config::QualityConfig;
use crate::dataset::{ChunkedReader, DatasetWriter, ReaderStats};
use crate::inject::{DefectInjector, InjectionTotals};

/// Outcome of [`split_by_sensor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSummary {
    pub sensors: usize,
    pub rows_written: u64,
}

/// Split a combined dataset into one file per sensor, preserving row order
/// within each sensor's stream.
pub fn split_by_sensor(
    input: &Path,
    output_dir: &Path,
    chunk_size: usize,
) -> Result<SplitSummary> {
    info!(input = %input.display(), "splitting dataset by sensor");
    let mut reader = ChunkedReader::open(input, chunk_size)?;
    let mut writers: HashMap<i64, DatasetWriter> = HashMap::new();
    let mut rows_written = 0u64;

    while let Some(chunk) = reader.next_chunk()? {
        for row in chunk.rows {
            let writer = match writers.entry(row.sensor_id) {
                std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
                std::collections::hash_map::Entry::Vacant(entry) => {
                    let path = output_dir.join(format!("sensor_{}.csv", row.sensor_id));
                    entry.insert(DatasetWriter::create(&path)?)
                }
            };
            writer.write_row(&row)?;
            rows_written += 1;
        }
    }

    let sensors = writers.len();
    // Deterministic finalize order keeps logs stable across runs.
    let mut finished: Vec<(i64, DatasetWriter)> = writers.into_iter().collect();
    finished.sort_by_key(|(sensor_id, _)| *sensor_id);
    for (sensor_id, writer) in finished {
        let rows = writer.finalize()?;
        info!(sensor_id, rows, "sensor file written");
    }

    info!(sensors, rows_written, "split complete");
    Ok(SplitSummary { sensors, rows_written })
}

/// Outcome of [`extract_first_days`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractSummary {
    pub path: PathBuf,
    pub rows_written: u64,
}

/// Copy the first `days` days of a sensor file, measured from its first
/// timestamp, into `<stem>_original.csv`. Reading stops as soon as the
/// stream passes the cutoff.
pub fn extract_first_days(
    input: &Path,
    days: i64,
    output_dir: &Path,
    chunk_size: usize,
) -> Result<ExtractSummary> {
    if days <= 0 {
        bail!("days must be positive, got {}", days);
    }
    let stem = file_stem(input)?;
    let output = output_dir.join(format!("{}_original.csv", stem));
    info!(input = %input.display(), days, output = %output.display(), "extracting first days");

    let mut reader = ChunkedReader::open(input, chunk_size)?;
    let mut writer = DatasetWriter::create(&output)?;
    let mut cutoff: Option<i64> = None;
    let horizon_ms = Duration::days(days).num_milliseconds();

    'outer: while let Some(chunk) = reader.next_chunk()? {
        for row in &chunk.rows {
            let cutoff = *cutoff.get_or_insert(row.timestamp + horizon_ms);
            if row.timestamp >= cutoff {
                break 'outer;
            }
            writer.write_row(row)?;
        }
    }

    let rows_written = writer.finalize()?;
    info!(rows_written, "extract complete");
    Ok(ExtractSummary { path: output, rows_written })
}

/// Outcome of [`prepare_dataset`].
#[derive(Debug, Clone, PartialEq)]
pub struct PrepareSummary {
    pub path: PathBuf,
    pub totals: InjectionTotals,
    pub reader_stats: ReaderStats,
}

/// Produce the degraded dataset the DSMS ingests: read `input` in chunks,
/// inject defects deterministically for `(config, seed)`, and write
/// `<stem>_processed.csv` atomically. The output only appears at its final
/// path once complete.
pub fn prepare_dataset(
    input: &Path,
    output_dir: &Path,
    config: &QualityConfig,
    seed: u64,
) -> Result<PrepareSummary> {
    let mut stem = file_stem(input)?;
    if let Some(base) = stem.strip_suffix("_original") {
        stem = base.to_string();
    }
    let output = output_dir.join(format!("{}_processed.csv", stem));
    info!(
        input = %input.display(),
        output = %output.display(),
        seed,
        "preparing degraded dataset"
    );

    let mut reader = ChunkedReader::open(input, config.chunk_size)?;
    let mut injector = DefectInjector::new(config, seed);
    let mut writer = DatasetWriter::create(&output)?;
    let mut totals = InjectionTotals::default();

    while let Some(mut chunk) = reader.next_chunk()? {
        let defects = injector.inject_chunk(&mut chunk.rows);
        totals.absorb(chunk.rows.len(), &defects);
        for row in &chunk.rows {
            writer.write_row(row)?;
        }
    }

    let rows = writer.finalize()?;
    let reader_stats = reader.stats();
    info!(
        rows,
        outliers = totals.outliers,
        nulled = totals.nulled,
        delayed = totals.delayed,
        malformed = reader_stats.malformed_rows,
        "prepare complete"
    );
    Ok(PrepareSummary { path: output, totals, reader_stats })
}

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .with_context(|| format!("cannot derive a file stem from {}", path.display()))
}

// =============================================================================
// TESTS
// =============================================================================
