//! Chunked Dataset Reader
//!
//! Reads an ordered sensor CSV in fixed-size chunks without ever holding the
//! whole file in memory. The reader is lazy, finite and non-restartable; no
//! row is duplicated or dropped across chunk boundaries, and every chunk
//! carries the global index of its first row. Window boundaries downstream
//! are defined over that global index, so chunking stays a pure
//! memory-bounding mechanism.
//!
//! Malformed rows are skipped, counted in [`ReaderStats`] and logged — a bad
//! line never aborts a run. Configuration problems, by contrast, are caught
//! before a reader is even constructed (see `config`).

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use tracing::{debug, warn};

use super::SensorReading;
use crate::config::ConfigError;

/// Counters accumulated while reading a dataset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReaderStats {
    /// Rows parsed successfully.
    pub rows_read: u64,
    /// Lines skipped because they could not be parsed against the schema.
    pub malformed_rows: u64,
    /// Total data lines seen (excludes the header and blank lines).
    pub lines_processed: u64,
}

/// One chunk of consecutive rows in file order.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Global index (0-based) of `rows[0]` within the whole row stream.
    pub first_row_index: u64,
    pub rows: Vec<SensorReading>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Why a single line failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    /// Wrong number of comma-separated fields.
    FieldCount { got: usize },
    /// A field did not parse against its schema type.
    Field { field: &'static str, raw: String },
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FieldCount { got } => {
                write!(f, "expected 4 or 5 fields, got {}", got)
            }
            Self::Field { field, raw } => write!(f, "invalid {}: {:?}", field, raw),
        }
    }
}

impl std::error::Error for RowError {}

/// Parse a timestamp field: integer Unix milliseconds first, else a naive
/// datetime string (the raw exports carry `2020-02-01 00:00:00` style
/// timestamps before preprocessing normalizes them).
fn parse_timestamp(raw: &str) -> Option<i64> {
    if let Ok(ms) = raw.parse::<i64>() {
        return Some(ms);
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    None
}

/// Parse one data line against the fixed schema.
///
/// Accepts 4 fields (pre-`prepare` inputs without `available_time`, which
/// then defaults to `timestamp`) or 5 fields. An empty `value` field is a
/// null reading, not an error.
pub fn parse_row(line: &str) -> Result<SensorReading, RowError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 4 && fields.len() != 5 {
        return Err(RowError::FieldCount { got: fields.len() });
    }

    let value_id = fields[0].parse::<i64>().map_err(|_| RowError::Field {
        field: "value_id",
        raw: fields[0].to_string(),
    })?;
    let sensor_id = fields[1].parse::<i64>().map_err(|_| RowError::Field {
        field: "sensor_id",
        raw: fields[1].to_string(),
    })?;
    let timestamp = parse_timestamp(fields[2]).ok_or_else(|| RowError::Field {
        field: "timestamp",
        raw: fields[2].to_string(),
    })?;

    let value = if fields[3].is_empty() {
        None
    } else {
        Some(fields[3].parse::<f64>().map_err(|_| RowError::Field {
            field: "value",
            raw: fields[3].to_string(),
        })?)
    };

    let available_time = match fields.get(4) {
        Some(raw) if !raw.is_empty() => parse_timestamp(raw).ok_or_else(|| RowError::Field {
            field: "available_time",
            raw: raw.to_string(),
        })?,
        _ => timestamp,
    };

    Ok(SensorReading { value_id, sensor_id, timestamp, value, available_time })
}

/// Lazy chunked reader over a sensor CSV.
pub struct ChunkedReader {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    chunk_size: usize,
    next_row_index: u64,
    stats: ReaderStats,
    header_skipped: bool,
    done: bool,
}

impl ChunkedReader {
    /// Open `path` for chunked reading. A zero `chunk_size` is a
    /// configuration error, caught here for chunk sizes that arrive via CLI
    /// flags rather than a validated [`QualityConfig`].
    ///
    /// [`QualityConfig`]: crate::config::QualityConfig
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ConfigError::NonPositive { field: "CHUNK_SIZE", value: 0 }.into());
        }
        let file = File::open(path)
            .with_context(|| format!("failed to open dataset {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            chunk_size,
            next_row_index: 0,
            stats: ReaderStats::default(),
            header_skipped: false,
            done: false,
        })
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Produce the next chunk, or `None` at end of file. At most
    /// `chunk_size` rows per call, in file order.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>> {
        if self.done {
            return Ok(None);
        }

        let first_row_index = self.next_row_index;
        let mut rows = Vec::with_capacity(self.chunk_size);

        while rows.len() < self.chunk_size {
            let line = match self.lines.next() {
                Some(line) => line
                    .with_context(|| format!("I/O error reading {}", self.path.display()))?,
                None => {
                    self.done = true;
                    break;
                }
            };
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            // The first non-empty line may be a header; a header's first
            // field never parses as an integer id.
            if !self.header_skipped {
                self.header_skipped = true;
                let first_field = line.split(',').next().unwrap_or("");
                if first_field.trim().parse::<i64>().is_err() {
                    debug!("skipping header line");
                    continue;
                }
            }

            self.stats.lines_processed += 1;
            match parse_row(line) {
                Ok(row) => {
                    rows.push(row);
                    self.next_row_index += 1;
                }
                Err(err) => {
                    self.stats.malformed_rows += 1;
                    warn!(line = self.stats.lines_processed, %err, "skipping malformed row");
                }
            }
        }

        if rows.is_empty() {
            return Ok(None);
        }
        self.stats.rows_read += rows.len() as u64;
        Ok(Some(Chunk { first_row_index, rows }))
    }
}

// =============================================================================
// TESTS
// =============================================================================
