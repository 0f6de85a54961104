//! Sensor Dataset Model and I/O
//!
//! The on-disk format is an ordered CSV with the fixed column layout
//!
//! ```csv
//! value_id,sensor_id,timestamp,value,available_time
//! 1,4,1580515200000,7.3,1580515201250
//! 2,4,1580515260000,,1580515260900
//! ```
//!
//! - `value_id` / `sensor_id`: integer identity fields, never mutated.
//! - `timestamp`: Unix milliseconds (datetime strings are normalized on read).
//! - `value`: nullable double; a null serializes as an empty field.
//! - `available_time`: Unix milliseconds, when the reading became visible.
//!   Inputs that predate the `prepare` step may omit the column entirely; it
//!   then defaults to `timestamp`.
//!
//! Reading is chunked ([`ChunkedReader`]) so arbitrarily large datasets are
//! processed in bounded memory while every row keeps its global index.
//! Writing goes through [`DatasetWriter`], which only moves output to its
//! final path on `finalize()` — the presence of the file at its final path is
//! the completion marker.

pub mod reader;
pub mod writer;

pub use self::reader::{Chunk, ChunkedReader, ReaderStats, RowError};
pub use self::writer::{AtomicCsvFile, DatasetWriter};

/// Header line of the canonical dataset layout.
pub const CSV_HEADER: &str = "value_id,sensor_id,timestamp,value,available_time";

/// One sensor reading.
///
/// `value_id`, `sensor_id` and `timestamp` are identity fields: the defect
/// injector mutates only `value` and `available_time`.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub value_id: i64,
    pub sensor_id: i64,
    /// Measurement instant, Unix milliseconds.
    pub timestamp: i64,
    /// Measured value; `None` is a missing reading.
    pub value: Option<f64>,
    /// When the reading became visible to the system, Unix milliseconds.
    pub available_time: i64,
}

impl SensorReading {
    /// Delay between measurement and availability, in milliseconds.
    #[inline]
    pub fn currency_ms(&self) -> i64 {
        self.available_time - self.timestamp
    }

    /// Whether the required-field set has a null. Identity fields are typed
    /// non-nullable, so only `value` can be missing.
    #[inline]
    pub fn is_missing(&self) -> bool {
        self.value.is_none()
    }

    /// Serialize to one CSV line in the canonical column order.
    pub fn to_csv_line(&self) -> String {
        match self.value {
            Some(value) => format!(
                "{},{},{},{},{}",
                self.value_id, self.sensor_id, self.timestamp, value, self.available_time
            ),
            None => format!(
                "{},{},{},,{}",
                self.value_id, self.sensor_id, self.timestamp, self.available_time
            ),
        }
    }
}
