//! Dataset Statistics
//!
//! Chunked single pass over the `value` column: row count, distinct-value
//! occurrence counts, numeric min/max. The distribution is printed as a
//! top-N frequency table (the original tool plotted it; a table carries the
//! same information without a display).

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use tracing::info;

use crate::dataset::ChunkedReader;

/// Aggregate statistics for one dataset's `value` column.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub rows: u64,
    pub missing: u64,
    pub distinct_values: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// `(value, occurrences)` sorted by descending count; ties break on the
    /// value string so output is stable.
    pub top: Vec<(String, u64)>,
}

/// Scan `path` and accumulate [`DatasetStats`], keeping the `top_n` most
/// frequent values.
pub fn calculate_statistics(path: &Path, chunk_size: usize, top_n: usize) -> Result<DatasetStats> {
    info!(path = %path.display(), "calculating dataset statistics");

    let mut reader = ChunkedReader::open(path, chunk_size)?;
    let mut counts: HashMap<String, u64> = HashMap::new();
    let mut rows = 0u64;
    let mut missing = 0u64;
    let mut min: Option<f64> = None;
    let mut max: Option<f64> = None;

    while let Some(chunk) = reader.next_chunk()? {
        rows += chunk.len() as u64;
        for row in &chunk.rows {
            match row.value {
                Some(value) => {
                    *counts.entry(value.to_string()).or_insert(0) += 1;
                    min = Some(min.map_or(value, |m| m.min(value)));
                    max = Some(max.map_or(value, |m| m.max(value)));
                }
                None => {
                    missing += 1;
                    *counts.entry(String::new()).or_insert(0) += 1;
                }
            }
        }
    }

    let distinct_values = counts.len();
    let mut top: Vec<(String, u64)> = counts.into_iter().collect();
    top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top.truncate(top_n);

    Ok(DatasetStats { rows, missing, distinct_values, min, max, top })
}

/// Print the frequency table and the headline numbers.
pub fn print_stats(stats: &DatasetStats) {
    println!("==================================================================");
    println!(" dataset statistics");
    println!("==================================================================");
    println!(" total rows:      {}", stats.rows);
    println!(" missing values:  {}", stats.missing);
    println!(" distinct values: {}", stats.distinct_values);
    match (stats.min, stats.max) {
        (Some(min), Some(max)) => {
            println!(" min:             {}", min);
            println!(" max:             {}", max);
        }
        _ => println!(" min/max:         n/a (no numeric values)"),
    }
    if !stats.top.is_empty() {
        println!("------------------------------------------------------------------");
        println!(" {:<20} {:>10}", "value", "count");
        for (value, count) in &stats.top {
            let label = if value.is_empty() { "<missing>" } else { value.as_str() };
            println!(" {:<20} {:>10}", label, count);
        }
    }
    println!("==================================================================");
}

// =============================================================================
// TESTS
// =============================================================================
