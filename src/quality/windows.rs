//! Count-Based Tumbling Windows
//!
//! This module is the single source of truth for window boundary semantics:
//! a window is a contiguous, non-overlapping run of exactly `window_size`
//! rows in GLOBAL row-index order. Chunking is invisible here — the
//! assembler buffers rows across chunk boundaries and emits a window the
//! moment it is full, regardless of how the underlying reader chunked the
//! file. A trailing run shorter than `window_size` is never emitted as a
//! window; callers decide how loudly to report it.

use crate::dataset::SensorReading;

/// One full tumbling window of rows.
#[derive(Debug, Clone)]
pub struct Window {
    /// Zero-based ordinal of this window in the stream.
    pub ordinal: u64,
    /// Global row index of the first row.
    pub first_row_index: u64,
    pub rows: Vec<SensorReading>,
}

impl Window {
    /// `value_id` of the first row — half of the window's identity key.
    pub fn value_start(&self) -> i64 {
        self.rows.first().map(|r| r.value_id).unwrap_or_default()
    }

    /// `value_id` of the last row.
    pub fn value_end(&self) -> i64 {
        self.rows.last().map(|r| r.value_id).unwrap_or_default()
    }
}

/// Rows left over after the last full window.
#[derive(Debug, Clone)]
pub struct TrailingRows {
    pub first_row_index: u64,
    pub rows: Vec<SensorReading>,
}

/// Re-partitions a chunked row stream into exact `window_size` windows.
pub struct WindowAssembler {
    window_size: usize,
    buffer: Vec<SensorReading>,
    /// Global index of `buffer[0]`.
    buffer_start: u64,
    next_ordinal: u64,
}

impl WindowAssembler {
    pub fn new(window_size: usize) -> Self {
        assert!(window_size > 0, "window_size must be positive");
        Self {
            window_size,
            buffer: Vec::with_capacity(window_size),
            buffer_start: 0,
            next_ordinal: 0,
        }
    }

    /// Feed one chunk of rows; returns every window completed by it.
    pub fn push_rows(&mut self, rows: Vec<SensorReading>) -> Vec<Window> {
        self.buffer.extend(rows);
        let mut completed = Vec::new();
        while self.buffer.len() >= self.window_size {
            let rest = self.buffer.split_off(self.window_size);
            let rows = std::mem::replace(&mut self.buffer, rest);
            completed.push(Window {
                ordinal: self.next_ordinal,
                first_row_index: self.buffer_start,
                rows,
            });
            self.next_ordinal += 1;
            self.buffer_start += self.window_size as u64;
        }
        completed
    }

    /// Number of windows emitted so far.
    pub fn windows_emitted(&self) -> u64 {
        self.next_ordinal
    }

    /// Consume the assembler; returns the trailing partial run, if any.
    pub fn finish(self) -> Option<TrailingRows> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(TrailingRows { first_row_index: self.buffer_start, rows: self.buffer })
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
