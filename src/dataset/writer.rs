//! Atomic Dataset Output
//!
//! All CSV outputs are written to a `<path>.partial` sibling first and moved
//! to the final path on `finalize()`. A file at its final path is therefore
//! complete by construction; interrupted runs leave only `.partial` debris
//! that the next run may overwrite.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use super::{SensorReading, CSV_HEADER};

/// A CSV file that only appears at its final path once complete.
pub struct AtomicCsvFile {
    final_path: PathBuf,
    partial_path: PathBuf,
    out: Option<BufWriter<File>>,
    lines_written: u64,
}

impl AtomicCsvFile {
    /// Create the `.partial` file and write the header line.
    pub fn create(path: &Path, header: &str) -> Result<Self> {
        let partial_path = partial_path_for(path);
        let file = File::create(&partial_path)
            .with_context(|| format!("failed to create {}", partial_path.display()))?;
        let mut out = BufWriter::new(file);
        writeln!(out, "{}", header)
            .with_context(|| format!("failed to write header to {}", partial_path.display()))?;
        Ok(Self {
            final_path: path.to_path_buf(),
            partial_path,
            out: Some(out),
            lines_written: 0,
        })
    }

    pub fn write_line(&mut self, line: &str) -> Result<()> {
        let out = self.out.as_mut().expect("write_line after finalize");
        writeln!(out, "{}", line)
            .with_context(|| format!("failed to write to {}", self.partial_path.display()))?;
        self.lines_written += 1;
        Ok(())
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Flush and move the file to its final path. Returns the number of data
    /// lines written.
    pub fn finalize(mut self) -> Result<u64> {
        let mut out = self.out.take().expect("finalize called twice");
        out.flush()
            .with_context(|| format!("failed to flush {}", self.partial_path.display()))?;
        drop(out);
        fs::rename(&self.partial_path, &self.final_path).with_context(|| {
            format!(
                "failed to move {} into place at {}",
                self.partial_path.display(),
                self.final_path.display()
            )
        })?;
        debug!(path = %self.final_path.display(), lines = self.lines_written, "output finalized");
        Ok(self.lines_written)
    }
}

impl Drop for AtomicCsvFile {
    fn drop(&mut self) {
        // Never leave an unfinalized file looking complete.
        if self.out.is_some() {
            let _ = fs::remove_file(&self.partial_path);
        }
    }
}

fn partial_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Writer for degraded/processed sensor datasets in the canonical layout.
pub struct DatasetWriter {
    inner: AtomicCsvFile,
}

impl DatasetWriter {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self { inner: AtomicCsvFile::create(path, CSV_HEADER)? })
    }

    pub fn write_row(&mut self, row: &SensorReading) -> Result<()> {
        self.inner.write_line(&row.to_csv_line())
    }

    pub fn rows_written(&self) -> u64 {
        self.inner.lines_written()
    }

    pub fn finalize(self) -> Result<u64> {
        self.inner.finalize()
    }
}

// =============================================================================
// TESTS
// =============================================================================
