//! Verifier / Comparator
//!
//! Reconciles the locally computed [`WindowMetrics`] with the window metrics
//! the DSMS itself emitted over the same degraded dataset. Windows are
//! aligned by their `(value_start, value_end)` key when the DSMS export
//! carries the ids, by ordinal position otherwise. Each of
//! accuracy/completeness/timeliness is compared independently against a
//! tolerance; mismatches and missing windows are REPORTED, never fatal —
//! surfacing them is this module's whole job. The caller maps a dirty
//! report to a non-zero exit code.
//!
//! The DSMS export is parsed numerically before comparison, so float
//! formatting differences (the engine prints two decimals) can never cause
//! a spurious mismatch.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::quality::{WindowKey, WindowMetrics};

/// Default comparison tolerance: parity up to two decimal places, the
/// precision the DSMS's float formatter is configured for.
pub const DEFAULT_TOLERANCE: f64 = 0.009;

/// The three metrics compared per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Metric {
    Accuracy,
    Completeness,
    Timeliness,
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accuracy => write!(f, "accuracy"),
            Self::Completeness => write!(f, "completeness"),
            Self::Timeliness => write!(f, "timeliness"),
        }
    }
}

/// One metric disagreeing beyond tolerance in one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricMismatch {
    pub key: WindowKey,
    pub metric: Metric,
    pub local: f64,
    pub dsms: f64,
    pub delta: f64,
}

/// Which side is missing a window the other side produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MissingSide {
    /// The DSMS produced no row for a locally computed window.
    Dsms,
    /// The DSMS produced a window the local computation never saw.
    Local,
}

/// A window present in only one of the two sources.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingWindow {
    pub value_start: Option<i64>,
    pub value_end: Option<i64>,
    pub missing_in: MissingSide,
}

/// Matched/mismatched counters for one metric.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricCounts {
    pub matched: usize,
    pub mismatched: usize,
}

/// Full outcome of one verification run.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub tolerance: f64,
    /// Windows aligned across both sources.
    pub windows_compared: usize,
    /// Aligned windows where all three metrics agreed.
    pub windows_matched: usize,
    pub accuracy: MetricCounts,
    pub completeness: MetricCounts,
    pub timeliness: MetricCounts,
    pub mismatches: Vec<MetricMismatch>,
    pub missing_windows: Vec<MissingWindow>,
}

impl VerificationReport {
    fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            windows_compared: 0,
            windows_matched: 0,
            accuracy: MetricCounts::default(),
            completeness: MetricCounts::default(),
            timeliness: MetricCounts::default(),
            mismatches: Vec::new(),
            missing_windows: Vec::new(),
        }
    }

    /// A verification succeeded iff nothing mismatched and nothing is
    /// missing on either side.
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty() && self.missing_windows.is_empty()
    }

    /// Print the itemized, human-readable summary.
    pub fn print_summary(&self) {
        println!("==================================================================");
        println!(" verification summary (tolerance {})", self.tolerance);
        println!("==================================================================");
        println!(
            " windows compared: {:>6}   fully matched: {:>6}",
            self.windows_compared, self.windows_matched
        );
        for (name, counts) in [
            ("accuracy", self.accuracy),
            ("completeness", self.completeness),
            ("timeliness", self.timeliness),
        ] {
            println!(
                " {:<13} matched {:>6}   mismatched {:>6}",
                name, counts.matched, counts.mismatched
            );
        }
        if !self.mismatches.is_empty() {
            println!("------------------------------------------------------------------");
            for m in &self.mismatches {
                println!(
                    " window {:>10}-{:<10} {:<13} local {:>10.6}  dsms {:>10.6}  delta {:>+.6}",
                    m.key.value_start, m.key.value_end, m.metric.to_string(), m.local, m.dsms,
                    m.delta
                );
            }
        }
        if !self.missing_windows.is_empty() {
            println!("------------------------------------------------------------------");
            for w in &self.missing_windows {
                let side = match w.missing_in {
                    MissingSide::Dsms => "missing in DSMS output",
                    MissingSide::Local => "missing in local output",
                };
                println!(
                    " window {:>10}-{:<10} {}",
                    w.value_start.map(|v| v.to_string()).unwrap_or_else(|| "?".into()),
                    w.value_end.map(|v| v.to_string()).unwrap_or_else(|| "?".into()),
                    side
                );
            }
        }
        println!("==================================================================");
        if self.is_clean() {
            println!(" data quality measurements agree within tolerance");
        } else {
            println!(
                " found {} metric mismatch(es), {} missing window(s)",
                self.mismatches.len(),
                self.missing_windows.len()
            );
        }
    }

    /// Persist the report as a JSON artifact.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }
}

// =============================================================================
// DSMS RESULT PARSING
// =============================================================================

/// One window row parsed from the DSMS's result CSV. The ids are optional:
/// some engine configurations emit only the metric columns.
#[derive(Debug, Clone, PartialEq)]
pub struct DsmsWindowRow {
    pub value_start: Option<i64>,
    pub value_end: Option<i64>,
    pub accuracy: f64,
    pub completeness: f64,
    pub timeliness: f64,
}

/// Column positions within the DSMS export.
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    accuracy: usize,
    completeness: usize,
    value_start: usize,
    value_end: usize,
    timeliness: usize,
}

/// The engine's default export layout when header names are absent or
/// unrecognized.
const DSMS_DEFAULT_LAYOUT: ColumnMap =
    ColumnMap { accuracy: 0, completeness: 1, value_start: 2, value_end: 3, timeliness: 4 };

fn column_map_from_header(fields: &[&str]) -> Option<ColumnMap> {
    let find = |name: &str| {
        fields.iter().position(|f| f.trim().to_ascii_lowercase() == name)
    };
    Some(ColumnMap {
        accuracy: find("accuracy")?,
        completeness: find("completeness")?,
        value_start: find("value_start")?,
        value_end: find("value_end")?,
        timeliness: find("timeliness")?,
    })
}

/// Read and numerically parse a DSMS result CSV. Unparseable data lines are
/// skipped with a warning, mirroring the dataset reader's recovery policy.
pub fn read_dsms_results(path: &Path) -> Result<Vec<DsmsWindowRow>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read DSMS results {}", path.display()))?;
    let mut lines = raw.lines().filter(|l| !l.trim().is_empty());

    let mut rows = Vec::new();
    let mut layout = DSMS_DEFAULT_LAYOUT;

    if let Some(first) = lines.next() {
        let fields: Vec<&str> = first.split(',').collect();
        let is_header = fields.iter().any(|f| !f.trim().is_empty() && f.trim().parse::<f64>().is_err());
        if is_header {
            if let Some(mapped) = column_map_from_header(&fields) {
                layout = mapped;
            }
            // Header consumed either way; unrecognized names keep the
            // engine's default layout.
        } else if let Some(row) = parse_dsms_row(&fields, &layout) {
            rows.push(row);
        }
    }

    let mut skipped = 0u64;
    for line in lines {
        let fields: Vec<&str> = line.split(',').collect();
        match parse_dsms_row(&fields, &layout) {
            Some(row) => rows.push(row),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(skipped, path = %path.display(), "skipped unparseable DSMS result rows");
    }
    info!(windows = rows.len(), path = %path.display(), "loaded DSMS results");
    Ok(rows)
}

fn parse_dsms_row(fields: &[&str], layout: &ColumnMap) -> Option<DsmsWindowRow> {
    let metric = |i: usize| fields.get(i).and_then(|f| f.trim().parse::<f64>().ok());
    let id = |i: usize| fields.get(i).and_then(|f| f.trim().parse::<i64>().ok());
    Some(DsmsWindowRow {
        value_start: id(layout.value_start),
        value_end: id(layout.value_end),
        accuracy: metric(layout.accuracy)?,
        completeness: metric(layout.completeness)?,
        timeliness: metric(layout.timeliness)?,
    })
}

// =============================================================================
// COMPARISON
// =============================================================================

/// Compare local window metrics against the DSMS's rows.
pub fn compare(
    local: &[WindowMetrics],
    dsms: &[DsmsWindowRow],
    tolerance: f64,
) -> VerificationReport {
    let mut report = VerificationReport::new(tolerance);

    let keyed = dsms.iter().all(|r| r.value_start.is_some() && r.value_end.is_some());
    if keyed {
        compare_by_key(local, dsms, &mut report);
    } else {
        compare_by_ordinal(local, dsms, &mut report);
    }
    report
}

fn compare_by_key(
    local: &[WindowMetrics],
    dsms: &[DsmsWindowRow],
    report: &mut VerificationReport,
) {
    let mut by_key: BTreeMap<(i64, i64), &DsmsWindowRow> = BTreeMap::new();
    for row in dsms {
        let (Some(start), Some(end)) = (row.value_start, row.value_end) else {
            continue;
        };
        let key = (start, end);
        if by_key.insert(key, row).is_some() {
            warn!(?key, "duplicate window key in DSMS results, keeping the last row");
        }
    }

    let mut matched_keys = Vec::new();
    for metrics in local {
        let key = (metrics.key.value_start, metrics.key.value_end);
        match by_key.get(&key) {
            Some(&row) => {
                matched_keys.push(key);
                compare_window(metrics, row, report);
            }
            None => report.missing_windows.push(MissingWindow {
                value_start: Some(key.0),
                value_end: Some(key.1),
                missing_in: MissingSide::Dsms,
            }),
        }
    }
    for key in matched_keys {
        by_key.remove(&key);
    }
    for (key, _) in by_key {
        report.missing_windows.push(MissingWindow {
            value_start: Some(key.0),
            value_end: Some(key.1),
            missing_in: MissingSide::Local,
        });
    }
}

fn compare_by_ordinal(
    local: &[WindowMetrics],
    dsms: &[DsmsWindowRow],
    report: &mut VerificationReport,
) {
    for (metrics, row) in local.iter().zip(dsms.iter()) {
        compare_window(metrics, row, report);
    }
    for metrics in local.iter().skip(dsms.len()) {
        report.missing_windows.push(MissingWindow {
            value_start: Some(metrics.key.value_start),
            value_end: Some(metrics.key.value_end),
            missing_in: MissingSide::Dsms,
        });
    }
    for row in dsms.iter().skip(local.len()) {
        report.missing_windows.push(MissingWindow {
            value_start: row.value_start,
            value_end: row.value_end,
            missing_in: MissingSide::Local,
        });
    }
}

fn compare_window(local: &WindowMetrics, dsms: &DsmsWindowRow, report: &mut VerificationReport) {
    report.windows_compared += 1;
    let mut clean = true;
    for (metric, local_value, dsms_value) in [
        (Metric::Accuracy, local.accuracy, dsms.accuracy),
        (Metric::Completeness, local.completeness, dsms.completeness),
        (Metric::Timeliness, local.timeliness, dsms.timeliness),
    ] {
        let delta = local_value - dsms_value;
        let counts = match metric {
            Metric::Accuracy => &mut report.accuracy,
            Metric::Completeness => &mut report.completeness,
            Metric::Timeliness => &mut report.timeliness,
        };
        if delta.abs() > report.tolerance {
            counts.mismatched += 1;
            clean = false;
            report.mismatches.push(MetricMismatch {
                key: local.key,
                metric,
                local: local_value,
                dsms: dsms_value,
                delta,
            });
        } else {
            counts.matched += 1;
        }
    }
    if clean {
        report.windows_matched += 1;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn local_window(ordinal: u64, start: i64, end: i64) -> WindowMetrics {
        WindowMetrics {
            key: WindowKey { ordinal, value_start: start, value_end: end },
            accuracy: 0.95,
            completeness: 0.9,
            timeliness: 0.8,
            median: 10.0,
            mad: 0.5,
            threshold: 2.2239,
            incorrect: 5,
        }
    }

    fn dsms_row(start: i64, end: i64) -> DsmsWindowRow {
        DsmsWindowRow {
            value_start: Some(start),
            value_end: Some(end),
            accuracy: 0.95,
            completeness: 0.9,
            timeliness: 0.8,
        }
    }

    // -------------------------------------------------------------------------
    // Comparison
    // -------------------------------------------------------------------------

    #[test]
    fn test_identical_sequences_are_clean() {
        let local = vec![local_window(0, 0, 99), local_window(1, 100, 199)];
        let dsms = vec![dsms_row(0, 99), dsms_row(100, 199)];
        let report = compare(&local, &dsms, DEFAULT_TOLERANCE);

        assert!(report.is_clean());
        assert_eq!(report.windows_compared, 2);
        assert_eq!(report.windows_matched, 2);
        assert_eq!(report.accuracy.matched, 2);
        assert_eq!(report.accuracy.mismatched, 0);
    }

    #[test]
    fn test_single_perturbed_accuracy_flags_exactly_that_window() {
        let local = vec![local_window(0, 0, 99), local_window(1, 100, 199)];
        let mut dsms = vec![dsms_row(0, 99), dsms_row(100, 199)];
        dsms[1].accuracy += 0.05;

        let report = compare(&local, &dsms, DEFAULT_TOLERANCE);
        assert!(!report.is_clean());
        assert_eq!(report.mismatches.len(), 1);
        let m = &report.mismatches[0];
        assert_eq!(m.key.value_start, 100);
        assert_eq!(m.metric, Metric::Accuracy);
        assert_eq!(report.accuracy.mismatched, 1);
        assert_eq!(report.completeness.mismatched, 0);
        assert_eq!(report.timeliness.mismatched, 0);
        assert_eq!(report.windows_matched, 1);
    }

    #[test]
    fn test_within_tolerance_is_a_match() {
        let local = vec![local_window(0, 0, 99)];
        let mut dsms = vec![dsms_row(0, 99)];
        dsms[0].timeliness += 0.008; // under the 0.009 default

        let report = compare(&local, &dsms, DEFAULT_TOLERANCE);
        assert!(report.is_clean());
    }

    #[test]
    fn test_missing_windows_reported_non_fatally() {
        let local = vec![local_window(0, 0, 99), local_window(1, 100, 199)];
        let dsms = vec![dsms_row(0, 99), dsms_row(200, 299)];

        let report = compare(&local, &dsms, DEFAULT_TOLERANCE);
        assert_eq!(report.windows_compared, 1);
        assert_eq!(report.missing_windows.len(), 2);
        assert!(report
            .missing_windows
            .iter()
            .any(|w| w.value_start == Some(100) && w.missing_in == MissingSide::Dsms));
        assert!(report
            .missing_windows
            .iter()
            .any(|w| w.value_start == Some(200) && w.missing_in == MissingSide::Local));
        assert!(!report.is_clean());
    }

    #[test]
    fn test_ordinal_fallback_when_ids_absent() {
        let local = vec![local_window(0, 0, 99), local_window(1, 100, 199)];
        let dsms = vec![
            DsmsWindowRow {
                value_start: None,
                value_end: None,
                accuracy: 0.95,
                completeness: 0.9,
                timeliness: 0.8,
            };
            2
        ];
        let report = compare(&local, &dsms, DEFAULT_TOLERANCE);
        assert!(report.is_clean());
        assert_eq!(report.windows_compared, 2);
    }

    // -------------------------------------------------------------------------
    // DSMS CSV parsing
    // -------------------------------------------------------------------------

    fn write_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_dsms_csv_positional_layout() {
        // Engine default: Accuracy, Completeness, Value_Start, Value_End,
        // Timeliness — with two-decimal formatting.
        let file = write_file("acc,comp,vs,ve,time\n0.95,0.90,0,99,0.80\n0.97,0.92,100,199,0.81\n");
        let rows = read_dsms_results(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value_start, Some(0));
        assert_eq!(rows[0].accuracy, 0.95);
        assert_eq!(rows[1].value_end, Some(199));
        assert_eq!(rows[1].timeliness, 0.81);
    }

    #[test]
    fn test_parse_dsms_csv_named_header() {
        let file = write_file(
            "Value_Start,Value_End,Accuracy,Completeness,Timeliness\n0,99,0.95,0.90,0.80\n",
        );
        let rows = read_dsms_results(file.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value_start, Some(0));
        assert_eq!(rows[0].value_end, Some(99));
        assert_eq!(rows[0].accuracy, 0.95);
        assert_eq!(rows[0].completeness, 0.90);
        assert_eq!(rows[0].timeliness, 0.80);
    }

    #[test]
    fn test_parse_dsms_csv_headerless() {
        let file = write_file("0.95,0.90,0,99,0.80\n");
        let rows = read_dsms_results(file.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value_start, Some(0));
    }

    #[test]
    fn test_parse_dsms_csv_skips_bad_rows() {
        let file = write_file("0.95,0.90,0,99,0.80\nnot,a,valid,row,here\n0.9,0.9,100,199,0.7\n");
        let rows = read_dsms_results(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_report_json_round_trip() {
        let local = vec![local_window(0, 0, 99)];
        let dsms = vec![dsms_row(0, 99)];
        let report = compare(&local, &dsms, DEFAULT_TOLERANCE);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        report.write_json(&path).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["windows_compared"], 1);
        assert_eq!(parsed["mismatches"].as_array().unwrap().len(), 0);
    }
}
