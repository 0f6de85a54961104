//! Defect Injector
//!
//! Produces a degraded row stream that is deterministically reproducible for
//! a fixed `(QualityConfig, seed)`. Three independent defect families are
//! applied per chunk, and any combination may stack on one row:
//!
//! 1. **Inaccuracy**: a fraction of the non-null values is perturbed into
//!    outliers: `value += sign × outlier_factor × |g|` with `sign` a fair
//!    coin and `g ~ Normal(0, deviation)`.
//! 2. **Missing values**: a fraction of all rows has `value` set to null.
//!    The row stays in the stream with its identity fields intact.
//! 3. **Availability delay**: every row gets an availability offset in
//!    `[0, volatility)`; a fraction additionally gets `[volatility,
//!    2·volatility)` on top, guaranteeing a gap of at least `volatility`
//!    (timeliness score exactly zero) for that fraction.
//!
//! # Determinism
//!
//! The only randomness source is a seeded `ChaCha8Rng`, partitioned into one
//! sub-stream per defect family (`set_stream`), so the families never
//! contend for draws and a family's output cannot shift because another
//! family's configuration changed. Within a family the draw order is fixed:
//! per chunk, the selection indices are drawn first, then per-row draws
//! follow in ascending row order. Re-running with the same configuration and
//! seed reproduces the output row for row.

use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use statrs::distribution::Normal;
use tracing::debug;

use crate::config::QualityConfig;
use crate::dataset::SensorReading;

/// Sub-stream identifiers for the partitioned RNG. One per defect family.
const INACCURACY_STREAM: u64 = 1;
const MISSING_STREAM: u64 = 2;
const AVAILABILITY_STREAM: u64 = 3;

/// Ground truth of the defects injected into one chunk. Row positions are
/// chunk-local offsets; add the chunk's `first_row_index` for global
/// positions. Only the injector's own tests and run summaries need this —
/// verification against the DSMS never does.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChunkDefects {
    /// Rows whose value was perturbed into an outlier.
    pub outliers: Vec<usize>,
    /// Rows whose value was nulled.
    pub nulled: Vec<usize>,
    /// Rows delayed past the volatility horizon, with the extra offset (ms).
    pub delayed: Vec<(usize, i64)>,
}

/// Aggregate defect counters across a whole run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InjectionTotals {
    pub rows: u64,
    pub outliers: u64,
    pub nulled: u64,
    pub delayed: u64,
}

impl InjectionTotals {
    pub fn absorb(&mut self, chunk_len: usize, defects: &ChunkDefects) {
        self.rows += chunk_len as u64;
        self.outliers += defects.outliers.len() as u64;
        self.nulled += defects.nulled.len() as u64;
        self.delayed += defects.delayed.len() as u64;
    }
}

/// Deterministic defect injector over chunked sensor data.
pub struct DefectInjector {
    config: QualityConfig,
    inaccuracy_rng: ChaCha8Rng,
    missing_rng: ChaCha8Rng,
    availability_rng: ChaCha8Rng,
    /// Gaussian for outlier magnitudes; `None` when `deviation == 0`
    /// (offsets degenerate to zero).
    normal: Option<Normal>,
    /// Whether to synthesize `available_time = timestamp + U[0, volatility)`
    /// for every row before delaying the outdated fraction. On for the
    /// `prepare` pipeline (raw inputs carry no availability); off when
    /// degrading an already-prepared stream in place.
    synthesize_availability: bool,
}

impl DefectInjector {
    pub fn new(config: &QualityConfig, seed: u64) -> Self {
        Self {
            config: config.clone(),
            inaccuracy_rng: stream_rng(seed, INACCURACY_STREAM),
            missing_rng: stream_rng(seed, MISSING_STREAM),
            availability_rng: stream_rng(seed, AVAILABILITY_STREAM),
            normal: Normal::new(0.0, config.deviation).ok(),
            synthesize_availability: true,
        }
    }

    /// Disable availability synthesis; delay injection then only adds to the
    /// gap already present in the input.
    pub fn without_availability_synthesis(mut self) -> Self {
        self.synthesize_availability = false;
        self
    }

    /// Degrade one chunk in place and return the injected ground truth.
    pub fn inject_chunk(&mut self, rows: &mut [SensorReading]) -> ChunkDefects {
        let mut defects = ChunkDefects::default();
        self.inject_inaccuracy(rows, &mut defects);
        self.inject_missing(rows, &mut defects);
        self.inject_delays(rows, &mut defects);
        debug!(
            rows = rows.len(),
            outliers = defects.outliers.len(),
            nulled = defects.nulled.len(),
            delayed = defects.delayed.len(),
            "chunk degraded"
        );
        defects
    }

    fn inject_inaccuracy(&mut self, rows: &mut [SensorReading], defects: &mut ChunkDefects) {
        let pool: Vec<usize> =
            (0..rows.len()).filter(|&i| rows[i].value.is_some()).collect();
        let count = defect_count(self.config.outlier_percentage, pool.len());
        if count == 0 {
            return;
        }

        let mut selected: Vec<usize> = sample(&mut self.inaccuracy_rng, pool.len(), count)
            .into_iter()
            .map(|i| pool[i])
            .collect();
        selected.sort_unstable();

        for &i in &selected {
            let sign = if self.inaccuracy_rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            let magnitude = match self.normal {
                Some(normal) => self.inaccuracy_rng.sample(normal).abs(),
                None => 0.0,
            };
            let offset = sign * self.config.outlier_factor * magnitude;
            if let Some(value) = rows[i].value.as_mut() {
                *value += offset;
            }
        }
        defects.outliers = selected;
    }

    fn inject_missing(&mut self, rows: &mut [SensorReading], defects: &mut ChunkDefects) {
        let count = defect_count(self.config.missing_percentage, rows.len());
        if count == 0 {
            return;
        }

        let mut selected: Vec<usize> =
            sample(&mut self.missing_rng, rows.len(), count).into_vec();
        selected.sort_unstable();

        for &i in &selected {
            rows[i].value = None;
        }
        defects.nulled = selected;
    }

    fn inject_delays(&mut self, rows: &mut [SensorReading], defects: &mut ChunkDefects) {
        let volatility = self.config.volatility;

        if self.synthesize_availability {
            for row in rows.iter_mut() {
                row.available_time =
                    row.timestamp + self.availability_rng.gen_range(0..volatility);
            }
        }

        let count = defect_count(self.config.outdated_percentage, rows.len());
        if count == 0 {
            return;
        }

        let mut selected: Vec<usize> =
            sample(&mut self.availability_rng, rows.len(), count).into_vec();
        selected.sort_unstable();

        // available_time >= timestamp going in, so adding at least
        // `volatility` pushes the gap past the horizon.
        for &i in &selected {
            let extra = self.availability_rng.gen_range(volatility..volatility * 2);
            rows[i].available_time += extra;
            defects.delayed.push((i, extra));
        }
    }
}

fn stream_rng(seed: u64, stream: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream);
    rng
}

/// Number of rows to degrade: `⌈percentage × n⌉`, clamped to `n`. The
/// product is snapped to the nearest integer first so the binary
/// representation of, say, `0.1 × 10000` cannot bump the ceiling to 1001.
fn defect_count(percentage: f64, n: usize) -> usize {
    let exact = percentage * n as f64;
    let nearest = exact.round();
    let count = if (exact - nearest).abs() < 1e-9 { nearest } else { exact.ceil() };
    (count as usize).min(n)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> QualityConfig {
        QualityConfig {
            deviation: 1.0,
            outlier_factor: 3.0,
            outlier_percentage: 0.1,
            missing_percentage: 0.2,
            volatility: 2000,
            outdated_percentage: 0.1,
            window_size: 100,
            chunk_size: 100,
        }
    }

    fn make_rows(n: usize) -> Vec<SensorReading> {
        (0..n)
            .map(|i| SensorReading {
                value_id: i as i64,
                sensor_id: 1,
                timestamp: 1_000_000 + (i as i64) * 60_000,
                value: Some(20.0 + (i % 7) as f64),
                available_time: 1_000_000 + (i as i64) * 60_000,
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // Counting
    // -------------------------------------------------------------------------

    #[test]
    fn test_defect_count_is_ceiling() {
        assert_eq!(defect_count(0.0, 100), 0);
        assert_eq!(defect_count(0.1, 100), 10);
        assert_eq!(defect_count(0.1, 10_000), 1000);
        assert_eq!(defect_count(0.05, 99), 5); // ceil(4.95)
        assert_eq!(defect_count(0.001, 100), 1); // ceil(0.1)
        assert_eq!(defect_count(1.0, 100), 100);
    }

    #[test]
    fn test_missing_count_exact() {
        let config = test_config();
        let mut rows = make_rows(100);
        let defects = DefectInjector::new(&config, 7).inject_chunk(&mut rows);
        assert_eq!(defects.nulled.len(), 20);
        assert_eq!(rows.iter().filter(|r| r.value.is_none()).count(), 20);
    }

    // -------------------------------------------------------------------------
    // Determinism
    // -------------------------------------------------------------------------

    #[test]
    fn test_same_seed_reproduces_rows_and_ground_truth() {
        let config = test_config();
        let mut a = make_rows(200);
        let mut b = make_rows(200);

        let defects_a = DefectInjector::new(&config, 42).inject_chunk(&mut a);
        let defects_b = DefectInjector::new(&config, 42).inject_chunk(&mut b);

        assert_eq!(a, b);
        assert_eq!(defects_a, defects_b);
    }

    #[test]
    fn test_different_seed_differs() {
        let config = test_config();
        let mut a = make_rows(200);
        let mut b = make_rows(200);

        DefectInjector::new(&config, 1).inject_chunk(&mut a);
        DefectInjector::new(&config, 2).inject_chunk(&mut b);

        assert_ne!(a, b);
    }

    #[test]
    fn test_determinism_across_chunk_sequence() {
        let config = test_config();
        let run = |seed: u64| {
            let mut injector = DefectInjector::new(&config, seed);
            let mut chunks = vec![make_rows(150), make_rows(150)];
            let defects: Vec<ChunkDefects> =
                chunks.iter_mut().map(|c| injector.inject_chunk(c)).collect();
            (chunks, defects)
        };
        assert_eq!(run(9), run(9));
    }

    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------

    #[test]
    fn test_zero_percentages_leave_stream_untouched() {
        let config = QualityConfig {
            outlier_percentage: 0.0,
            missing_percentage: 0.0,
            outdated_percentage: 0.0,
            ..test_config()
        };
        let original = make_rows(50);
        let mut rows = original.clone();
        let defects = DefectInjector::new(&config, 42)
            .without_availability_synthesis()
            .inject_chunk(&mut rows);

        assert_eq!(rows, original);
        assert_eq!(defects, ChunkDefects::default());
    }

    // -------------------------------------------------------------------------
    // Delay semantics
    // -------------------------------------------------------------------------

    #[test]
    fn test_delayed_rows_cross_volatility_horizon() {
        let config = test_config();
        let mut rows = make_rows(100);
        let defects = DefectInjector::new(&config, 5).inject_chunk(&mut rows);

        assert_eq!(defects.delayed.len(), 10);
        for &(i, extra) in &defects.delayed {
            assert!(extra >= config.volatility && extra < 2 * config.volatility);
            assert!(rows[i].currency_ms() >= config.volatility);
        }
        // Identity fields never change.
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.value_id, i as i64);
            assert_eq!(row.sensor_id, 1);
        }
    }

    #[test]
    fn test_synthesized_availability_bounded_for_undelayed_rows() {
        let config = test_config();
        let mut rows = make_rows(100);
        let defects = DefectInjector::new(&config, 11).inject_chunk(&mut rows);
        let delayed: Vec<usize> = defects.delayed.iter().map(|&(i, _)| i).collect();

        for (i, row) in rows.iter().enumerate() {
            let gap = row.currency_ms();
            assert!(gap >= 0);
            if delayed.contains(&i) {
                assert!(gap >= config.volatility);
            } else {
                assert!(gap < config.volatility);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Stacking and pools
    // -------------------------------------------------------------------------

    #[test]
    fn test_outliers_only_drawn_from_non_null_pool() {
        let config = QualityConfig { outlier_percentage: 0.5, ..test_config() };
        let mut rows = make_rows(40);
        for row in rows.iter_mut().take(20) {
            row.value = None;
        }
        let defects = DefectInjector::new(&config, 3).inject_chunk(&mut rows);

        // Pool is the 20 non-null rows; ceil(0.5 * 20) = 10 outliers.
        assert_eq!(defects.outliers.len(), 10);
        for &i in &defects.outliers {
            assert!(i >= 20, "outlier drawn from a null row");
        }
    }

    #[test]
    fn test_families_may_stack_on_one_row() {
        let config = QualityConfig {
            outlier_percentage: 1.0,
            missing_percentage: 1.0,
            outdated_percentage: 1.0,
            ..test_config()
        };
        let mut rows = make_rows(10);
        let defects = DefectInjector::new(&config, 8).inject_chunk(&mut rows);

        assert_eq!(defects.outliers.len(), 10);
        assert_eq!(defects.nulled.len(), 10);
        assert_eq!(defects.delayed.len(), 10);
        assert!(rows.iter().all(|r| r.value.is_none()));
        assert!(rows.iter().all(|r| r.currency_ms() >= config.volatility));
    }
}
