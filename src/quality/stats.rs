//! Robust Order Statistics
//!
//! Sort-based median and median-absolute-deviation helpers used by the
//! accuracy metric. The conventions here are load-bearing for parity with
//! the DSMS's aggregate operators:
//!
//! - Even-count median is the mean of the two middle values.
//! - The MAD threshold is `3 × mad × 1.4826`, where 1.4826 ≈ 1/0.6745 is the
//!   consistency constant that scales a MAD to a standard-deviation estimate
//!   under Gaussian assumptions.

use std::cmp::Ordering;

/// MAD-to-sigma consistency constant (1/0.6745).
pub const MAD_SCALE: f64 = 1.4826;

/// Number of scaled MADs a value may deviate from the median before it
/// counts as incorrect.
pub const MAD_THRESHOLD_FACTOR: f64 = 3.0;

/// Median of `values`; sorts the slice in place. `None` when empty.
/// Even-count inputs average the two middle values.
pub fn median_in_place(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = values.len();
    let median = if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    };
    Some(median)
}

/// Median absolute deviation of `values` around `center`. `None` when empty.
pub fn mad(values: &[f64], center: f64) -> Option<f64> {
    let mut deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median_in_place(&mut deviations)
}

/// The outlier threshold derived from a MAD.
#[inline]
pub fn mad_threshold(mad: f64) -> f64 {
    MAD_THRESHOLD_FACTOR * mad * MAD_SCALE
}

// =============================================================================
// TESTS
// =============================================================================
