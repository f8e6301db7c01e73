use chrono::{DateTime, Utc};
use pxi_core::PxiError;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::resample::{fill_sparse_daily, resample_daily, DailyPoint};

/// Below this sigma a series is treated as flat and z is forced to 0.
pub const FLAT_SIGMA: f64 = 1e-9;

/// Minimum resampled daily points before a z-score is defined.
pub const MIN_POINTS: usize = 5;

/// Coverage ratio below which a multi-day span is forward-filled.
pub const DEFAULT_SPARSE_THRESHOLD: f64 = 0.5;

/// Summary statistics over a window of daily values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSummary {
    pub mean: f64,
    /// None when n < MIN_POINTS.
    pub std_dev: Option<f64>,
    pub n: usize,
    pub min: f64,
    pub max: f64,
}

pub fn rolling_stats(values: &[f64]) -> StatsSummary {
    if values.is_empty() {
        return StatsSummary { mean: 0.0, std_dev: None, n: 0, min: 0.0, max: 0.0 };
    }

    let mean = values.mean();
    let std_dev = if values.len() < MIN_POINTS {
        None
    } else {
        Some(values.std_dev())
    };
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    StatsSummary { mean, std_dev, n: values.len(), min, max }
}

/// `(value - mean) / sigma`, or 0 when the series is flat.
pub fn z_score(value: f64, mean: f64, std_dev: f64) -> f64 {
    if std_dev < FLAT_SIGMA {
        return 0.0;
    }
    (value - mean) / std_dev
}

/// Result of the full rolling z-score recipe for one new sample.
#[derive(Debug, Clone)]
pub struct ZComputation {
    pub mean: f64,
    pub std_dev: f64,
    pub z: f64,
    pub n: usize,
    pub daily: Vec<DailyPoint>,
}

/// The ingest-time z-score: resample the window history to daily values,
/// forward-fill if sparse, then score the latest value against the
/// unbiased rolling statistics. Fails with `InsufficientHistory` when
/// fewer than `MIN_POINTS` daily points are available.
pub fn compute_z(
    history: &[(DateTime<Utc>, f64)],
    latest_value: f64,
    sparse_threshold: f64,
) -> Result<ZComputation, PxiError> {
    let daily = fill_sparse_daily(resample_daily(history), sparse_threshold);
    let values: Vec<f64> = daily.iter().map(|p| p.value).collect();

    if values.len() < MIN_POINTS {
        return Err(PxiError::InsufficientHistory(format!(
            "{} daily points, need {}",
            values.len(),
            MIN_POINTS
        )));
    }

    let mean = (&values[..]).mean();
    let std_dev = (&values[..]).std_dev();
    let z = z_score(latest_value, mean, std_dev);

    Ok(ZComputation { mean, std_dev, z, n: values.len(), daily })
}

/// Unbiased sigma over the last `window` daily values; None when fewer
/// than two values are available.
pub fn rolling_volatility(daily: &[f64], window: usize) -> Option<f64> {
    if daily.len() < 2 {
        return None;
    }
    let start = daily.len().saturating_sub(window);
    let tail = &daily[start..];
    if tail.len() < 2 {
        return None;
    }
    Some(tail.std_dev())
}

/// Fixed partition of rolling sigma into stability bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StabilityRating {
    VeryStable,
    Stable,
    Volatile,
    Unstable,
}

pub fn stability_rating(sigma: f64) -> StabilityRating {
    if sigma < 0.005 {
        StabilityRating::VeryStable
    } else if sigma < 0.02 {
        StabilityRating::Stable
    } else if sigma < 0.08 {
        StabilityRating::Volatile
    } else {
        StabilityRating::Unstable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn series(values: &[f64]) -> Vec<(DateTime<Utc>, f64)> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                (
                    Utc.with_ymd_and_hms(2024, 3, 1 + i as u32, 16, 0, 0).unwrap(),
                    v,
                )
            })
            .collect()
    }

    #[test]
    fn z_score_basic() {
        // History [15, 16, 17, 18, 19], latest 20:
        // mean 17, unbiased sigma ~1.5811, z ~1.8974.
        let history = series(&[15.0, 16.0, 17.0, 18.0, 19.0]);
        let comp = compute_z(&history, 20.0, DEFAULT_SPARSE_THRESHOLD).unwrap();
        assert!((comp.mean - 17.0).abs() < 1e-9);
        assert!((comp.std_dev - 1.5811).abs() < 1e-3);
        assert!((comp.z - 1.8974).abs() < 1e-3);
        assert_eq!(comp.n, 5);
    }

    #[test]
    fn flat_series_yields_zero_z() {
        let history = series(&[0.02, 0.02, 0.02, 0.02, 0.02]);
        let comp = compute_z(&history, 0.02, DEFAULT_SPARSE_THRESHOLD).unwrap();
        assert_eq!(comp.z, 0.0);
        assert!(comp.std_dev < FLAT_SIGMA);
    }

    #[test]
    fn four_points_is_insufficient() {
        let history = series(&[1.0, 2.0, 3.0, 4.0]);
        let err = compute_z(&history, 5.0, DEFAULT_SPARSE_THRESHOLD).unwrap_err();
        assert!(matches!(err, PxiError::InsufficientHistory(_)));
    }

    #[test]
    fn five_points_is_sufficient() {
        let history = series(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(compute_z(&history, 6.0, DEFAULT_SPARSE_THRESHOLD).is_ok());
    }

    #[test]
    fn z_consistency_invariant() {
        let history = series(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let comp = compute_z(&history, 6.0, DEFAULT_SPARSE_THRESHOLD).unwrap();
        assert!((comp.z - (6.0 - comp.mean) / comp.std_dev).abs() < 1e-6);
    }

    #[test]
    fn volatility_uses_tail_window() {
        let daily: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let vol_all = rolling_volatility(&daily, 40).unwrap();
        let vol_30 = rolling_volatility(&daily, 30).unwrap();
        assert!(vol_30 < vol_all);
    }

    #[test]
    fn stability_bands() {
        assert_eq!(stability_rating(0.001), StabilityRating::VeryStable);
        assert_eq!(stability_rating(0.01), StabilityRating::Stable);
        assert_eq!(stability_rating(0.05), StabilityRating::Volatile);
        assert_eq!(stability_rating(0.5), StabilityRating::Unstable);
    }
}
