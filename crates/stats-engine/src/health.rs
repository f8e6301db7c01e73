use serde::{Deserialize, Serialize};

use crate::rolling::{FLAT_SIGMA, MIN_POINTS};

/// Per-indicator health classification, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndicatorHealth {
    /// NaN or infinite values present in the recent window.
    Invalid,
    /// Sigma below the flat threshold over the window.
    Flat,
    /// Latest |z| at or above the configured outlier threshold.
    Outlier,
    /// Fewer than the minimum daily points in the window.
    Stale,
    Ok,
}

impl IndicatorHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorHealth::Invalid => "invalid",
            IndicatorHealth::Flat => "flat",
            IndicatorHealth::Outlier => "outlier",
            IndicatorHealth::Stale => "stale",
            IndicatorHealth::Ok => "ok",
        }
    }
}

pub fn classify_health(
    recent_values: &[f64],
    latest_z: Option<f64>,
    sigma: Option<f64>,
    outlier_threshold: f64,
) -> IndicatorHealth {
    if recent_values.iter().any(|v| !v.is_finite()) {
        return IndicatorHealth::Invalid;
    }
    if let Some(s) = sigma {
        if s < FLAT_SIGMA {
            return IndicatorHealth::Flat;
        }
    }
    if let Some(z) = latest_z {
        if z.abs() >= outlier_threshold {
            return IndicatorHealth::Outlier;
        }
    }
    if recent_values.len() < MIN_POINTS {
        return IndicatorHealth::Stale;
    }
    IndicatorHealth::Ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_wins_over_everything() {
        let values = [1.0, f64::NAN, 3.0, 4.0, 5.0];
        assert_eq!(
            classify_health(&values, Some(10.0), Some(0.0), 3.0),
            IndicatorHealth::Invalid
        );
    }

    #[test]
    fn short_window_is_stale() {
        let values = [1.0, 2.0];
        assert_eq!(classify_health(&values, None, None, 3.0), IndicatorHealth::Stale);
    }

    #[test]
    fn flat_sigma_flags_flat() {
        let values = [2.0, 2.0, 2.0, 2.0, 2.0];
        assert_eq!(
            classify_health(&values, Some(0.0), Some(0.0), 3.0),
            IndicatorHealth::Flat
        );
    }

    #[test]
    fn outlier_z_flags_outlier() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(
            classify_health(&values, Some(-3.5), Some(1.0), 3.0),
            IndicatorHealth::Outlier
        );
    }

    #[test]
    fn outlier_wins_over_short_window() {
        // The stored z can be extreme while the daily window is still
        // thin; the outlier takes precedence over staleness.
        let values = [1.0, 2.0];
        assert_eq!(
            classify_health(&values, Some(4.2), None, 3.0),
            IndicatorHealth::Outlier
        );
    }

    #[test]
    fn otherwise_ok() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(
            classify_health(&values, Some(0.5), Some(1.0), 3.0),
            IndicatorHealth::Ok
        );
    }
}
