use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use statrs::statistics::Statistics;

use crate::{AppError, AppState};

const ANALYTICS_WINDOW_DAYS: i64 = 90;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/pxi/analytics/:metric", get(get_analytics))
}

#[derive(Serialize)]
struct SharpeReport {
    sharpe: f64,
    mean_daily_change: f64,
    change_volatility: f64,
    observations: usize,
}

#[derive(Serialize)]
struct DrawdownReport {
    /// Peak-to-trough decline on the PXI scale (the series is z-scaled,
    /// so the decline is absolute rather than a ratio).
    max_drawdown: f64,
    peak: f64,
    trough: f64,
    observations: usize,
}

#[derive(Serialize)]
struct RiskMetricsReport {
    mean: f64,
    volatility: f64,
    var_95: f64,
    min: f64,
    max: f64,
    observations: usize,
}

fn daily_changes(series: &[f64]) -> Vec<f64> {
    series.windows(2).map(|w| w[1] - w[0]).collect()
}

fn sharpe_report(series: &[f64]) -> SharpeReport {
    let changes = daily_changes(series);
    if changes.is_empty() {
        return SharpeReport {
            sharpe: 0.0,
            mean_daily_change: 0.0,
            change_volatility: 0.0,
            observations: series.len(),
        };
    }

    let mean = (&changes[..]).mean();
    let std_dev = (&changes[..]).std_dev();
    let sharpe = if std_dev > 0.0 && std_dev.is_finite() {
        mean / std_dev * (252.0_f64).sqrt()
    } else {
        0.0
    };

    SharpeReport {
        sharpe,
        mean_daily_change: mean,
        change_volatility: std_dev,
        observations: series.len(),
    }
}

fn drawdown_report(series: &[f64]) -> DrawdownReport {
    let mut peak = f64::NEG_INFINITY;
    let mut peak_at_max_dd = 0.0;
    let mut trough_at_max_dd = 0.0;
    let mut max_dd = 0.0;

    for &value in series {
        if value > peak {
            peak = value;
        }
        let dd = peak - value;
        if dd > max_dd {
            max_dd = dd;
            peak_at_max_dd = peak;
            trough_at_max_dd = value;
        }
    }

    DrawdownReport {
        max_drawdown: max_dd,
        peak: if series.is_empty() { 0.0 } else { peak_at_max_dd },
        trough: trough_at_max_dd,
        observations: series.len(),
    }
}

fn risk_metrics_report(series: &[f64]) -> RiskMetricsReport {
    if series.is_empty() {
        return RiskMetricsReport {
            mean: 0.0,
            volatility: 0.0,
            var_95: 0.0,
            min: 0.0,
            max: 0.0,
            observations: 0,
        };
    }

    let changes = daily_changes(series);
    let volatility = if changes.len() >= 2 { (&changes[..]).std_dev() } else { 0.0 };

    // Historical 95% VaR over the daily changes.
    let var_95 = if changes.is_empty() {
        0.0
    } else {
        let mut sorted = changes.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let index = (sorted.len() as f64 * 0.05) as usize;
        sorted[index.min(sorted.len() - 1)].abs()
    };

    RiskMetricsReport {
        mean: (&series[..]).mean(),
        volatility,
        var_95,
        min: series.iter().cloned().fold(f64::INFINITY, f64::min),
        max: series.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        observations: series.len(),
    }
}

async fn get_analytics(
    State(state): State<AppState>,
    Path(metric): Path<String>,
) -> Result<Json<crate::ApiResponse<serde_json::Value>>, AppError> {
    let history = state.store.fetch_pxi_history(ANALYTICS_WINDOW_DAYS).await?;
    if history.is_empty() {
        return Err(AppError::Unavailable(
            "No composite history is available yet".to_string(),
        ));
    }
    let series: Vec<f64> = history.iter().map(|row| row.pxi).collect();

    let payload = match metric.as_str() {
        "sharpe" => serde_json::to_value(sharpe_report(&series)),
        "drawdown" => serde_json::to_value(drawdown_report(&series)),
        "risk-metrics" => serde_json::to_value(risk_metrics_report(&series)),
        other => {
            return Err(AppError::BadRequest(format!(
                "unknown analytics metric {:?} (expected sharpe, drawdown, or risk-metrics)",
                other
            )))
        }
    };

    let payload = payload.map_err(|e| AppError::Internal(e.into()))?;
    Ok(Json(crate::ApiResponse::ok(payload)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawdown_finds_peak_to_trough() {
        let series = [0.0, 1.0, 0.5, 1.5, -0.5, 0.2];
        let report = drawdown_report(&series);
        assert!((report.max_drawdown - 2.0).abs() < 1e-12);
        assert_eq!(report.peak, 1.5);
        assert_eq!(report.trough, -0.5);
    }

    #[test]
    fn drawdown_of_monotonic_series_is_zero() {
        let series = [0.0, 0.5, 1.0, 1.5];
        assert_eq!(drawdown_report(&series).max_drawdown, 0.0);
    }

    #[test]
    fn sharpe_is_zero_for_flat_series() {
        let series = [1.0, 1.0, 1.0, 1.0];
        assert_eq!(sharpe_report(&series).sharpe, 0.0);
    }

    #[test]
    fn sharpe_positive_for_rising_series() {
        let series = [0.0, 0.1, 0.25, 0.3, 0.45, 0.5];
        assert!(sharpe_report(&series).sharpe > 0.0);
    }

    #[test]
    fn risk_metrics_cover_extremes() {
        let series = [-1.0, 0.5, 2.0, -0.5];
        let report = risk_metrics_report(&series);
        assert_eq!(report.min, -1.0);
        assert_eq!(report.max, 2.0);
        assert_eq!(report.observations, 4);
    }
}
