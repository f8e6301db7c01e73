use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use composite_engine::display_pxi;
use pxi_core::CompositeRow;
use serde::{Deserialize, Serialize};
use stats_engine::{classify_health, rolling_stats};

use crate::{cached_json, AppError, AppState};

const DEFAULT_OUTLIER_Z: f64 = 3.0;
const MAX_HISTORY_DAYS: i64 = 90;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/pxi/latest", get(get_latest))
        .route("/v1/snapshot", get(get_latest))
        .route("/v1/pxi/metrics/latest", get(get_metrics_latest))
        .route("/v1/pxi/history", get(get_history))
}

#[derive(Serialize)]
struct MetricRow {
    id: String,
    label: String,
    value: Option<f64>,
    delta_1d: Option<f64>,
    delta_7d: Option<f64>,
    delta_30d: Option<f64>,
    lower_bound: f64,
    upper_bound: f64,
    z: Option<f64>,
    contribution: Option<f64>,
    breach: bool,
    health: String,
}

#[derive(Serialize)]
struct TickerItem {
    id: String,
    label: String,
    value: f64,
    z: f64,
}

#[derive(Serialize)]
struct LatestSnapshot {
    /// Monotonic per composite row; clients poll on it.
    version: String,
    calculated_at: DateTime<Utc>,
    pxi: f64,
    raw_pxi: f64,
    regime: String,
    discovered_regime: Option<String>,
    stale: bool,
    total_weight: f64,
    pamp_count: i64,
    stress_count: i64,
    metrics: Vec<MetricRow>,
    ticker: Vec<TickerItem>,
    alerts: Vec<pxi_store::StoredAlert>,
}

fn delta(daily: &[(NaiveDate, f64)], days: i64) -> Option<f64> {
    let (latest_date, latest_value) = daily.last()?;
    let target = *latest_date - Duration::days(days);
    let (_, past_value) = daily.iter().rev().find(|(d, _)| *d <= target)?;
    Some(latest_value - past_value)
}

async fn build_metric_rows(
    state: &AppState,
    composite: Option<&CompositeRow>,
) -> Result<Vec<MetricRow>, AppError> {
    // The latest-per-indicator query caps visibility at "now", so a
    // sample stamped in the future can never surface here.
    let latest_samples = state.store.latest_sample_per_indicator(Utc::now()).await?;
    let mut rows = Vec::new();

    for def in pxi_core::indicator_registry() {
        let daily = state
            .store
            .fetch_historical_daily(def.id, MAX_HISTORY_DAYS + 1)
            .await?;
        let values: Vec<f64> = daily.iter().map(|(_, v)| *v).collect();
        let value = latest_samples
            .get(def.id)
            .map(|s| s.value)
            .or_else(|| values.last().copied());

        let metric = composite.and_then(|c| c.metrics.iter().find(|m| m.id == def.id));
        let z = metric.map(|m| m.z);
        let summary = rolling_stats(&values);
        let health = classify_health(&values, z, summary.std_dev, DEFAULT_OUTLIER_Z);

        let breach = value
            .map(|v| v < def.lower_bound || v > def.upper_bound)
            .unwrap_or(false);

        rows.push(MetricRow {
            id: def.id.to_string(),
            label: def.label.to_string(),
            value,
            delta_1d: delta(&daily, 1),
            delta_7d: delta(&daily, 7),
            delta_30d: delta(&daily, 30),
            lower_bound: def.lower_bound,
            upper_bound: def.upper_bound,
            z,
            contribution: metric.map(|m| m.contribution),
            breach,
            health: health.as_str().to_string(),
        });
    }

    Ok(rows)
}

async fn build_latest(state: &AppState) -> Result<serde_json::Value, AppError> {
    let composite = state
        .store
        .latest_composite()
        .await?
        .ok_or_else(|| AppError::Unavailable("No composite has been computed yet".to_string()))?;

    let alerts = state.store.fetch_unacknowledged_alerts(7).await?;
    let discovered = state.store.latest_regime().await?;
    let metrics = build_metric_rows(state, Some(&composite)).await?;

    let ticker = composite
        .metrics
        .iter()
        .map(|m| {
            let label = pxi_core::indicator(&m.id)
                .map(|d| d.label)
                .unwrap_or(m.id.as_str());
            TickerItem {
                id: m.id.clone(),
                label: label.to_string(),
                value: m.value,
                z: m.z,
            }
        })
        .collect();

    let age_ms = (Utc::now() - composite.calculated_at).num_milliseconds();
    let snapshot = LatestSnapshot {
        version: composite.calculated_at.to_rfc3339(),
        calculated_at: composite.calculated_at,
        pxi: display_pxi(composite.pxi),
        raw_pxi: composite.raw_pxi,
        regime: composite.regime.as_str().to_string(),
        discovered_regime: discovered.map(|r| r.regime.as_str().to_string()),
        stale: age_ms > state.stale_threshold_ms,
        total_weight: composite.total_weight,
        pamp_count: composite.pamp_count,
        stress_count: composite.stress_count,
        metrics,
        ticker,
        alerts,
    };

    serde_json::to_value(snapshot).map_err(|e| AppError::Internal(e.into()))
}

async fn get_latest(
    State(state): State<AppState>,
) -> Result<Json<crate::ApiResponse<serde_json::Value>>, AppError> {
    let value = cached_json(&state, "pxi_latest", || build_latest(&state)).await?;
    Ok(Json(crate::ApiResponse::ok(value)))
}

async fn get_metrics_latest(
    State(state): State<AppState>,
) -> Result<Json<crate::ApiResponse<serde_json::Value>>, AppError> {
    let value = cached_json(&state, "pxi_metrics_latest", || async {
        let composite = state.store.latest_composite().await?;
        let rows = build_metric_rows(&state, composite.as_ref()).await?;
        serde_json::to_value(rows).map_err(|e| AppError::Internal(e.into()))
    })
    .await?;
    Ok(Json(crate::ApiResponse::ok(value)))
}

#[derive(Deserialize)]
struct DaysQuery {
    days: Option<i64>,
}

#[derive(Serialize)]
struct HistoryPoint {
    calculated_at: DateTime<Utc>,
    pxi: f64,
    raw_pxi: f64,
    regime: String,
}

async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<crate::ApiResponse<Vec<HistoryPoint>>>, AppError> {
    let days = query.days.unwrap_or(30);
    if !(1..=MAX_HISTORY_DAYS).contains(&days) {
        return Err(AppError::BadRequest(format!(
            "days must be between 1 and {}",
            MAX_HISTORY_DAYS
        )));
    }

    let points = state
        .store
        .fetch_pxi_history(days)
        .await?
        .into_iter()
        .map(|row| HistoryPoint {
            calculated_at: row.calculated_at,
            pxi: display_pxi(row.pxi),
            raw_pxi: row.raw_pxi,
            regime: row.regime.as_str().to_string(),
        })
        .collect();

    Ok(Json(crate::ApiResponse::ok(points)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn delta_uses_closest_date_at_or_before_target() {
        let daily = vec![(date(1), 10.0), (date(8), 12.0), (date(15), 15.0)];
        assert_eq!(delta(&daily, 7), Some(3.0));
        // No observation at or before Mar 14 - 30d.
        assert_eq!(delta(&daily, 30), None);
        // 1-day delta falls back to the Mar 8 value.
        assert_eq!(delta(&daily, 1), Some(3.0));
    }

    #[test]
    fn delta_on_empty_history_is_none() {
        assert_eq!(delta(&[], 1), None);
    }
}
