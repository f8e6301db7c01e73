use anyhow::Result;
use chrono::{Duration, Utc};
use provider_clients::{signal_multiplier, AlphaVantageClient};
use pxi_core::{Alert, AlertType, DiscoveredRegime, Severity, TechnicalSignal};
use pxi_store::Store;
use regime_detector::{build_frame, IndicatorSeries, RegimeDetector};
use stats_engine::{classify_health, resample_daily, rolling_stats, DailyPoint, IndicatorHealth};

/// Symbol used for the crypto technical indicators.
pub const TECHNICAL_SYMBOL: &str = "BTCUSD";

/// Indicators feeding the clustering pass. Indicators without enough
/// history are excluded by the frame builder.
pub const REGIME_FEATURE_INDICATORS: &[&str] = &["vix", "hy_oas", "usd_index", "yield_curve"];

pub const REGIME_WINDOW_DAYS: usize = 90;
pub const REGIME_VOLATILITY_WINDOW: usize = 30;

/// Twice-daily refresh of the externally computed technical indicators
/// that drive the crypto signal-multiplier override.
pub async fn refresh_technical_signals(store: &Store, client: &AlphaVantageClient) -> Result<()> {
    let readings = client.technical_readings(TECHNICAL_SYMBOL).await;
    let multiplier = signal_multiplier(&readings);

    store
        .upsert_technical_signal(&TechnicalSignal {
            indicator_id: "btc_return".to_string(),
            rsi: readings.rsi,
            macd: readings.macd,
            macd_signal: readings.macd_signal,
            macd_histogram: readings.macd_histogram,
            signal_multiplier: multiplier,
            refreshed_at: Utc::now(),
        })
        .await?;

    tracing::info!(
        rsi = ?readings.rsi,
        macd_histogram = ?readings.macd_histogram,
        multiplier,
        "technical signals refreshed"
    );
    Ok(())
}

/// Daily validation pass: classify every indicator's health over the
/// window and log correlation diagnostics. Unhealthy indicators leave a
/// durable health_check alert.
pub async fn run_validation_pass(
    store: &Store,
    window_days: i64,
    outlier_z_threshold: f64,
) -> Result<()> {
    let since = Utc::now() - Duration::days(window_days);
    let mut alerts: Vec<Alert> = Vec::new();
    let mut aligned: Vec<(String, Vec<DailyPoint>)> = Vec::new();

    for def in pxi_core::indicator_registry() {
        let daily_rows = store.fetch_historical_daily(def.id, window_days).await?;
        let daily: Vec<DailyPoint> = daily_rows
            .into_iter()
            .map(|(date, value)| DailyPoint { date, value })
            .collect();
        let values: Vec<f64> = daily.iter().map(|p| p.value).collect();
        let summary = rolling_stats(&values);

        let latest_z = store
            .fetch_z_scores(def.id, since)
            .await?
            .last()
            .map(|row| row.z);

        let health = classify_health(&values, latest_z, summary.std_dev, outlier_z_threshold);
        if health != IndicatorHealth::Ok {
            let severity = match health {
                IndicatorHealth::Invalid | IndicatorHealth::Outlier => Severity::Warning,
                _ => Severity::Info,
            };
            alerts.push(Alert {
                alert_type: AlertType::HealthCheck,
                indicator_id: Some(def.id.to_string()),
                timestamp: Utc::now(),
                raw_value: values.last().copied(),
                z: latest_z,
                threshold: Some(outlier_z_threshold),
                message: format!("{} health is {}", def.label, health.as_str()),
                severity,
                acknowledged: false,
            });
        }
        tracing::info!(indicator = def.id, health = health.as_str(), n = summary.n, "validation pass");

        aligned.push((def.id.to_string(), daily));
    }

    log_correlation_diagnostics(&aligned);
    store.insert_alerts(&alerts).await?;
    Ok(())
}

/// Correlation diagnostics over dates shared by every indicator. High
/// pairwise correlation hints at a redundant panel member.
fn log_correlation_diagnostics(aligned: &[(String, Vec<DailyPoint>)]) {
    let with_data: Vec<&(String, Vec<DailyPoint>)> =
        aligned.iter().filter(|(_, d)| !d.is_empty()).collect();
    if with_data.len() < 2 {
        return;
    }

    let mut common: Vec<chrono::NaiveDate> = with_data[0].1.iter().map(|p| p.date).collect();
    for (_, daily) in &with_data[1..] {
        common.retain(|d| daily.iter().any(|p| p.date == *d));
    }
    if common.len() < 3 {
        tracing::debug!("too few shared dates for correlation diagnostics");
        return;
    }

    let series: Vec<(String, Vec<f64>)> = with_data
        .iter()
        .map(|(id, daily)| {
            let values = common
                .iter()
                .filter_map(|d| daily.iter().find(|p| p.date == *d).map(|p| p.value))
                .collect();
            (id.clone(), values)
        })
        .collect();

    for (a, b, r) in stats_engine::correlation_pairs(&series) {
        if r.abs() > 0.95 {
            tracing::warn!(pair = format!("{}/{}", a, b), r, "indicators are highly correlated");
        } else {
            tracing::debug!(pair = format!("{}/{}", a, b), r, "correlation");
        }
    }
}

/// Daily regime discovery: assemble z + volatility features from the
/// store, cluster, persist one row per date, and return the latest label
/// for the transition webhook.
pub async fn run_regime_job(store: &Store) -> Result<Option<DiscoveredRegime>> {
    let z_since = Utc::now() - Duration::days(REGIME_WINDOW_DAYS as i64);
    let value_days = (REGIME_WINDOW_DAYS + REGIME_VOLATILITY_WINDOW) as i64;

    let mut series = Vec::new();
    for id in REGIME_FEATURE_INDICATORS {
        let z_rows = store.fetch_z_scores(id, z_since).await?;
        let z_points: Vec<(chrono::DateTime<Utc>, f64)> =
            z_rows.iter().map(|r| (r.timestamp, r.z)).collect();
        let value_rows = store.fetch_historical_daily(id, value_days).await?;

        series.push(IndicatorSeries {
            id: id.to_string(),
            z_daily: resample_daily(&z_points),
            value_daily: value_rows
                .into_iter()
                .map(|(date, value)| DailyPoint { date, value })
                .collect(),
        });
    }

    let frame = build_frame(&series, REGIME_WINDOW_DAYS, REGIME_VOLATILITY_WINDOW);
    let detector = RegimeDetector::default();
    let rows = match detector.detect(&frame) {
        Ok(rows) => rows,
        Err(pxi_core::PxiError::InsufficientHistory(why)) => {
            tracing::info!("regime detection skipped: {}", why);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let latest = rows.last().map(|r| r.regime);
    store.insert_regimes(&rows).await?;
    tracing::info!(
        days = rows.len(),
        latest = ?latest.map(|r| r.as_str()),
        "regime detection complete"
    );

    Ok(latest)
}
