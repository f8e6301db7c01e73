use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use composite_engine::{compute_composite, display_pxi, emit_alerts, AlertContext, CompositeInput};
use futures_util::future::join_all;
use pxi_core::{
    indicator, AlertType, HistoryDaily, IndicatorFetcher, Polarity, PxiError, Sample,
    StatsSnapshot, ZScoreRow,
};
use pxi_store::Store;
use stats_engine::{compute_z, DEFAULT_SPARSE_THRESHOLD};
use validation::validate_batch;

use crate::state::SchedulerState;

pub const FETCH_ATTEMPTS: u32 = 3;
pub const FETCH_BACKOFF: Duration = Duration::from_secs(5);
/// Per-attempt deadline; chosen to fit inside one minute with backoff.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(55);

/// Per-tick state machine. Every stage can fail back to Idle after
/// logging; only FetchingAll tolerates partial failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPhase {
    Idle,
    FetchingAll,
    Validating,
    Storing,
    Computing,
    AlertEmitting,
}

impl TickPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TickPhase::Idle => "idle",
            TickPhase::FetchingAll => "fetching_all",
            TickPhase::Validating => "validating",
            TickPhase::Storing => "storing",
            TickPhase::Computing => "computing",
            TickPhase::AlertEmitting => "alert_emitting",
        }
    }
}

/// Everything one tick needs, threaded through by the scheduler so the
/// engines stay free of store dependencies.
#[derive(Clone)]
pub struct TickContext {
    pub store: Store,
    pub fetchers: Vec<Arc<dyn IndicatorFetcher>>,
    pub contribution_cap: f64,
    pub window_days: i64,
    pub deviation_suggestion_count: i64,
}

async fn fetch_with_retry(fetcher: &Arc<dyn IndicatorFetcher>) -> Result<Sample, PxiError> {
    let id = fetcher.indicator_id();
    let mut last_error: Option<PxiError> = None;

    for attempt in 1..=FETCH_ATTEMPTS {
        match tokio::time::timeout(FETCH_TIMEOUT, fetcher.fetch()).await {
            Ok(Ok(sample)) => return Ok(sample),
            Ok(Err(e)) => {
                tracing::warn!("fetch {} attempt {}/{} failed: {}", id, attempt, FETCH_ATTEMPTS, e);
                last_error = Some(e);
            }
            Err(_) => {
                tracing::warn!(
                    "fetch {} attempt {}/{} timed out after {:?}",
                    id,
                    attempt,
                    FETCH_ATTEMPTS,
                    FETCH_TIMEOUT
                );
                last_error = Some(PxiError::ProviderUnreachable(format!(
                    "{} timed out after {:?}",
                    id, FETCH_TIMEOUT
                )));
            }
        }
        if attempt < FETCH_ATTEMPTS {
            tokio::time::sleep(FETCH_BACKOFF).await;
        }
    }

    Err(last_error.unwrap_or_else(|| PxiError::ProviderUnreachable(id.to_string())))
}

/// One ingest -> compute pass.
pub async fn run_tick(ctx: &TickContext, state: &mut SchedulerState) -> Result<()> {
    let tick_at = Utc::now();
    let mut phase = TickPhase::FetchingAll;
    tracing::debug!(phase = phase.as_str(), "tick started");

    // Fan out provider fetches; one failure never aborts the others.
    let results = join_all(ctx.fetchers.iter().map(fetch_with_retry)).await;
    let mut samples: Vec<Sample> = Vec::with_capacity(results.len());
    for (fetcher, result) in ctx.fetchers.iter().zip(results) {
        match result {
            Ok(sample) => samples.push(sample),
            Err(e) => tracing::warn!("dropping {} from batch: {}", fetcher.indicator_id(), e),
        }
    }
    if samples.is_empty() {
        anyhow::bail!("all provider fetches failed");
    }

    // Attach the cached technical-indicator multiplier to the crypto
    // sample before validation sees the batch.
    for sample in samples.iter_mut() {
        if sample.indicator_id == "btc_return" {
            if let Some(signal) = ctx.store.latest_technical_signal(&sample.indicator_id).await? {
                sample.overrides.signal_multiplier = Some(signal.signal_multiplier);
            }
        }
    }

    phase = TickPhase::Validating;
    if let Err(e) = validate_batch(&samples) {
        tracing::error!(phase = phase.as_str(), "batch dropped: {}", e);
        anyhow::bail!(e);
    }

    phase = TickPhase::Storing;
    tracing::debug!(phase = phase.as_str(), samples = samples.len(), "persisting batch");
    ctx.store.upsert_samples(&samples).await?;
    let daily: Vec<HistoryDaily> = samples
        .iter()
        .map(|s| HistoryDaily {
            indicator_id: s.indicator_id.clone(),
            date: s.source_timestamp.date_naive(),
            value: s.value,
            source: "ingest".to_string(),
        })
        .collect();
    ctx.store.upsert_history_daily(&daily).await?;

    phase = TickPhase::Computing;
    tracing::debug!(phase = phase.as_str(), "computing rolling statistics");
    let since = tick_at - chrono::Duration::days(ctx.window_days);
    let mut z_rows: Vec<ZScoreRow> = Vec::new();
    let mut stats: Vec<StatsSnapshot> = Vec::new();
    let mut inputs: Vec<CompositeInput> = Vec::new();

    for sample in &samples {
        let Some(def) = indicator(&sample.indicator_id) else {
            continue;
        };

        let mut history = ctx.store.fetch_historical(&sample.indicator_id, since).await?;
        // The window is [t - windowDays, t): the sample being scored is
        // already stored but must not score against itself.
        history.retain(|(ts, _)| *ts < sample.source_timestamp);

        let comp = match compute_z(&history, sample.value, DEFAULT_SPARSE_THRESHOLD) {
            Ok(comp) => comp,
            Err(PxiError::InsufficientHistory(why)) => {
                tracing::debug!("skipping z for {}: {}", sample.indicator_id, why);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        // Polarity governs the stored sign convention; every current
        // panel member is Positive, so this is usually the identity.
        let z = match def.polarity {
            Polarity::Positive => comp.z,
            Polarity::Negative => -comp.z,
        };

        let values: Vec<f64> = comp.daily.iter().map(|p| p.value).collect();
        let summary = stats_engine::rolling_stats(&values);
        stats.push(StatsSnapshot {
            indicator_id: sample.indicator_id.clone(),
            window_days: ctx.window_days,
            mean: summary.mean,
            std_dev: summary.std_dev,
            n: summary.n as i64,
            min: summary.min,
            max: summary.max,
            as_of: tick_at,
        });

        z_rows.push(ZScoreRow {
            indicator_id: sample.indicator_id.clone(),
            timestamp: sample.source_timestamp,
            raw_value: sample.value,
            mean: comp.mean,
            std_dev: comp.std_dev,
            z,
        });

        inputs.push(CompositeInput {
            def,
            value: sample.value,
            z,
            signal_multiplier: sample.overrides.signal_multiplier.unwrap_or(1.0),
        });
    }

    ctx.store.upsert_stats(&stats).await?;
    ctx.store.insert_z_scores(&z_rows).await?;

    let composite = compute_composite(&inputs, ctx.contribution_cap, tick_at);
    let Some(composite) = composite else {
        tracing::info!("no indicator qualified for the composite this tick");
        return Ok(());
    };

    phase = TickPhase::AlertEmitting;
    tracing::debug!(phase = phase.as_str(), "emitting alerts");
    let deviation_counts = ctx
        .store
        .recent_alert_counts(AlertType::DeviationReview, 30)
        .await?;
    let alert_ctx = AlertContext {
        prev_pxi: state.previous_pxi,
        prev_values: Some(&state.previous_raw_values),
        deviation_counts: Some(&deviation_counts),
        suggestion_threshold: ctx.deviation_suggestion_count,
    };
    let alerts = emit_alerts(&composite, &inputs, &alert_ctx);

    ctx.store.insert_composite(&composite).await?;
    ctx.store
        .insert_contributions(composite.calculated_at, &composite.metrics)
        .await?;
    ctx.store.insert_alerts(&alerts).await?;

    state.previous_pxi = Some(composite.pxi);
    for sample in &samples {
        state
            .previous_raw_values
            .insert(sample.indicator_id.clone(), sample.value);
    }

    tracing::info!(
        phase = TickPhase::Idle.as_str(),
        pxi = display_pxi(composite.pxi),
        raw_pxi = composite.raw_pxi,
        regime = composite.regime.as_str(),
        indicators = composite.metrics.len(),
        alerts = alerts.len(),
        "tick complete"
    );

    Ok(())
}
