//! backfill: Seed the daily history and wide-window statistics from the
//! providers' long-range series.
//!
//! The ingest agent only ever touches each series' most recent
//! observation; this loader pulls years of history so the rolling
//! statistics and regime features have something to stand on from day
//! one. The statistics window here is intentionally much wider than the
//! ingest-time default (roughly ten years of trading days).
//!
//! Usage:
//!   cargo run -p backfill -- --days 3650
//!   cargo run -p backfill -- --indicators vix,hy_oas --dry-run
//!   cargo run -p backfill -- --window 2520 --concurrency 4

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use provider_clients::{CoinGeckoClient, FredClient, TwelveDataClient, YieldCurveFetcher};
use pxi_core::{HistoryDaily, Provider, StatsSnapshot};
use pxi_store::Store;
use stats_engine::rolling_stats;
use tokio::sync::Semaphore;

/// Wide statistics window: ~10 years of trading days.
const DEFAULT_WINDOW_DAYS: i64 = 2520;
const DEFAULT_HISTORY_DAYS: u32 = 3650;
const DEFAULT_CONCURRENCY: usize = 4;

struct LoaderCounters {
    indicators_loaded: AtomicU64,
    rows_written: AtomicU64,
    failures: AtomicU64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backfill=info,provider_clients=warn".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let dry_run = args.iter().any(|a| a == "--dry-run");

    let days: u32 = flag_value(&args, "--days").unwrap_or(DEFAULT_HISTORY_DAYS);
    let window_days: i64 = flag_value(&args, "--window").unwrap_or(DEFAULT_WINDOW_DAYS);
    let concurrency: usize = flag_value(&args, "--concurrency").unwrap_or(DEFAULT_CONCURRENCY);

    let selected: Option<Vec<String>> = args
        .iter()
        .position(|a| a == "--indicators")
        .and_then(|i| args.get(i + 1))
        .map(|list| list.split(',').map(|s| s.trim().to_string()).collect());

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    let fred = FredClient::new(std::env::var("FRED_API_KEY").context("FRED_API_KEY not set")?);
    let coingecko = CoinGeckoClient::new(
        std::env::var("COINGECKO_BASE")
            .unwrap_or_else(|_| provider_clients::coingecko::DEFAULT_BASE_URL.to_string()),
    );
    let twelvedata = TwelveDataClient::new(
        std::env::var("TWELVEDATA_API_KEY").context("TWELVEDATA_API_KEY not set")?,
    );

    let store = Store::connect(&database_url, 1, concurrency as u32 + 1).await?;
    store.init_schema().await?;

    let indicators: Vec<&'static pxi_core::IndicatorDefinition> = pxi_core::indicator_registry()
        .iter()
        .filter(|def| match &selected {
            Some(ids) => ids.iter().any(|id| id == def.id),
            None => true,
        })
        .collect();

    tracing::info!(
        "Backfilling {} indicators ({} days of history, {}-day stats window{})",
        indicators.len(),
        days,
        window_days,
        if dry_run { ", dry run" } else { "" }
    );

    let counters = Arc::new(LoaderCounters {
        indicators_loaded: AtomicU64::new(0),
        rows_written: AtomicU64::new(0),
        failures: AtomicU64::new(0),
    });
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut handles = Vec::new();

    for def in indicators {
        let semaphore = Arc::clone(&semaphore);
        let counters = Arc::clone(&counters);
        let store = store.clone();
        let fred = fred.clone();
        let coingecko = coingecko.clone();
        let twelvedata = twelvedata.clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await;
            match load_indicator(&store, def, &fred, &coingecko, &twelvedata, days, window_days, dry_run)
                .await
            {
                Ok(rows) => {
                    counters.indicators_loaded.fetch_add(1, Ordering::Relaxed);
                    counters.rows_written.fetch_add(rows, Ordering::Relaxed);
                    tracing::info!("{}: {} daily rows", def.id, rows);
                }
                Err(e) => {
                    counters.failures.fetch_add(1, Ordering::Relaxed);
                    tracing::error!("{}: backfill failed: {:#}", def.id, e);
                }
            }
        }));
    }

    for handle in handles {
        handle.await?;
    }

    tracing::info!(
        "Backfill done: {} indicators, {} rows, {} failures",
        counters.indicators_loaded.load(Ordering::Relaxed),
        counters.rows_written.load(Ordering::Relaxed),
        counters.failures.load(Ordering::Relaxed)
    );
    Ok(())
}

fn flag_value<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}

/// Pull an indicator's long-range daily values on its canonical scale,
/// oldest first.
async fn fetch_daily_history(
    def: &pxi_core::IndicatorDefinition,
    fred: &FredClient,
    coingecko: &CoinGeckoClient,
    twelvedata: &TwelveDataClient,
    days: u32,
) -> Result<Vec<(NaiveDate, f64)>> {
    match def.provider {
        Provider::Fred if def.id == "yield_curve" => {
            let tens = fred.recent_observations(YieldCurveFetcher::TEN_YEAR, days).await?;
            let twos = fred.recent_observations(YieldCurveFetcher::TWO_YEAR, days).await?;
            let mut rows: Vec<(NaiveDate, f64)> = tens
                .iter()
                .filter_map(|ten| {
                    twos.iter()
                        .find(|two| two.date == ten.date)
                        .map(|two| (ten.date, (ten.value - two.value) / 100.0))
                })
                .collect();
            rows.sort_by_key(|(date, _)| *date);
            Ok(rows)
        }
        Provider::Fred => {
            let percent = def.unit == "decimal";
            let mut rows: Vec<(NaiveDate, f64)> = fred
                .recent_observations(def.provider_series_id, days)
                .await?
                .into_iter()
                .map(|obs| {
                    let value = if percent { obs.value / 100.0 } else { obs.value };
                    (obs.date, value)
                })
                .collect();
            rows.sort_by_key(|(date, _)| *date);
            Ok(rows)
        }
        Provider::CoinGecko => {
            let closes = coingecko.daily_closes(def.provider_series_id, days).await?;
            // The canonical series is the day-over-day return, not the
            // close itself.
            Ok(closes
                .windows(2)
                .filter(|w| w[0].1 > 0.0)
                .map(|w| (w[1].0.date_naive(), (w[1].1 - w[0].1) / w[0].1))
                .collect())
        }
        Provider::TwelveData => {
            let mut rows: Vec<(NaiveDate, f64)> = twelvedata
                .daily_closes(def.provider_series_id, days)
                .await?
                .into_iter()
                .map(|bar| (bar.at.date_naive(), bar.close))
                .collect();
            rows.sort_by_key(|(date, _)| *date);
            Ok(rows)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn load_indicator(
    store: &Store,
    def: &'static pxi_core::IndicatorDefinition,
    fred: &FredClient,
    coingecko: &CoinGeckoClient,
    twelvedata: &TwelveDataClient,
    days: u32,
    window_days: i64,
    dry_run: bool,
) -> Result<u64> {
    let history = fetch_daily_history(def, fred, coingecko, twelvedata, days).await?;
    if history.is_empty() {
        anyhow::bail!("provider returned no history");
    }

    if dry_run {
        tracing::info!(
            "{}: would write {} rows spanning {} -> {}",
            def.id,
            history.len(),
            history[0].0,
            history[history.len() - 1].0
        );
        return Ok(0);
    }

    let rows: Vec<HistoryDaily> = history
        .iter()
        .map(|(date, value)| HistoryDaily {
            indicator_id: def.id.to_string(),
            date: *date,
            value: *value,
            source: "backfill".to_string(),
        })
        .collect();
    store.upsert_history_daily(&rows).await?;

    // Wide-window statistics from the tail of the backfilled series.
    let tail_start = history.len().saturating_sub(window_days as usize);
    let values: Vec<f64> = history[tail_start..].iter().map(|(_, v)| *v).collect();
    let summary = rolling_stats(&values);
    store
        .upsert_stats(&[StatsSnapshot {
            indicator_id: def.id.to_string(),
            window_days,
            mean: summary.mean,
            std_dev: summary.std_dev,
            n: summary.n as i64,
            min: summary.min,
            max: summary.max,
            as_of: Utc::now(),
        }])
        .await?;

    Ok(rows.len() as u64)
}
