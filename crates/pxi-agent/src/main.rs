use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{NaiveDate, Timelike, Utc};
use provider_clients::{AlphaVantageClient, CoinGeckoClient, FredClient, TwelveDataClient};
use pxi_store::Store;
use tokio::signal::unix::SignalKind;
use tokio::sync::Mutex;
use tokio::time;

mod config;
mod health;
mod jobs;
mod state;
mod tick;
mod webhook;

use config::AgentConfig;
use health::HealthCounters;
use state::SchedulerState;
use tick::TickContext;
use webhook::WebhookNotifier;

/// How long a tick in flight may drain after a shutdown signal.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(
                std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            )
        })
    };
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(env_filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter()).init();
    }

    // Panic hook: log panic info before crashing
    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting PXI ingest agent");

    // 2. Load and validate configuration
    let config = AgentConfig::from_env()?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Ingest cadence: {} ({}s)", config.ingest_cron, config.tick_interval_secs);
    tracing::info!("  Stats window: {} days", config.stats_window_days);
    tracing::info!("  Contribution cap: {}", config.max_metric_contribution);
    tracing::info!(
        "  Regime webhook: {}",
        if config.alert_enabled && !config.alert_webhook_url.is_empty() {
            "enabled"
        } else {
            "disabled"
        }
    );

    // 3. Connect the store and bootstrap the schema
    let store = Store::connect(&config.database_url, config.db_pool_min, config.db_pool_max).await?;
    store.init_schema().await?;
    store.ping().await?;
    tracing::info!("Startup check: database OK");

    // 4. Provider clients and the fetcher panel
    let fred = FredClient::new(config.fred_api_key.clone());
    let coingecko = CoinGeckoClient::new(config.coingecko_base.clone());
    let twelvedata = TwelveDataClient::new(config.twelvedata_api_key.clone());
    let alpha_vantage = AlphaVantageClient::new(config.alpha_vantage_api_key.clone());
    let fetchers = provider_clients::build_fetchers(fred, coingecko, twelvedata);
    tracing::info!("Fetcher panel ready ({} indicators)", fetchers.len());

    let notifier = Arc::new(WebhookNotifier::new(
        config.alert_webhook_url.clone(),
        config.alert_enabled,
    ));

    // 5. Scheduler state, seeded from the store so a restart still
    // detects regime transitions.
    let mut initial_state = SchedulerState::default();
    if let Some(regime) = store.latest_regime().await? {
        initial_state.previous_regime = Some(regime.regime);
        tracing::info!("Seeded previous regime: {}", regime.regime.as_str());
    }
    let scheduler_state = Arc::new(Mutex::new(initial_state));

    let counters = Arc::new(HealthCounters::new());
    let _monitor = health::spawn_monitor(Arc::clone(&counters));

    let tick_ctx = Arc::new(TickContext {
        store: store.clone(),
        fetchers,
        contribution_cap: config.max_metric_contribution,
        window_days: config.stats_window_days,
        deviation_suggestion_count: config.deviation_suggestion_count,
    });

    // Overlap guards: a cadence refuses to start while its previous run
    // is still in flight.
    let tick_guard = Arc::new(AtomicBool::new(false));
    let technical_guard = Arc::new(AtomicBool::new(false));
    let validation_guard = Arc::new(AtomicBool::new(false));
    let regime_guard = Arc::new(AtomicBool::new(false));

    // Job bookkeeping: fire each slot once per day.
    let mut last_technical_slot: Option<(NaiveDate, bool)> = None;
    let mut last_validation_date: Option<NaiveDate> = None;
    let mut last_regime_date: Option<NaiveDate> = None;

    // Main loop with graceful shutdown (SIGINT + SIGTERM)
    let mut interval = time::interval(Duration::from_secs(config.tick_interval_secs));
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    let shutdown = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    };
    tokio::pin!(shutdown);

    tracing::info!(
        "Agent is now running. Ingesting every {}s. Press Ctrl+C to stop.",
        config.tick_interval_secs
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Utc::now();

                // Minute tick: ingest -> compute.
                if tick_guard
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    let ctx = Arc::clone(&tick_ctx);
                    let state = Arc::clone(&scheduler_state);
                    let counters = Arc::clone(&counters);
                    let guard = Arc::clone(&tick_guard);
                    tokio::spawn(async move {
                        let mut state = state.lock().await;
                        match tick::run_tick(&ctx, &mut state).await {
                            Ok(()) => counters.record_success(),
                            Err(e) => {
                                counters.record_failure();
                                tracing::error!("tick failed: {}", e);
                            }
                        }
                        guard.store(false, Ordering::SeqCst);
                    });
                } else {
                    tracing::warn!("previous tick still running; skipping this tick");
                }

                // Twice-daily technical refresh (00:05 / 12:05 UTC).
                let pm_slot = now.hour() >= 12;
                let slot_due = if pm_slot {
                    now.hour() > 12 || now.minute() >= 5
                } else {
                    now.hour() > 0 || now.minute() >= 5
                };
                if slot_due && last_technical_slot != Some((now.date_naive(), pm_slot)) {
                    last_technical_slot = Some((now.date_naive(), pm_slot));
                    spawn_job(
                        "technical refresh",
                        Arc::clone(&technical_guard),
                        {
                            let store = store.clone();
                            let client = alpha_vantage.clone();
                            async move { jobs::refresh_technical_signals(&store, &client).await }
                        },
                    );
                }

                // Daily validation pass (02:00 UTC).
                if now.hour() >= 2 && last_validation_date != Some(now.date_naive()) {
                    last_validation_date = Some(now.date_naive());
                    let window_days = config.stats_window_days;
                    let outlier = config.outlier_z_threshold;
                    spawn_job(
                        "validation pass",
                        Arc::clone(&validation_guard),
                        {
                            let store = store.clone();
                            async move { jobs::run_validation_pass(&store, window_days, outlier).await }
                        },
                    );
                }

                // Daily regime detection (02:30 UTC), followed by the
                // transition webhook when the label changed.
                if (now.hour() > 2 || (now.hour() == 2 && now.minute() >= 30))
                    && last_regime_date != Some(now.date_naive())
                {
                    last_regime_date = Some(now.date_naive());
                    let store_job = store.clone();
                    let state = Arc::clone(&scheduler_state);
                    let notifier = Arc::clone(&notifier);
                    spawn_job("regime detection", Arc::clone(&regime_guard), async move {
                        let latest = jobs::run_regime_job(&store_job).await?;
                        if let Some(latest) = latest {
                            let mut state = state.lock().await;
                            let previous = state.previous_regime;
                            if previous != Some(latest) {
                                if let Some(previous) = previous {
                                    notifier
                                        .send_text(&format!(
                                            "Market regime changed: {} -> {}",
                                            previous.as_str(),
                                            latest.as_str()
                                        ))
                                        .await;
                                }
                                state.previous_regime = Some(latest);
                            }
                        }
                        Ok(())
                    });
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received, draining current tick...");
                let deadline = tokio::time::Instant::now() + SHUTDOWN_DRAIN;
                while tick_guard.load(Ordering::SeqCst)
                    && tokio::time::Instant::now() < deadline
                {
                    tokio::time::sleep(Duration::from_millis(250)).await;
                }
                counters.log_summary();
                break;
            }
        }
    }

    tracing::info!("PXI agent shut down.");
    Ok(())
}

/// Run a daily job on its own task unless the previous run is still in
/// flight.
fn spawn_job<F>(name: &'static str, guard: Arc<AtomicBool>, job: F)
where
    F: std::future::Future<Output = Result<()>> + Send + 'static,
{
    if guard
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        tracing::warn!("previous {} still running; skipping", name);
        return;
    }
    tokio::spawn(async move {
        tracing::info!("{} started", name);
        if let Err(e) = job.await {
            tracing::error!("{} failed: {}", name, e);
        } else {
            tracing::info!("{} finished", name);
        }
        guard.store(false, Ordering::SeqCst);
    });
}
