use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

pub const FATAL_CONSECUTIVE_FAILURES: u64 = 5;
pub const SUCCESS_STALENESS_WARNING: Duration = Duration::from_secs(10 * 60);

/// Tick health telemetry. Counters are written by the scheduler's tick
/// tasks and read by the monitor task, so everything is atomic; the
/// monitor only ever reads.
#[derive(Debug, Default)]
pub struct HealthCounters {
    pub total_runs: AtomicU64,
    pub successes: AtomicU64,
    pub failures: AtomicU64,
    pub consecutive_failures: AtomicU64,
    last_success_at: Mutex<Option<DateTime<Utc>>>,
}

impl HealthCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.total_runs.fetch_add(1, Ordering::SeqCst);
        self.successes.fetch_add(1, Ordering::SeqCst);
        self.consecutive_failures.store(0, Ordering::SeqCst);
        if let Ok(mut last) = self.last_success_at.lock() {
            *last = Some(Utc::now());
        }
    }

    pub fn record_failure(&self) {
        self.total_runs.fetch_add(1, Ordering::SeqCst);
        self.failures.fetch_add(1, Ordering::SeqCst);
        self.consecutive_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub fn last_success_at(&self) -> Option<DateTime<Utc>> {
        self.last_success_at.lock().ok().and_then(|l| *l)
    }

    pub fn log_summary(&self) {
        tracing::info!(
            total_runs = self.total_runs.load(Ordering::SeqCst),
            successes = self.successes.load(Ordering::SeqCst),
            failures = self.failures.load(Ordering::SeqCst),
            consecutive_failures = self.consecutive_failures.load(Ordering::SeqCst),
            last_success_at = ?self.last_success_at(),
            "Scheduler health"
        );
    }
}

/// Background watchdog: escalates after repeated tick failures and warns
/// when no tick has succeeded recently.
pub fn spawn_monitor(counters: Arc<HealthCounters>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;

            let consecutive = counters.consecutive_failures.load(Ordering::SeqCst);
            if consecutive >= FATAL_CONSECUTIVE_FAILURES {
                tracing::error!(
                    consecutive_failures = consecutive,
                    "Ingest pipeline is failing repeatedly; check provider and store connectivity"
                );
            }

            if let Some(last) = counters.last_success_at() {
                let age = Utc::now() - last;
                if age.num_seconds() as u64 >= SUCCESS_STALENESS_WARNING.as_secs() {
                    tracing::warn!(
                        minutes_since_success = age.num_minutes(),
                        "No successful tick recently"
                    );
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_resets_consecutive_failures() {
        let counters = HealthCounters::new();
        counters.record_failure();
        counters.record_failure();
        assert_eq!(counters.consecutive_failures.load(Ordering::SeqCst), 2);

        counters.record_success();
        assert_eq!(counters.consecutive_failures.load(Ordering::SeqCst), 0);
        assert_eq!(counters.total_runs.load(Ordering::SeqCst), 3);
        assert!(counters.last_success_at().is_some());
    }

    #[test]
    fn failures_accumulate() {
        let counters = HealthCounters::new();
        for _ in 0..FATAL_CONSECUTIVE_FAILURES {
            counters.record_failure();
        }
        assert_eq!(
            counters.consecutive_failures.load(Ordering::SeqCst),
            FATAL_CONSECUTIVE_FAILURES
        );
        assert!(counters.last_success_at().is_none());
    }
}
