use anyhow::{bail, Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    // Store
    pub database_url: String,
    pub db_pool_min: u32,
    pub db_pool_max: u32,

    // Provider credentials
    pub fred_api_key: String,
    pub alpha_vantage_api_key: String,
    pub twelvedata_api_key: String,
    pub coingecko_base: String,

    // Cadence
    pub ingest_cron: String,
    pub tick_interval_secs: u64,

    // Statistics
    pub stats_window_days: i64,
    pub outlier_z_threshold: f64,

    // Composite
    pub max_metric_contribution: f64,
    pub deviation_suggestion_count: i64,

    // Regime-transition webhook
    pub alert_enabled: bool,
    pub alert_webhook_url: String,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        let ingest_cron =
            env::var("INGEST_CRON").unwrap_or_else(|_| "* * * * *".to_string());
        let tick_interval_secs = parse_ingest_cron(&ingest_cron)?;

        let config = Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL not set")?,
            db_pool_min: env::var("DB_POOL_MIN")
                .unwrap_or_else(|_| "1".to_string())
                .parse()?,
            db_pool_max: env::var("DB_POOL_MAX")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,

            fred_api_key: env::var("FRED_API_KEY").context("FRED_API_KEY not set")?,
            alpha_vantage_api_key: env::var("ALPHA_VANTAGE_API_KEY")
                .context("ALPHA_VANTAGE_API_KEY not set")?,
            twelvedata_api_key: env::var("TWELVEDATA_API_KEY")
                .context("TWELVEDATA_API_KEY not set")?,
            coingecko_base: env::var("COINGECKO_BASE")
                .unwrap_or_else(|_| provider_clients::coingecko::DEFAULT_BASE_URL.to_string()),

            ingest_cron,
            tick_interval_secs,

            stats_window_days: env::var("STATS_WINDOW_DAYS")
                .unwrap_or_else(|_| "90".to_string())
                .parse()?,
            outlier_z_threshold: env::var("OUTLIER_Z_THRESHOLD")
                .unwrap_or_else(|_| "3.0".to_string())
                .parse()?,

            max_metric_contribution: env::var("MAX_METRIC_CONTRIBUTION")
                .unwrap_or_else(|_| "0.25".to_string())
                .parse()?,
            deviation_suggestion_count: env::var("DEVIATION_SUGGESTION_COUNT")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,

            alert_enabled: env::var("ALERT_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            alert_webhook_url: env::var("ALERT_WEBHOOK_URL").unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            bail!("DATABASE_URL must be a postgres(ql):// DSN");
        }
        for (name, key) in [
            ("FRED_API_KEY", &self.fred_api_key),
            ("ALPHA_VANTAGE_API_KEY", &self.alpha_vantage_api_key),
            ("TWELVEDATA_API_KEY", &self.twelvedata_api_key),
        ] {
            if key.len() < 8 {
                bail!("{} looks invalid (need at least 8 characters)", name);
            }
        }
        if self.db_pool_min > self.db_pool_max {
            bail!("DB_POOL_MIN exceeds DB_POOL_MAX");
        }
        if !(0.0..=1.0).contains(&self.max_metric_contribution) {
            bail!("MAX_METRIC_CONTRIBUTION must be in [0, 1]");
        }
        if self.stats_window_days < 5 {
            bail!("STATS_WINDOW_DAYS must be at least 5");
        }
        Ok(())
    }
}

/// The scheduler only supports minute cadences: `* * * * *` (every
/// minute) or `*/N * * * *` (every N minutes). Anything else is a config
/// error rather than a silently-ignored schedule.
pub fn parse_ingest_cron(expr: &str) -> Result<u64> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        bail!("INGEST_CRON must have 5 fields, got {:?}", expr);
    }
    if fields[1..].iter().any(|f| *f != "*") {
        bail!("INGEST_CRON only supports minute schedules, got {:?}", expr);
    }

    match fields[0] {
        "*" => Ok(60),
        step if step.starts_with("*/") => {
            let n: u64 = step[2..]
                .parse()
                .with_context(|| format!("bad minute step in INGEST_CRON {:?}", expr))?;
            if n == 0 || n > 59 {
                bail!("minute step must be in 1..=59, got {}", n);
            }
            Ok(n * 60)
        }
        other => bail!("unsupported minute field {:?} in INGEST_CRON", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_minute() {
        assert_eq!(parse_ingest_cron("* * * * *").unwrap(), 60);
    }

    #[test]
    fn minute_steps() {
        assert_eq!(parse_ingest_cron("*/5 * * * *").unwrap(), 300);
        assert_eq!(parse_ingest_cron("*/1 * * * *").unwrap(), 60);
    }

    #[test]
    fn rejects_non_minute_schedules() {
        assert!(parse_ingest_cron("0 * * * *").is_err());
        assert!(parse_ingest_cron("* */2 * * *").is_err());
        assert!(parse_ingest_cron("*/0 * * * *").is_err());
        assert!(parse_ingest_cron("* * *").is_err());
    }
}
