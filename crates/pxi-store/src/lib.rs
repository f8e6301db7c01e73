//! Durable persistence over PostgreSQL: raw samples, rolling stats,
//! z-scores, contributions, composites, alerts, daily history, regime
//! labels, and cached technical signals. Every query is parameterized;
//! multi-row writes run inside one transaction on a pooled connection.

mod models;
mod schema;

pub use models::StoredAlert;

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use pxi_core::{
    Alert, CompositeRow, HistoryDaily, MetricContribution, PxiError, RegimeRow, Sample,
    StatsSnapshot, TechnicalSignal, ZScoreRow,
};
use sqlx::postgres::{PgPool, PgPoolOptions};

use models::{
    store_err, AlertDbRow, CompositeDbRow, RegimeDbRow, SampleRow, StatsRow, TechnicalSignalRow,
    ZScoreDbRow,
};

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Connect with the configured pool bounds and register the connect
    /// observer. The DSN has already been validated by config loading.
    pub async fn connect(database_url: &str, min_connections: u32, max_connections: u32) -> Result<Self, PxiError> {
        let pool = PgPoolOptions::new()
            .min_connections(min_connections)
            .max_connections(max_connections)
            .after_connect(|_conn, meta| {
                Box::pin(async move {
                    tracing::debug!(age = ?meta.age, "postgres connection established");
                    Ok(())
                })
            })
            .connect(database_url)
            .await
            .map_err(store_err)?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Trivial query used by the health endpoint and startup checks.
    pub async fn ping(&self) -> Result<(), PxiError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    /// Idempotent schema bootstrap.
    pub async fn init_schema(&self) -> Result<(), PxiError> {
        for ddl in schema::DDL {
            sqlx::query(ddl).execute(&self.pool).await.map_err(store_err)?;
        }
        Ok(())
    }

    // ── Samples ─────────────────────────────────────────────────────────

    /// Upsert a batch of raw samples; newer ingests win on collision.
    pub async fn upsert_samples(&self, samples: &[Sample]) -> Result<(), PxiError> {
        if samples.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        for sample in samples {
            sqlx::query(
                "INSERT INTO raw_samples
                     (indicator_id, value, unit, source_timestamp, ingested_at, signal_multiplier)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (indicator_id, source_timestamp) DO UPDATE SET
                     value = EXCLUDED.value,
                     unit = EXCLUDED.unit,
                     ingested_at = EXCLUDED.ingested_at,
                     signal_multiplier = EXCLUDED.signal_multiplier",
            )
            .bind(&sample.indicator_id)
            .bind(sample.value)
            .bind(&sample.unit)
            .bind(sample.source_timestamp)
            .bind(sample.ingested_at)
            .bind(sample.overrides.signal_multiplier)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    /// Latest sample per indicator with `source_timestamp <= as_of`, so a
    /// tick never observes samples from its own future.
    pub async fn latest_sample_per_indicator(
        &self,
        as_of: DateTime<Utc>,
    ) -> Result<HashMap<String, Sample>, PxiError> {
        let rows: Vec<SampleRow> = sqlx::query_as(
            "SELECT DISTINCT ON (indicator_id)
                 indicator_id, value, unit, source_timestamp, ingested_at, signal_multiplier
             FROM raw_samples
             WHERE source_timestamp <= $1
             ORDER BY indicator_id, source_timestamp DESC",
        )
        .bind(as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows
            .into_iter()
            .map(|r| (r.indicator_id.clone(), Sample::from(r)))
            .collect())
    }

    /// Raw history for one indicator since a cutoff, ordered by source
    /// timestamp.
    pub async fn fetch_historical(
        &self,
        indicator_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<(DateTime<Utc>, f64)>, PxiError> {
        let rows: Vec<(DateTime<Utc>, f64)> = sqlx::query_as(
            "SELECT source_timestamp, value FROM raw_samples
             WHERE indicator_id = $1 AND source_timestamp >= $2
             ORDER BY source_timestamp",
        )
        .bind(indicator_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows)
    }

    // ── Daily history ───────────────────────────────────────────────────

    pub async fn upsert_history_daily(&self, rows: &[HistoryDaily]) -> Result<(), PxiError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        for row in rows {
            sqlx::query(
                "INSERT INTO history_daily (indicator_id, date, value, source)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (indicator_id, date) DO UPDATE SET
                     value = EXCLUDED.value,
                     source = EXCLUDED.source",
            )
            .bind(&row.indicator_id)
            .bind(row.date)
            .bind(row.value)
            .bind(&row.source)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    /// Last `days` canonical daily values, ordered by date.
    pub async fn fetch_historical_daily(
        &self,
        indicator_id: &str,
        days: i64,
    ) -> Result<Vec<(NaiveDate, f64)>, PxiError> {
        let cutoff = Utc::now().date_naive() - Duration::days(days);
        let rows: Vec<(NaiveDate, f64)> = sqlx::query_as(
            "SELECT date, value FROM history_daily
             WHERE indicator_id = $1 AND date >= $2
             ORDER BY date",
        )
        .bind(indicator_id)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows)
    }

    // ── Rolling stats & z-scores ────────────────────────────────────────

    pub async fn upsert_stats(&self, snapshots: &[StatsSnapshot]) -> Result<(), PxiError> {
        if snapshots.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        for snap in snapshots {
            sqlx::query(
                "INSERT INTO indicator_stats
                     (indicator_id, window_days, mean, std_dev, n, min, max, as_of)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 ON CONFLICT (indicator_id, window_days) DO UPDATE SET
                     mean = EXCLUDED.mean,
                     std_dev = EXCLUDED.std_dev,
                     n = EXCLUDED.n,
                     min = EXCLUDED.min,
                     max = EXCLUDED.max,
                     as_of = EXCLUDED.as_of",
            )
            .bind(&snap.indicator_id)
            .bind(snap.window_days)
            .bind(snap.mean)
            .bind(snap.std_dev)
            .bind(snap.n)
            .bind(snap.min)
            .bind(snap.max)
            .bind(snap.as_of)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    pub async fn latest_stats(&self, window_days: i64) -> Result<HashMap<String, StatsSnapshot>, PxiError> {
        let rows: Vec<StatsRow> = sqlx::query_as(
            "SELECT indicator_id, window_days, mean, std_dev, n, min, max, as_of
             FROM indicator_stats WHERE window_days = $1",
        )
        .bind(window_days)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows
            .into_iter()
            .map(|r| (r.indicator_id.clone(), StatsSnapshot::from(r)))
            .collect())
    }

    pub async fn insert_z_scores(&self, rows: &[ZScoreRow]) -> Result<(), PxiError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        for row in rows {
            sqlx::query(
                "INSERT INTO z_scores (indicator_id, timestamp, raw_value, mean, std_dev, z)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (indicator_id, timestamp) DO UPDATE SET
                     raw_value = EXCLUDED.raw_value,
                     mean = EXCLUDED.mean,
                     std_dev = EXCLUDED.std_dev,
                     z = EXCLUDED.z",
            )
            .bind(&row.indicator_id)
            .bind(row.timestamp)
            .bind(row.raw_value)
            .bind(row.mean)
            .bind(row.std_dev)
            .bind(row.z)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    /// Z-score history for one indicator since a cutoff, ordered by time.
    pub async fn fetch_z_scores(
        &self,
        indicator_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ZScoreRow>, PxiError> {
        let rows: Vec<ZScoreDbRow> = sqlx::query_as(
            "SELECT indicator_id, timestamp, raw_value, mean, std_dev, z
             FROM z_scores
             WHERE indicator_id = $1 AND timestamp >= $2
             ORDER BY timestamp",
        )
        .bind(indicator_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().map(ZScoreRow::from).collect())
    }

    // ── Composites ──────────────────────────────────────────────────────

    pub async fn insert_composite(&self, row: &CompositeRow) -> Result<(), PxiError> {
        let metrics = serde_json::to_value(&row.metrics)
            .map_err(|e| PxiError::Store(format!("composite metrics json: {}", e)))?;
        sqlx::query(
            "INSERT INTO composites
                 (calculated_at, raw_pxi, pxi, regime, total_weight, pamp_count, stress_count, metrics)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (calculated_at) DO UPDATE SET
                 raw_pxi = EXCLUDED.raw_pxi,
                 pxi = EXCLUDED.pxi,
                 regime = EXCLUDED.regime,
                 total_weight = EXCLUDED.total_weight,
                 pamp_count = EXCLUDED.pamp_count,
                 stress_count = EXCLUDED.stress_count,
                 metrics = EXCLUDED.metrics",
        )
        .bind(row.calculated_at)
        .bind(row.raw_pxi)
        .bind(row.pxi)
        .bind(row.regime.as_str())
        .bind(row.total_weight)
        .bind(row.pamp_count)
        .bind(row.stress_count)
        .bind(metrics)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    pub async fn insert_contributions(
        &self,
        calculated_at: DateTime<Utc>,
        metrics: &[MetricContribution],
    ) -> Result<(), PxiError> {
        if metrics.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        for metric in metrics {
            sqlx::query(
                "INSERT INTO contributions
                     (calculated_at, indicator_id, value, z, normalized_weight, contribution)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (calculated_at, indicator_id) DO UPDATE SET
                     value = EXCLUDED.value,
                     z = EXCLUDED.z,
                     normalized_weight = EXCLUDED.normalized_weight,
                     contribution = EXCLUDED.contribution",
            )
            .bind(calculated_at)
            .bind(&metric.id)
            .bind(metric.value)
            .bind(metric.z)
            .bind(metric.normalized_weight)
            .bind(metric.contribution)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    pub async fn latest_composite(&self) -> Result<Option<CompositeRow>, PxiError> {
        let row: Option<CompositeDbRow> = sqlx::query_as(
            "SELECT calculated_at, raw_pxi, pxi, regime, total_weight, pamp_count, stress_count, metrics
             FROM composites ORDER BY calculated_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(CompositeDbRow::into_composite).transpose()
    }

    pub async fn fetch_pxi_history(&self, days: i64) -> Result<Vec<CompositeRow>, PxiError> {
        let cutoff = Utc::now() - Duration::days(days);
        let rows: Vec<CompositeDbRow> = sqlx::query_as(
            "SELECT calculated_at, raw_pxi, pxi, regime, total_weight, pamp_count, stress_count, metrics
             FROM composites WHERE calculated_at >= $1 ORDER BY calculated_at",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(CompositeDbRow::into_composite).collect()
    }

    // ── Alerts ──────────────────────────────────────────────────────────

    pub async fn insert_alerts(&self, alerts: &[Alert]) -> Result<(), PxiError> {
        if alerts.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        for alert in alerts {
            sqlx::query(
                "INSERT INTO alerts
                     (alert_type, indicator_id, timestamp, raw_value, z, threshold, message, severity, acknowledged)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(alert.alert_type.as_str())
            .bind(&alert.indicator_id)
            .bind(alert.timestamp)
            .bind(alert.raw_value)
            .bind(alert.z)
            .bind(alert.threshold)
            .bind(&alert.message)
            .bind(alert.severity.as_str())
            .bind(alert.acknowledged)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    /// Count recent alerts of one type per indicator over the past
    /// `days`, used for bound-widening suggestions.
    pub async fn recent_alert_counts(
        &self,
        alert_type: pxi_core::AlertType,
        days: i64,
    ) -> Result<HashMap<String, i64>, PxiError> {
        let cutoff = Utc::now() - Duration::days(days);
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT indicator_id, COUNT(*) FROM alerts
             WHERE alert_type = $1 AND timestamp >= $2 AND indicator_id IS NOT NULL
             GROUP BY indicator_id",
        )
        .bind(alert_type.as_str())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().collect())
    }

    pub async fn fetch_recent_alerts(
        &self,
        alert_type: Option<pxi_core::AlertType>,
        indicator_id: Option<&str>,
        days: i64,
    ) -> Result<Vec<StoredAlert>, PxiError> {
        let cutoff = Utc::now() - Duration::days(days);
        let rows: Vec<AlertDbRow> = sqlx::query_as(
            "SELECT id, alert_type, indicator_id, timestamp, raw_value, z, threshold, message, severity, acknowledged
             FROM alerts
             WHERE timestamp >= $1
               AND ($2::text IS NULL OR alert_type = $2)
               AND ($3::text IS NULL OR indicator_id = $3)
             ORDER BY timestamp DESC",
        )
        .bind(cutoff)
        .bind(alert_type.map(|t| t.as_str()))
        .bind(indicator_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(AlertDbRow::into_stored).collect()
    }

    pub async fn fetch_unacknowledged_alerts(&self, days: i64) -> Result<Vec<StoredAlert>, PxiError> {
        let cutoff = Utc::now() - Duration::days(days);
        let rows: Vec<AlertDbRow> = sqlx::query_as(
            "SELECT id, alert_type, indicator_id, timestamp, raw_value, z, threshold, message, severity, acknowledged
             FROM alerts
             WHERE timestamp >= $1 AND acknowledged = FALSE
             ORDER BY timestamp DESC",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(AlertDbRow::into_stored).collect()
    }

    /// The only permitted alert mutation: acknowledged false -> true.
    pub async fn acknowledge_alert(&self, id: i64) -> Result<bool, PxiError> {
        let result = sqlx::query(
            "UPDATE alerts SET acknowledged = TRUE WHERE id = $1 AND acknowledged = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    // ── Regimes ─────────────────────────────────────────────────────────

    pub async fn insert_regimes(&self, rows: &[RegimeRow]) -> Result<(), PxiError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        for row in rows {
            let to_json = |v: &Vec<f64>, what: &str| -> Result<serde_json::Value, PxiError> {
                serde_json::to_value(v)
                    .map_err(|e| PxiError::Store(format!("regime {} json: {}", what, e)))
            };
            sqlx::query(
                "INSERT INTO regimes (date, regime, cluster_id, features, centroid, probabilities)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (date) DO UPDATE SET
                     regime = EXCLUDED.regime,
                     cluster_id = EXCLUDED.cluster_id,
                     features = EXCLUDED.features,
                     centroid = EXCLUDED.centroid,
                     probabilities = EXCLUDED.probabilities",
            )
            .bind(row.date)
            .bind(row.regime.as_str())
            .bind(row.cluster_id)
            .bind(to_json(&row.features, "features")?)
            .bind(to_json(&row.centroid, "centroid")?)
            .bind(to_json(&row.probabilities, "probabilities")?)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    pub async fn latest_regime(&self) -> Result<Option<RegimeRow>, PxiError> {
        let row: Option<RegimeDbRow> = sqlx::query_as(
            "SELECT date, regime, cluster_id, features, centroid, probabilities
             FROM regimes ORDER BY date DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(RegimeDbRow::into_regime).transpose()
    }

    pub async fn fetch_regime_history(&self, days: i64) -> Result<Vec<RegimeRow>, PxiError> {
        let cutoff = Utc::now().date_naive() - Duration::days(days);
        let rows: Vec<RegimeDbRow> = sqlx::query_as(
            "SELECT date, regime, cluster_id, features, centroid, probabilities
             FROM regimes WHERE date >= $1 ORDER BY date",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(RegimeDbRow::into_regime).collect()
    }

    // ── Technical signals ───────────────────────────────────────────────

    pub async fn upsert_technical_signal(&self, signal: &TechnicalSignal) -> Result<(), PxiError> {
        sqlx::query(
            "INSERT INTO technical_signals
                 (indicator_id, rsi, macd, macd_signal, macd_histogram, signal_multiplier, refreshed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (indicator_id) DO UPDATE SET
                 rsi = EXCLUDED.rsi,
                 macd = EXCLUDED.macd,
                 macd_signal = EXCLUDED.macd_signal,
                 macd_histogram = EXCLUDED.macd_histogram,
                 signal_multiplier = EXCLUDED.signal_multiplier,
                 refreshed_at = EXCLUDED.refreshed_at",
        )
        .bind(&signal.indicator_id)
        .bind(signal.rsi)
        .bind(signal.macd)
        .bind(signal.macd_signal)
        .bind(signal.macd_histogram)
        .bind(signal.signal_multiplier)
        .bind(signal.refreshed_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    pub async fn latest_technical_signal(
        &self,
        indicator_id: &str,
    ) -> Result<Option<TechnicalSignal>, PxiError> {
        let row: Option<TechnicalSignalRow> = sqlx::query_as(
            "SELECT indicator_id, rsi, macd, macd_signal, macd_histogram, signal_multiplier, refreshed_at
             FROM technical_signals WHERE indicator_id = $1",
        )
        .bind(indicator_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(row.map(TechnicalSignal::from))
    }
}
