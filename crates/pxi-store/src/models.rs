use chrono::{DateTime, NaiveDate, Utc};
use pxi_core::{
    Alert, AlertType, CompositeRow, DiscoveredRegime, MetricContribution, PxiError, RegimeRow,
    Sample, Severity, SignalOverrides, StatsSnapshot, TechnicalSignal, ThresholdRegime, ZScoreRow,
};

pub(crate) fn store_err(e: sqlx::Error) -> PxiError {
    PxiError::Store(e.to_string())
}

fn decode_err(context: &str) -> PxiError {
    PxiError::Store(format!("undecodable row: {}", context))
}

#[derive(sqlx::FromRow)]
pub(crate) struct SampleRow {
    pub indicator_id: String,
    pub value: f64,
    pub unit: String,
    pub source_timestamp: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    pub signal_multiplier: Option<f64>,
}

impl From<SampleRow> for Sample {
    fn from(row: SampleRow) -> Self {
        Sample {
            indicator_id: row.indicator_id,
            value: row.value,
            unit: row.unit,
            source_timestamp: row.source_timestamp,
            ingested_at: row.ingested_at,
            overrides: SignalOverrides { signal_multiplier: row.signal_multiplier },
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct StatsRow {
    pub indicator_id: String,
    pub window_days: i64,
    pub mean: f64,
    pub std_dev: Option<f64>,
    pub n: i64,
    pub min: f64,
    pub max: f64,
    pub as_of: DateTime<Utc>,
}

impl From<StatsRow> for StatsSnapshot {
    fn from(row: StatsRow) -> Self {
        StatsSnapshot {
            indicator_id: row.indicator_id,
            window_days: row.window_days,
            mean: row.mean,
            std_dev: row.std_dev,
            n: row.n,
            min: row.min,
            max: row.max,
            as_of: row.as_of,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ZScoreDbRow {
    pub indicator_id: String,
    pub timestamp: DateTime<Utc>,
    pub raw_value: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub z: f64,
}

impl From<ZScoreDbRow> for ZScoreRow {
    fn from(row: ZScoreDbRow) -> Self {
        ZScoreRow {
            indicator_id: row.indicator_id,
            timestamp: row.timestamp,
            raw_value: row.raw_value,
            mean: row.mean,
            std_dev: row.std_dev,
            z: row.z,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CompositeDbRow {
    pub calculated_at: DateTime<Utc>,
    pub raw_pxi: f64,
    pub pxi: f64,
    pub regime: String,
    pub total_weight: f64,
    pub pamp_count: i64,
    pub stress_count: i64,
    pub metrics: serde_json::Value,
}

impl CompositeDbRow {
    pub(crate) fn into_composite(self) -> Result<CompositeRow, PxiError> {
        let metrics: Vec<MetricContribution> = serde_json::from_value(self.metrics)
            .map_err(|e| PxiError::Store(format!("composite metrics json: {}", e)))?;
        let regime = ThresholdRegime::from_str_label(&self.regime)
            .ok_or_else(|| decode_err(&format!("regime {}", self.regime)))?;
        Ok(CompositeRow {
            calculated_at: self.calculated_at,
            raw_pxi: self.raw_pxi,
            pxi: self.pxi,
            metrics,
            regime,
            total_weight: self.total_weight,
            pamp_count: self.pamp_count,
            stress_count: self.stress_count,
        })
    }
}

/// An alert as persisted, carrying its row id so acknowledgment can
/// target it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoredAlert {
    pub id: i64,
    #[serde(flatten)]
    pub alert: Alert,
}

#[derive(sqlx::FromRow)]
pub(crate) struct AlertDbRow {
    pub id: i64,
    pub alert_type: String,
    pub indicator_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub raw_value: Option<f64>,
    pub z: Option<f64>,
    pub threshold: Option<f64>,
    pub message: String,
    pub severity: String,
    pub acknowledged: bool,
}

impl AlertDbRow {
    pub(crate) fn into_stored(self) -> Result<StoredAlert, PxiError> {
        let alert_type = AlertType::from_str_label(&self.alert_type)
            .ok_or_else(|| decode_err(&format!("alert_type {}", self.alert_type)))?;
        let severity = Severity::from_str_label(&self.severity)
            .ok_or_else(|| decode_err(&format!("severity {}", self.severity)))?;
        Ok(StoredAlert {
            id: self.id,
            alert: Alert {
                alert_type,
                indicator_id: self.indicator_id,
                timestamp: self.timestamp,
                raw_value: self.raw_value,
                z: self.z,
                threshold: self.threshold,
                message: self.message,
                severity,
                acknowledged: self.acknowledged,
            },
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct RegimeDbRow {
    pub date: NaiveDate,
    pub regime: String,
    pub cluster_id: i64,
    pub features: serde_json::Value,
    pub centroid: serde_json::Value,
    pub probabilities: serde_json::Value,
}

impl RegimeDbRow {
    pub(crate) fn into_regime(self) -> Result<RegimeRow, PxiError> {
        let regime = DiscoveredRegime::from_str_label(&self.regime)
            .ok_or_else(|| decode_err(&format!("regime {}", self.regime)))?;
        let json_vec = |value: serde_json::Value, what: &str| -> Result<Vec<f64>, PxiError> {
            serde_json::from_value(value)
                .map_err(|e| PxiError::Store(format!("regime {} json: {}", what, e)))
        };
        Ok(RegimeRow {
            date: self.date,
            regime,
            cluster_id: self.cluster_id,
            features: json_vec(self.features, "features")?,
            centroid: json_vec(self.centroid, "centroid")?,
            probabilities: json_vec(self.probabilities, "probabilities")?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct TechnicalSignalRow {
    pub indicator_id: String,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub signal_multiplier: f64,
    pub refreshed_at: DateTime<Utc>,
}

impl From<TechnicalSignalRow> for TechnicalSignal {
    fn from(row: TechnicalSignalRow) -> Self {
        TechnicalSignal {
            indicator_id: row.indicator_id,
            rsi: row.rsi,
            macd: row.macd,
            macd_signal: row.macd_signal,
            macd_histogram: row.macd_histogram,
            signal_multiplier: row.signal_multiplier,
            refreshed_at: row.refreshed_at,
        }
    }
}
