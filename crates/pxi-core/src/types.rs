use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Z-score sign convention for an indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    Positive,
    Negative,
}

/// Sign with which an indicator's z-score enters the composite.
/// `HigherIsMoreRisk` contributes with direction -1 so that positive
/// composite values mean low stress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskDirection {
    HigherIsMoreRisk,
    HigherIsLessRisk,
}

impl RiskDirection {
    pub fn sign(&self) -> f64 {
        match self {
            RiskDirection::HigherIsMoreRisk => -1.0,
            RiskDirection::HigherIsLessRisk => 1.0,
        }
    }
}

/// External data provider backing an indicator series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provider {
    Fred,
    CoinGecko,
    TwelveData,
}

/// Static, process-lifetime configuration for one indicator.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorDefinition {
    pub id: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    /// Display bounds for dashboards; breaching them is informational.
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// Absolute sanity bounds; a value outside them fails validation.
    pub hard_min: f64,
    pub hard_max: f64,
    pub weight: f64,
    pub polarity: Polarity,
    pub risk_direction: RiskDirection,
    pub provider: Provider,
    pub provider_series_id: &'static str,
}

/// Typed, explicitly enumerated per-sample overrides. Unknown fields are
/// rejected at ingest rather than silently tolerated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignalOverrides {
    pub signal_multiplier: Option<f64>,
}

/// One raw observation for one indicator.
/// Invariant: `source_timestamp <= ingested_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub indicator_id: String,
    pub value: f64,
    pub unit: String,
    pub source_timestamp: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    #[serde(default)]
    pub overrides: SignalOverrides,
}

/// Rolling-window statistics for one indicator.
/// `std_dev` is None when fewer than 5 resampled points were available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub indicator_id: String,
    pub window_days: i64,
    pub mean: f64,
    pub std_dev: Option<f64>,
    pub n: i64,
    pub min: f64,
    pub max: f64,
    pub as_of: DateTime<Utc>,
}

/// One stored z-score computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZScoreRow {
    pub indicator_id: String,
    pub timestamp: DateTime<Utc>,
    pub raw_value: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub z: f64,
}

/// Per-indicator share of one composite computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricContribution {
    pub id: String,
    pub value: f64,
    pub z: f64,
    pub normalized_weight: f64,
    pub contribution: f64,
}

/// Threshold-derived regime over the composite scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdRegime {
    StrongPamp,
    ModeratePamp,
    Normal,
    ElevatedStress,
    Crisis,
}

impl ThresholdRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdRegime::StrongPamp => "Strong PAMP",
            ThresholdRegime::ModeratePamp => "Moderate PAMP",
            ThresholdRegime::Normal => "Normal",
            ThresholdRegime::ElevatedStress => "Elevated Stress",
            ThresholdRegime::Crisis => "Crisis",
        }
    }

    pub fn from_str_label(label: &str) -> Option<Self> {
        match label {
            "Strong PAMP" => Some(ThresholdRegime::StrongPamp),
            "Moderate PAMP" => Some(ThresholdRegime::ModeratePamp),
            "Normal" => Some(ThresholdRegime::Normal),
            "Elevated Stress" => Some(ThresholdRegime::ElevatedStress),
            "Crisis" => Some(ThresholdRegime::Crisis),
            _ => None,
        }
    }
}

/// One composite (PXI) computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeRow {
    pub calculated_at: DateTime<Utc>,
    pub raw_pxi: f64,
    /// Clamped to [-3, 3]; display value is rounded to 3 decimals.
    pub pxi: f64,
    pub metrics: Vec<MetricContribution>,
    pub regime: ThresholdRegime,
    pub total_weight: f64,
    pub pamp_count: i64,
    pub stress_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    pub fn from_str_label(label: &str) -> Option<Self> {
        match label {
            "info" => Some(Severity::Info),
            "warning" => Some(Severity::Warning),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    HighZScore,
    DeviationReview,
    BoundSuggestion,
    CompositeBreach,
    PxiChange,
    HealthCheck,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::HighZScore => "high_z_score",
            AlertType::DeviationReview => "deviation_review",
            AlertType::BoundSuggestion => "bound_suggestion",
            AlertType::CompositeBreach => "composite_breach",
            AlertType::PxiChange => "pxi_change",
            AlertType::HealthCheck => "health_check",
        }
    }

    pub fn from_str_label(label: &str) -> Option<Self> {
        match label {
            "high_z_score" => Some(AlertType::HighZScore),
            "deviation_review" => Some(AlertType::DeviationReview),
            "bound_suggestion" => Some(AlertType::BoundSuggestion),
            "composite_breach" => Some(AlertType::CompositeBreach),
            "pxi_change" => Some(AlertType::PxiChange),
            "health_check" => Some(AlertType::HealthCheck),
            _ => None,
        }
    }
}

/// Durable alert. Append-only; `acknowledged` is the only mutable field
/// and may only transition false -> true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: AlertType,
    pub indicator_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub raw_value: Option<f64>,
    pub z: Option<f64>,
    pub threshold: Option<f64>,
    pub message: String,
    pub severity: Severity,
    pub acknowledged: bool,
}

/// Discovered (clustered) regime label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoveredRegime {
    Calm,
    Normal,
    Stress,
}

impl DiscoveredRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveredRegime::Calm => "Calm",
            DiscoveredRegime::Normal => "Normal",
            DiscoveredRegime::Stress => "Stress",
        }
    }

    pub fn from_str_label(label: &str) -> Option<Self> {
        match label {
            "Calm" => Some(DiscoveredRegime::Calm),
            "Normal" => Some(DiscoveredRegime::Normal),
            "Stress" => Some(DiscoveredRegime::Stress),
            _ => None,
        }
    }
}

/// One labeled day from the regime discovery pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeRow {
    pub date: NaiveDate,
    pub regime: DiscoveredRegime,
    pub cluster_id: i64,
    pub features: Vec<f64>,
    pub centroid: Vec<f64>,
    /// Soft membership derived from the distance vector to every centroid.
    pub probabilities: Vec<f64>,
}

/// Canonical daily value for one indicator, used for long-range
/// statistics and regime features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryDaily {
    pub indicator_id: String,
    pub date: NaiveDate,
    pub value: f64,
    pub source: String,
}

/// Externally computed technical indicators cached for the
/// signal-multiplier override (refreshed twice daily).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalSignal {
    pub indicator_id: String,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub signal_multiplier: f64,
    pub refreshed_at: DateTime<Utc>,
}
