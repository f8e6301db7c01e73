//! Shared domain types for the PXI stress-index pipeline.

mod error;
mod registry;
mod traits;
mod types;

pub use error::PxiError;
pub use registry::{indicator, indicator_registry, INDICATORS};
pub use traits::IndicatorFetcher;
pub use types::{
    Alert, AlertType, CompositeRow, DiscoveredRegime, HistoryDaily, IndicatorDefinition,
    MetricContribution, Polarity, Provider, RegimeRow, RiskDirection, Sample, Severity,
    SignalOverrides, StatsSnapshot, TechnicalSignal, ThresholdRegime, ZScoreRow,
};
