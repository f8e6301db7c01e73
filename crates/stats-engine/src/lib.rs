//! Rolling statistics for the indicator pipeline: daily resampling,
//! sparse-series forward-fill, rolling mean/sigma, z-scores, rolling
//! volatility, and per-indicator health classification. Everything here
//! is pure; callers load history and persist results.

mod correlation;
mod health;
mod resample;
mod rolling;

pub use correlation::{correlation_pairs, pearson};
pub use health::{classify_health, IndicatorHealth};
pub use resample::{fill_sparse_daily, resample_daily, DailyPoint};
pub use rolling::{
    compute_z, rolling_stats, rolling_volatility, stability_rating, z_score, StabilityRating,
    StatsSummary, ZComputation, DEFAULT_SPARSE_THRESHOLD, FLAT_SIGMA, MIN_POINTS,
};
