use async_trait::async_trait;

use crate::{PxiError, Sample};

/// Trait for per-indicator fetchers. Implementations must be independent
/// (no shared mutable state) so the scheduler can run them in parallel.
#[async_trait]
pub trait IndicatorFetcher: Send + Sync {
    fn indicator_id(&self) -> &'static str;

    /// Fetch the most recent observation and transform it onto the
    /// indicator's canonical scale. The sample's `source_timestamp` is the
    /// provider's observation time, never wall-clock.
    async fn fetch(&self) -> Result<Sample, PxiError>;
}
