use async_trait::async_trait;
use chrono::Utc;
use pxi_core::{indicator, IndicatorDefinition, IndicatorFetcher, PxiError, Sample, SignalOverrides};

use crate::coingecko::CoinGeckoClient;
use crate::fred::{latest_common_observation, FredClient};
use crate::twelvedata::TwelveDataClient;

fn sample_for(def: &IndicatorDefinition, value: f64, source_timestamp: chrono::DateTime<Utc>) -> Sample {
    Sample {
        indicator_id: def.id.to_string(),
        value,
        unit: def.unit.to_string(),
        source_timestamp,
        ingested_at: Utc::now(),
        overrides: SignalOverrides::default(),
    }
}

/// Fetcher for a single FRED series. Percent-quoted series are divided by
/// 100 onto the canonical decimal scale.
pub struct FredSeriesFetcher {
    client: FredClient,
    def: &'static IndicatorDefinition,
    percent_series: bool,
}

impl FredSeriesFetcher {
    pub fn new(client: FredClient, indicator_id: &str, percent_series: bool) -> Self {
        let def = indicator(indicator_id)
            .unwrap_or_else(|| panic!("unknown indicator {}", indicator_id));
        Self { client, def, percent_series }
    }
}

#[async_trait]
impl IndicatorFetcher for FredSeriesFetcher {
    fn indicator_id(&self) -> &'static str {
        self.def.id
    }

    async fn fetch(&self) -> Result<Sample, PxiError> {
        let obs = self.client.latest_observation(self.def.provider_series_id).await?;
        let value = if self.percent_series { obs.value / 100.0 } else { obs.value };
        if !value.is_finite() {
            return Err(PxiError::TransformInvalid(format!(
                "{} produced non-finite value",
                self.def.id
            )));
        }
        Ok(sample_for(self.def, value, obs.source_timestamp()))
    }
}

/// 10y minus 2y slope from two FRED series, joined on their latest common
/// date. Fails when either leg is missing for that date.
pub struct YieldCurveFetcher {
    client: FredClient,
    def: &'static IndicatorDefinition,
}

impl YieldCurveFetcher {
    pub const TEN_YEAR: &'static str = "DGS10";
    pub const TWO_YEAR: &'static str = "DGS2";

    pub fn new(client: FredClient) -> Self {
        let def = indicator("yield_curve").expect("yield_curve missing from registry");
        Self { client, def }
    }
}

#[async_trait]
impl IndicatorFetcher for YieldCurveFetcher {
    fn indicator_id(&self) -> &'static str {
        self.def.id
    }

    async fn fetch(&self) -> Result<Sample, PxiError> {
        let (tens, twos) = tokio::try_join!(
            self.client.recent_observations(Self::TEN_YEAR, 10),
            self.client.recent_observations(Self::TWO_YEAR, 10),
        )?;

        let (date, ten, two) = latest_common_observation(&tens, &twos)?;
        let slope = (ten - two) / 100.0;
        let source = date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now);
        Ok(sample_for(self.def, slope, source))
    }
}

/// 24h bitcoin return from the last two CoinGecko daily closes.
pub struct CryptoReturnFetcher {
    client: CoinGeckoClient,
    def: &'static IndicatorDefinition,
}

impl CryptoReturnFetcher {
    pub fn new(client: CoinGeckoClient) -> Self {
        let def = indicator("btc_return").expect("btc_return missing from registry");
        Self { client, def }
    }
}

#[async_trait]
impl IndicatorFetcher for CryptoReturnFetcher {
    fn indicator_id(&self) -> &'static str {
        self.def.id
    }

    async fn fetch(&self) -> Result<Sample, PxiError> {
        let pair = self.client.last_two_daily_closes(self.def.provider_series_id).await?;
        let value = pair.daily_return()?;
        Ok(sample_for(self.def, value, pair.latest_at))
    }
}

/// Dollar-index close from TwelveData.
pub struct UsdIndexFetcher {
    client: TwelveDataClient,
    def: &'static IndicatorDefinition,
}

impl UsdIndexFetcher {
    pub fn new(client: TwelveDataClient) -> Self {
        let def = indicator("usd_index").expect("usd_index missing from registry");
        Self { client, def }
    }
}

#[async_trait]
impl IndicatorFetcher for UsdIndexFetcher {
    fn indicator_id(&self) -> &'static str {
        self.def.id
    }

    async fn fetch(&self) -> Result<Sample, PxiError> {
        let quote = self.client.latest_daily_close(self.def.provider_series_id).await?;
        Ok(sample_for(self.def, quote.close, quote.at))
    }
}

/// Assemble the full fetcher panel. Each fetcher owns a clone of its
/// provider client so they share no mutable state and can run in
/// parallel.
pub fn build_fetchers(
    fred: FredClient,
    coingecko: CoinGeckoClient,
    twelvedata: TwelveDataClient,
) -> Vec<std::sync::Arc<dyn IndicatorFetcher>> {
    vec![
        std::sync::Arc::new(FredSeriesFetcher::new(fred.clone(), "hy_oas", true)),
        std::sync::Arc::new(FredSeriesFetcher::new(fred.clone(), "ig_oas", true)),
        std::sync::Arc::new(FredSeriesFetcher::new(fred.clone(), "vix", false)),
        std::sync::Arc::new(FredSeriesFetcher::new(fred.clone(), "unemployment", true)),
        std::sync::Arc::new(FredSeriesFetcher::new(fred.clone(), "nfci", false)),
        std::sync::Arc::new(FredSeriesFetcher::new(fred.clone(), "breakeven_10y", true)),
        std::sync::Arc::new(YieldCurveFetcher::new(fred)),
        std::sync::Arc::new(CryptoReturnFetcher::new(coingecko)),
        std::sync::Arc::new(UsdIndexFetcher::new(twelvedata)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panel_covers_every_registry_indicator() {
        let fetchers = build_fetchers(
            FredClient::new("test-key".to_string()),
            CoinGeckoClient::new(crate::coingecko::DEFAULT_BASE_URL.to_string()),
            TwelveDataClient::new("test-key".to_string()),
        );
        let mut covered: Vec<&str> = fetchers.iter().map(|f| f.indicator_id()).collect();
        covered.sort();
        let mut expected: Vec<&str> =
            pxi_core::indicator_registry().iter().map(|d| d.id).collect();
        expected.sort();
        assert_eq!(covered, expected);
    }

    #[test]
    fn percent_transform_lands_on_decimal_scale() {
        // 3.45 (percent) -> 0.0345 (decimal), inside hy_oas hard bounds.
        let def = indicator("hy_oas").unwrap();
        let value = 3.45 / 100.0;
        assert!(value >= def.hard_min && value <= def.hard_max);
    }
}
