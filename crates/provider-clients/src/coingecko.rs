use chrono::{DateTime, Utc};
use pxi_core::PxiError;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Clone)]
pub struct CoinGeckoClient {
    base_url: String,
    client: Client,
}

/// Two consecutive daily closes, newest last, with the newest close's
/// timestamp.
#[derive(Debug, Clone, Copy)]
pub struct DailyClosePair {
    pub previous: f64,
    pub latest: f64,
    pub latest_at: DateTime<Utc>,
}

impl DailyClosePair {
    /// 24h return on the canonical decimal scale.
    pub fn daily_return(&self) -> Result<f64, PxiError> {
        if self.previous <= 0.0 {
            return Err(PxiError::TransformInvalid(format!(
                "non-positive previous close {}",
                self.previous
            )));
        }
        Ok((self.latest - self.previous) / self.previous)
    }
}

impl CoinGeckoClient {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { base_url, client }
    }

    /// Daily closes for a coin in USD over the trailing `days` window,
    /// oldest first. The public API caps the window at 365 days.
    pub async fn daily_closes(
        &self,
        coin_id: &str,
        days: u32,
    ) -> Result<Vec<(DateTime<Utc>, f64)>, PxiError> {
        let url = format!("{}/coins/{}/market_chart", self.base_url, coin_id);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("vs_currency", "usd"),
                ("days", &days.min(365).to_string()),
                ("interval", "daily"),
            ])
            .send()
            .await
            .map_err(|e| PxiError::ProviderUnreachable(format!("CoinGecko {}: {}", coin_id, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("CoinGecko {} rejected (HTTP {}): {}", coin_id, status, body);
            return Err(PxiError::ProviderRejected { status: status.as_u16(), body });
        }

        let chart: MarketChart = response
            .json()
            .await
            .map_err(|e| PxiError::TransformInvalid(format!("CoinGecko {}: {}", coin_id, e)))?;

        let mut closes = Vec::with_capacity(chart.prices.len());
        for (ts, price) in chart.prices {
            let at = DateTime::from_timestamp_millis(ts).ok_or_else(|| {
                PxiError::TransformInvalid(format!("bad close timestamp {}", ts))
            })?;
            closes.push((at, price));
        }
        Ok(closes)
    }

    /// The last two daily closes for a coin in USD.
    pub async fn last_two_daily_closes(&self, coin_id: &str) -> Result<DailyClosePair, PxiError> {
        let closes = self.daily_closes(coin_id, 2).await?;
        let prices: Vec<(i64, f64)> = closes
            .iter()
            .map(|(at, price)| (at.timestamp_millis(), *price))
            .collect();
        pair_from_prices(&prices)
    }
}

#[derive(Debug, Deserialize)]
struct MarketChart {
    #[serde(default)]
    prices: Vec<(i64, f64)>,
}

fn pair_from_prices(prices: &[(i64, f64)]) -> Result<DailyClosePair, PxiError> {
    if prices.len() < 2 {
        return Err(PxiError::TransformInvalid(format!(
            "need two daily closes, got {}",
            prices.len()
        )));
    }
    let (prev_ts, previous) = prices[prices.len() - 2];
    let (latest_ts, latest) = prices[prices.len() - 1];
    if latest_ts <= prev_ts {
        return Err(PxiError::TransformInvalid(
            "daily closes are not time-ordered".to_string(),
        ));
    }
    let latest_at = DateTime::from_timestamp_millis(latest_ts).ok_or_else(|| {
        PxiError::TransformInvalid(format!("bad close timestamp {}", latest_ts))
    })?;
    Ok(DailyClosePair { previous, latest, latest_at })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_return_from_two_closes() {
        let prices = vec![(1_700_000_000_000, 40_000.0), (1_700_086_400_000, 42_000.0)];
        let pair = pair_from_prices(&prices).unwrap();
        let ret = pair.daily_return().unwrap();
        assert!((ret - 0.05).abs() < 1e-12);
    }

    #[test]
    fn negative_return() {
        let prices = vec![(1_700_000_000_000, 40_000.0), (1_700_086_400_000, 36_000.0)];
        let pair = pair_from_prices(&prices).unwrap();
        assert!((pair.daily_return().unwrap() + 0.10).abs() < 1e-12);
    }

    #[test]
    fn single_close_is_invalid() {
        let prices = vec![(1_700_000_000_000, 40_000.0)];
        assert!(pair_from_prices(&prices).is_err());
    }

    #[test]
    fn unordered_closes_are_invalid() {
        let prices = vec![(1_700_086_400_000, 40_000.0), (1_700_000_000_000, 42_000.0)];
        assert!(pair_from_prices(&prices).is_err());
    }

    #[test]
    fn zero_previous_close_is_invalid() {
        let pair = DailyClosePair {
            previous: 0.0,
            latest: 1.0,
            latest_at: Utc::now(),
        };
        assert!(pair.daily_return().is_err());
    }
}
