use pxi_core::PxiError;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Neutral multiplier when technicals are unavailable or inconclusive.
pub const NEUTRAL_MULTIPLIER: f64 = 1.0;
/// Applied when either RSI or MACD confirms a strong move.
pub const PARTIAL_MULTIPLIER: f64 = 1.25;
/// Applied when RSI and MACD agree on a strong directional move.
pub const CONFIRMED_MULTIPLIER: f64 = 1.5;

#[derive(Clone)]
pub struct AlphaVantageClient {
    api_key: String,
    client: Client,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TechnicalReadings {
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
}

impl AlphaVantageClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { api_key, client }
    }

    async fn query(&self, params: &[(&str, &str)]) -> Result<serde_json::Value, PxiError> {
        let response = self
            .client
            .get(BASE_URL)
            .query(params)
            .send()
            .await
            .map_err(|e| PxiError::ProviderUnreachable(format!("Alpha Vantage: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Alpha Vantage rejected (HTTP {}): {}", status, body);
            return Err(PxiError::ProviderRejected { status: status.as_u16(), body });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PxiError::TransformInvalid(format!("Alpha Vantage: {}", e)))?;

        if let Some(error) = json.get("Error Message") {
            return Err(PxiError::ProviderRejected {
                status: status.as_u16(),
                body: error.to_string(),
            });
        }
        if let Some(note) = json.get("Note") {
            // Rate-limit notes also arrive with HTTP 200.
            return Err(PxiError::ProviderRejected {
                status: 429,
                body: note.to_string(),
            });
        }

        Ok(json)
    }

    /// Latest daily RSI for a symbol.
    pub async fn latest_rsi(&self, symbol: &str) -> Result<f64, PxiError> {
        let json = self
            .query(&[
                ("function", "RSI"),
                ("symbol", symbol),
                ("interval", "daily"),
                ("time_period", "14"),
                ("series_type", "close"),
                ("apikey", self.api_key.as_str()),
            ])
            .await?;

        latest_entry_value(&json, "Technical Analysis: RSI", "RSI")
    }

    /// Latest daily MACD readings for a symbol.
    pub async fn latest_macd(&self, symbol: &str) -> Result<MacdReading, PxiError> {
        let json = self
            .query(&[
                ("function", "MACD"),
                ("symbol", symbol),
                ("interval", "daily"),
                ("series_type", "close"),
                ("apikey", self.api_key.as_str()),
            ])
            .await?;

        let analysis = json
            .get("Technical Analysis: MACD")
            .and_then(|v| v.as_object())
            .ok_or_else(|| PxiError::TransformInvalid("no MACD data found".to_string()))?;

        let (_, values) = analysis
            .iter()
            .max_by(|a, b| a.0.cmp(b.0))
            .ok_or_else(|| PxiError::TransformInvalid("empty MACD series".to_string()))?;

        let field = |name: &str| -> Result<f64, PxiError> {
            values
                .get(name)
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| PxiError::TransformInvalid(format!("MACD field {} missing", name)))
        };

        Ok(MacdReading {
            macd: field("MACD")?,
            signal: field("MACD_Signal")?,
            histogram: field("MACD_Hist")?,
        })
    }

    /// Pull RSI + MACD together, tolerating one of the two failing.
    pub async fn technical_readings(&self, symbol: &str) -> TechnicalReadings {
        let mut readings = TechnicalReadings::default();

        match self.latest_rsi(symbol).await {
            Ok(rsi) => readings.rsi = Some(rsi),
            Err(e) => tracing::warn!("RSI fetch failed for {}: {}", symbol, e),
        }
        match self.latest_macd(symbol).await {
            Ok(macd) => {
                readings.macd = Some(macd.macd);
                readings.macd_signal = Some(macd.signal);
                readings.macd_histogram = Some(macd.histogram);
            }
            Err(e) => tracing::warn!("MACD fetch failed for {}: {}", symbol, e),
        }

        readings
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MacdReading {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

fn latest_entry_value(json: &serde_json::Value, section: &str, field: &str) -> Result<f64, PxiError> {
    let analysis = json
        .get(section)
        .and_then(|v| v.as_object())
        .ok_or_else(|| PxiError::TransformInvalid(format!("no {} data found", field)))?;

    // Keys are ISO dates, so the lexicographic max is the newest entry.
    let (_, values) = analysis
        .iter()
        .max_by(|a, b| a.0.cmp(b.0))
        .ok_or_else(|| PxiError::TransformInvalid(format!("empty {} series", field)))?;

    values
        .get(field)
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| PxiError::TransformInvalid(format!("{} value missing", field)))
}

/// Map technical readings to the crypto signal multiplier: an extreme RSI
/// (beyond 70/30) flags a strong move; a MACD histogram agreeing on
/// direction confirms it and earns the full amplification.
pub fn signal_multiplier(readings: &TechnicalReadings) -> f64 {
    let rsi_extreme = readings.rsi.map(|r| r >= 70.0 || r <= 30.0).unwrap_or(false);

    let agree = match (readings.rsi, readings.macd_histogram) {
        (Some(rsi), Some(hist)) => (rsi >= 70.0 && hist > 0.0) || (rsi <= 30.0 && hist < 0.0),
        _ => false,
    };

    if agree {
        CONFIRMED_MULTIPLIER
    } else if rsi_extreme {
        PARTIAL_MULTIPLIER
    } else {
        NEUTRAL_MULTIPLIER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmed_momentum_gets_full_multiplier() {
        let readings = TechnicalReadings {
            rsi: Some(75.0),
            macd: Some(120.0),
            macd_signal: Some(80.0),
            macd_histogram: Some(40.0),
        };
        assert_eq!(signal_multiplier(&readings), CONFIRMED_MULTIPLIER);
    }

    #[test]
    fn oversold_with_falling_macd_also_confirms() {
        let readings = TechnicalReadings {
            rsi: Some(25.0),
            macd: Some(-80.0),
            macd_signal: Some(-40.0),
            macd_histogram: Some(-40.0),
        };
        assert_eq!(signal_multiplier(&readings), CONFIRMED_MULTIPLIER);
    }

    #[test]
    fn single_confirmation_is_partial() {
        let readings = TechnicalReadings {
            rsi: Some(75.0),
            macd_histogram: Some(-5.0),
            ..Default::default()
        };
        assert_eq!(signal_multiplier(&readings), PARTIAL_MULTIPLIER);
    }

    #[test]
    fn missing_readings_are_neutral() {
        assert_eq!(signal_multiplier(&TechnicalReadings::default()), NEUTRAL_MULTIPLIER);
    }

    #[test]
    fn latest_entry_takes_newest_date() {
        let json: serde_json::Value = serde_json::from_str(
            r#"{"Technical Analysis: RSI":{
                "2024-03-14":{"RSI":"55.0"},
                "2024-03-15":{"RSI":"71.5"},
                "2024-03-13":{"RSI":"48.2"}
            }}"#,
        )
        .unwrap();
        let value = latest_entry_value(&json, "Technical Analysis: RSI", "RSI").unwrap();
        assert!((value - 71.5).abs() < 1e-12);
    }
}
