use chrono::{DateTime, NaiveDate, Utc};
use pxi_core::PxiError;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const BASE_URL: &str = "https://api.twelvedata.com";

#[derive(Clone)]
pub struct TwelveDataClient {
    api_key: String,
    client: Client,
}

#[derive(Debug, Clone, Copy)]
pub struct QuoteBar {
    pub close: f64,
    pub at: DateTime<Utc>,
}

impl TwelveDataClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { api_key, client }
    }

    /// Most recent daily close for a symbol.
    pub async fn latest_daily_close(&self, symbol: &str) -> Result<QuoteBar, PxiError> {
        let bars = self.daily_closes(symbol, 2).await?;
        bars.into_iter().next().ok_or_else(|| {
            PxiError::TransformInvalid(format!("TwelveData {} returned no bars", symbol))
        })
    }

    /// Daily closes for a symbol, newest first, up to `outputsize` bars
    /// (the API caps it at 5000).
    pub async fn daily_closes(&self, symbol: &str, outputsize: u32) -> Result<Vec<QuoteBar>, PxiError> {
        let url = format!("{}/time_series", BASE_URL);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", "1day"),
                ("outputsize", &outputsize.min(5000).to_string()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PxiError::ProviderUnreachable(format!("TwelveData {}: {}", symbol, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("TwelveData {} rejected (HTTP {}): {}", symbol, status, body);
            return Err(PxiError::ProviderRejected { status: status.as_u16(), body });
        }

        let parsed: TimeSeriesResponse = response
            .json()
            .await
            .map_err(|e| PxiError::TransformInvalid(format!("TwelveData {}: {}", symbol, e)))?;

        // TwelveData reports API-level errors with HTTP 200 and a status
        // field in the body.
        if parsed.status.as_deref() == Some("error") {
            return Err(PxiError::ProviderRejected {
                status: status.as_u16(),
                body: parsed.message.unwrap_or_else(|| "unknown TwelveData error".to_string()),
            });
        }

        parsed.values.iter().map(parse_bar).collect()
    }
}

fn parse_bar(bar: &TimeSeriesValue) -> Result<QuoteBar, PxiError> {
    let close: f64 = bar
        .close
        .parse()
        .map_err(|_| PxiError::TransformInvalid(format!("close {:?} is not numeric", bar.close)))?;

    // Daily bars carry a bare date; intraday a full datetime.
    let at = NaiveDate::parse_from_str(&bar.datetime, "%Y-%m-%d")
        .map(|d| d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()))
        .ok()
        .flatten()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(&bar.datetime, "%Y-%m-%d %H:%M:%S")
                .map(|dt| dt.and_utc())
                .ok()
        })
        .ok_or_else(|| {
            PxiError::TransformInvalid(format!("bad TwelveData datetime {:?}", bar.datetime))
        })?;

    Ok(QuoteBar { close, at })
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(default)]
    values: Vec<TimeSeriesValue>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesValue {
    datetime: String,
    close: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_daily_bar() {
        let bar = TimeSeriesValue {
            datetime: "2024-03-15".to_string(),
            close: "103.52".to_string(),
        };
        let quote = parse_bar(&bar).unwrap();
        assert!((quote.close - 103.52).abs() < 1e-12);
        assert_eq!(quote.at.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
    }

    #[test]
    fn parses_intraday_datetime() {
        let bar = TimeSeriesValue {
            datetime: "2024-03-15 14:30:00".to_string(),
            close: "103.52".to_string(),
        };
        assert!(parse_bar(&bar).is_ok());
    }

    #[test]
    fn bad_close_is_invalid() {
        let bar = TimeSeriesValue {
            datetime: "2024-03-15".to_string(),
            close: "n/a".to_string(),
        };
        assert!(parse_bar(&bar).is_err());
    }

    #[test]
    fn error_status_body_is_detected() {
        let json = r#"{"status":"error","message":"symbol not found"}"#;
        let parsed: TimeSeriesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.status.as_deref(), Some("error"));
        assert!(parsed.values.is_empty());
    }
}
