use chrono::{DateTime, NaiveDate, Utc};
use pxi_core::PxiError;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const BASE_URL: &str = "https://api.stlouisfed.org/fred";

/// One parsed FRED observation. FRED reports missing values as ".".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

impl Observation {
    /// FRED series are daily; the canonical source timestamp is the end
    /// of the observation's UTC day.
    pub fn source_timestamp(&self) -> DateTime<Utc> {
        self.date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now)
    }
}

#[derive(Clone)]
pub struct FredClient {
    api_key: String,
    client: Client,
}

impl FredClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { api_key, client }
    }

    /// Fetch the most recent observations for a series, newest first.
    pub async fn recent_observations(
        &self,
        series_id: &str,
        limit: u32,
    ) -> Result<Vec<Observation>, PxiError> {
        let url = format!("{}/series/observations", BASE_URL);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("series_id", series_id),
                ("api_key", self.api_key.as_str()),
                ("file_type", "json"),
                ("sort_order", "desc"),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| PxiError::ProviderUnreachable(format!("FRED {}: {}", series_id, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("FRED {} rejected (HTTP {}): {}", series_id, status, body);
            return Err(PxiError::ProviderRejected { status: status.as_u16(), body });
        }

        let parsed: ObservationsResponse = response
            .json()
            .await
            .map_err(|e| PxiError::TransformInvalid(format!("FRED {}: {}", series_id, e)))?;

        let mut observations = Vec::new();
        for raw in parsed.observations {
            if raw.value == "." {
                continue;
            }
            let value: f64 = raw.value.parse().map_err(|_| {
                PxiError::TransformInvalid(format!(
                    "FRED {} value {:?} is not numeric",
                    series_id, raw.value
                ))
            })?;
            let date = NaiveDate::parse_from_str(&raw.date, "%Y-%m-%d").map_err(|_| {
                PxiError::TransformInvalid(format!("FRED {} date {:?}", series_id, raw.date))
            })?;
            observations.push(Observation { date, value });
        }

        Ok(observations)
    }

    /// The latest defined observation for a series.
    pub async fn latest_observation(&self, series_id: &str) -> Result<Observation, PxiError> {
        self.recent_observations(series_id, 10)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                PxiError::TransformInvalid(format!("FRED {} has no defined observations", series_id))
            })
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: String,
    value: String,
}

/// Join two FRED legs on their latest common date (used for the
/// 10y-minus-2y slope). Fails when no common date carries both values.
pub fn latest_common_observation(
    a: &[Observation],
    b: &[Observation],
) -> Result<(NaiveDate, f64, f64), PxiError> {
    for obs_a in a {
        if let Some(obs_b) = b.iter().find(|o| o.date == obs_a.date) {
            return Ok((obs_a.date, obs_a.value, obs_b.value));
        }
    }
    Err(PxiError::TransformInvalid(
        "no common observation date across yield-curve legs".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(d: u32, value: f64) -> Observation {
        Observation {
            date: NaiveDate::from_ymd_opt(2024, 3, d).unwrap(),
            value,
        }
    }

    #[test]
    fn common_date_prefers_latest() {
        // Newest first, as the API returns them.
        let tens = vec![obs(15, 4.3), obs(14, 4.2), obs(13, 4.1)];
        let twos = vec![obs(14, 4.6), obs(13, 4.5)];
        let (date, ten, two) = latest_common_observation(&tens, &twos).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 14).unwrap());
        assert_eq!(ten, 4.2);
        assert_eq!(two, 4.6);
    }

    #[test]
    fn missing_leg_fails() {
        let tens = vec![obs(15, 4.3)];
        let twos = vec![obs(14, 4.6)];
        assert!(latest_common_observation(&tens, &twos).is_err());
    }

    #[test]
    fn parse_observations_skips_missing_markers() {
        let json = r#"{"observations":[
            {"date":"2024-03-15","value":"."},
            {"date":"2024-03-14","value":"3.45"}
        ]}"#;
        let parsed: ObservationsResponse = serde_json::from_str(json).unwrap();
        let defined: Vec<&RawObservation> =
            parsed.observations.iter().filter(|o| o.value != ".").collect();
        assert_eq!(defined.len(), 1);
        assert_eq!(defined[0].value, "3.45");
    }
}
