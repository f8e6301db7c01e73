use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use pxi_core::RegimeRow;
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState};

const MAX_REGIME_HISTORY_DAYS: i64 = 365;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/pxi/regime/latest", get(get_latest_regime))
        .route("/v1/pxi/regime/history", get(get_regime_history))
}

#[derive(Serialize)]
struct RegimePayload {
    date: NaiveDate,
    regime: String,
    cluster_id: i64,
    probabilities: Vec<f64>,
}

impl From<RegimeRow> for RegimePayload {
    fn from(row: RegimeRow) -> Self {
        RegimePayload {
            date: row.date,
            regime: row.regime.as_str().to_string(),
            cluster_id: row.cluster_id,
            probabilities: row.probabilities,
        }
    }
}

async fn get_latest_regime(
    State(state): State<AppState>,
) -> Result<Json<crate::ApiResponse<RegimePayload>>, AppError> {
    let row = state
        .store
        .latest_regime()
        .await?
        .ok_or_else(|| AppError::Unavailable("No regime has been detected yet".to_string()))?;
    Ok(Json(crate::ApiResponse::ok(row.into())))
}

#[derive(Deserialize)]
struct DaysQuery {
    days: Option<i64>,
}

async fn get_regime_history(
    State(state): State<AppState>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<crate::ApiResponse<Vec<RegimePayload>>>, AppError> {
    let days = query.days.unwrap_or(90);
    if !(1..=MAX_REGIME_HISTORY_DAYS).contains(&days) {
        return Err(AppError::BadRequest(format!(
            "days must be between 1 and {}",
            MAX_REGIME_HISTORY_DAYS
        )));
    }

    let rows = state
        .store
        .fetch_regime_history(days)
        .await?
        .into_iter()
        .map(RegimePayload::from)
        .collect();
    Ok(Json(crate::ApiResponse::ok(rows)))
}
