use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use pxi_store::StoredAlert;

use crate::{AppError, AppState};

/// Alert visibility window for the dashboard.
const ALERT_WINDOW_DAYS: i64 = 7;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/pxi/alerts", get(get_alerts))
}

async fn get_alerts(
    State(state): State<AppState>,
) -> Result<Json<crate::ApiResponse<Vec<StoredAlert>>>, AppError> {
    let alerts = state
        .store
        .fetch_unacknowledged_alerts(ALERT_WINDOW_DAYS)
        .await?;
    Ok(Json(crate::ApiResponse::ok(alerts)))
}
