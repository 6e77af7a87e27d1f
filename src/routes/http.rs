// GET handlers: version, realtime rate, hourly series, daily + since-start stats

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::AppState;
use crate::daily_store::StoreError;
use crate::models::{HourlyStats, RateSample, TrafficStats};

/// Package name and version (from Cargo.toml at build time).
const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// GET /version
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/network/realtime: latest smoothed rate; no I/O.
pub(super) async fn realtime_handler(State(state): State<AppState>) -> Json<RateSample> {
    Json(state.monitor.realtime_rate().await)
}

/// GET /api/network/hourly: trailing hour, oldest point first.
pub(super) async fn hourly_handler(State(state): State<AppState>) -> Json<HourlyStats> {
    Json(state.monitor.hourly_stats().await)
}

/// GET /api/network/daily: up to 7 days of rollups plus since-start totals.
pub(super) async fn daily_handler(
    State(state): State<AppState>,
) -> Result<Json<TrafficStats>, ApiError> {
    Ok(Json(state.monitor.stats().await?))
}

/// Store failures are reported to the requester, never papered over.
pub(super) struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self.0, operation = "get_stats", "stats query failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}
