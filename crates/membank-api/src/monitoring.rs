//! Read-only monitoring endpoints.

use crate::server::AppState;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

/// Alerts returned when the caller does not ask for a limit.
const DEFAULT_ALERT_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    pub limit: Option<usize>,
}

/// GET /api/monitoring/metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.membank.monitor().summary())
}

/// GET /api/monitoring/alerts?limit=N (newest first)
pub async fn alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_ALERT_LIMIT);
    Json(state.membank.monitor().recent_alerts(limit))
}

/// GET /api/monitoring/dashboard
pub async fn dashboard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.membank.monitor().dashboard())
}
