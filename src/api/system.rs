//! Health probe and audit log access.

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::validation::validate_page;
use super::{ApiError, ApiResponse, AppState};
use crate::domain::CurrentUser;
use crate::services::admin::LogPage;

const fn default_page() -> u64 {
    1
}

const fn default_page_size() -> u64 {
    50
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    pub level: Option<String>,
    pub event_type: Option<String>,
}

/// GET /health
///
/// Reports 503 while the database is unreachable.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = match state.store().ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check: database ping failed");
            false
        }
    };

    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ApiResponse::success(HealthResponse {
            status: if database { "ok" } else { "degraded" },
            database,
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds: state.start_time.elapsed().as_secs(),
        })),
    )
}

/// GET /system/logs
pub async fn get_logs(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<ApiResponse<LogPage>>, ApiError> {
    let (page, page_size) = validate_page(query.page, query.page_size)?;

    let level = query.level.filter(|l| !l.is_empty());
    let event_type = query.event_type.filter(|e| !e.is_empty());

    let logs = state
        .admin()
        .list_logs(&user, page, page_size, level, event_type)
        .await?;

    Ok(Json(ApiResponse::success(logs)))
}
