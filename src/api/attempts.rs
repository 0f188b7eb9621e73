use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

use super::validation::{validate_id, validate_page};
use super::{ApiError, ApiResponse, AppState, LanguageQuery, PageQuery};
use crate::domain::CurrentUser;
use crate::services::attempt_service::{AttemptPage, AttemptResult, SubmittedAnswer};

#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    pub answers: Vec<SubmittedAnswer>,
}

/// POST /tests/{id}/attempts
pub async fn start_attempt(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(test_id): Path<i32>,
    Query(query): Query<LanguageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let test_id = validate_id(test_id, "test")?;

    let attempt = state
        .attempts()
        .start_attempt(&user, test_id, query.code())
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(attempt))))
}

/// POST /attempts/{id}/submit
pub async fn submit_attempt(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(attempt_id): Path<i32>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<Json<ApiResponse<AttemptResult>>, ApiError> {
    let attempt_id = validate_id(attempt_id, "attempt")?;

    let result = state
        .attempts()
        .submit_attempt(&user, attempt_id, payload.answers)
        .await?;

    Ok(Json(ApiResponse::success(result)))
}

/// GET /attempts/{id}
pub async fn get_attempt(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(attempt_id): Path<i32>,
    Query(query): Query<LanguageQuery>,
) -> Result<Json<ApiResponse<AttemptResult>>, ApiError> {
    let attempt_id = validate_id(attempt_id, "attempt")?;

    let result = state
        .attempts()
        .get_attempt_result(&user, attempt_id, query.code())
        .await?;

    Ok(Json(ApiResponse::success(result)))
}

/// GET /attempts
pub async fn list_attempts(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<AttemptPage>>, ApiError> {
    let (page, page_size) = validate_page(query.page, query.page_size)?;

    let attempts = state
        .attempts()
        .list_user_attempts(&user, page, page_size)
        .await?;

    Ok(Json(ApiResponse::success(attempts)))
}
