use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::validation::{validate_id, validate_page};
use super::{ApiError, ApiResponse, AppState, CountResponse, default_page, default_page_size};
use crate::domain::CurrentUser;
use crate::services::admin::UserPage;
use crate::services::{BulkSummary, TestAction, UserAction};

#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkUsersRequest {
    pub user_ids: Vec<i32>,
    pub action: UserAction,
}

#[derive(Debug, Deserialize)]
pub struct BulkTestsRequest {
    pub test_ids: Vec<i32>,
    pub action: TestAction,
}

#[derive(Debug, Default, Deserialize)]
pub struct CleanupQuery {
    #[serde(default)]
    pub retention_days: Option<i64>,
}

/// GET /admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<UsersQuery>,
) -> Result<Json<ApiResponse<UserPage>>, ApiError> {
    let (page, page_size) = validate_page(query.page, query.page_size)?;
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let users = state
        .admin()
        .list_users(&user, page, page_size, search)
        .await?;

    Ok(Json(ApiResponse::success(users)))
}

/// POST /admin/users/bulk
pub async fn bulk_users(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<BulkUsersRequest>,
) -> Result<Json<ApiResponse<BulkSummary>>, ApiError> {
    let summary = state
        .admin()
        .bulk_user_action(&user, &payload.user_ids, payload.action)
        .await?;

    Ok(Json(ApiResponse::success(summary)))
}

/// POST /admin/tests/bulk
pub async fn bulk_tests(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<BulkTestsRequest>,
) -> Result<Json<ApiResponse<BulkSummary>>, ApiError> {
    let summary = state
        .admin()
        .bulk_test_action(&user, &payload.test_ids, payload.action)
        .await?;

    Ok(Json(ApiResponse::success(summary)))
}

/// POST /admin/tokens/cleanup?retention_days=N
pub async fn cleanup_tokens(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<CleanupQuery>,
) -> Result<Json<ApiResponse<CountResponse>>, ApiError> {
    let count = state
        .admin()
        .cleanup_tokens(&user, query.retention_days)
        .await?;

    Ok(Json(ApiResponse::success(CountResponse { count })))
}

/// POST /admin/users/{id}/revoke-tokens
pub async fn revoke_user_tokens(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<CountResponse>>, ApiError> {
    let id = validate_id(id, "user")?;
    let count = state.admin().revoke_user_tokens(&user, id).await?;
    Ok(Json(ApiResponse::success(CountResponse { count })))
}
