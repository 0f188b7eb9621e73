//! Reference data: languages, categories and difficulty levels.

use axum::{Json, extract::State};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::entities::{categories, difficulties, languages};

/// GET /languages
pub async fn list_languages(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<languages::Model>>>, ApiError> {
    let languages = state.catalog().languages().await?;
    Ok(Json(ApiResponse::success(languages)))
}

/// GET /categories
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<categories::Model>>>, ApiError> {
    let categories = state.catalog().categories().await?;
    Ok(Json(ApiResponse::success(categories)))
}

/// GET /difficulties
pub async fn list_difficulties(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<difficulties::Model>>>, ApiError> {
    let difficulties = state.catalog().difficulties().await?;
    Ok(Json(ApiResponse::success(difficulties)))
}
