//! AI-assisted authoring and answer explanations.

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

use super::validation::{validate_id, validate_page};
use super::{ApiError, ApiResponse, AppState, PageQuery};
use crate::domain::CurrentUser;
use crate::services::ai_service::{AiRequestPage, Explanation, QuizDraftRequest};

#[derive(Debug, Deserialize)]
pub struct ExplanationRequest {
    pub question_id: i32,
    #[serde(default)]
    pub language: Option<String>,
}

/// POST /ai/quiz-drafts
pub async fn create_quiz_draft(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<QuizDraftRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = state.ai().generate_quiz_draft(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(draft))))
}

/// POST /ai/explanations
pub async fn explain_answer(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<ExplanationRequest>,
) -> Result<Json<ApiResponse<Explanation>>, ApiError> {
    let question_id = validate_id(payload.question_id, "question")?;

    let explanation = state
        .ai()
        .explain_answer(&user, question_id, payload.language.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(explanation)))
}

/// GET /ai/requests
pub async fn list_requests(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<AiRequestPage>>, ApiError> {
    let (page, page_size) = validate_page(query.page, query.page_size)?;
    let requests = state.ai().list_ai_requests(&user, page, page_size).await?;
    Ok(Json(ApiResponse::success(requests)))
}
