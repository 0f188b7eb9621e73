use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

use super::validation::{validate_id, validate_language_code, validate_page, validate_required};
use super::{ApiError, ApiResponse, AppState, MessageResponse, default_page, default_page_size};
use crate::domain::CurrentUser;
use crate::services::content::QuestionView;
use crate::services::quiz_service::{
    CreateTestInput, QuestionInput, TestDetail, TestPage, TestSummary, UpdateTestInput,
};

#[derive(Debug, Deserialize)]
pub struct ListTestsQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    pub lang: Option<String>,
    pub category_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct GetTestQuery {
    pub lang: Option<String>,
    #[serde(default)]
    pub include_answers: bool,
}

#[derive(Debug, Deserialize)]
pub struct TestTranslationBody {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionTranslationBody {
    pub content: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerTranslationBody {
    pub content: String,
}

/// GET /tests
pub async fn list_tests(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ListTestsQuery>,
) -> Result<Json<ApiResponse<TestPage>>, ApiError> {
    let (page, page_size) = validate_page(query.page, query.page_size)?;

    let tests = state
        .quizzes()
        .list_tests(&user, query.lang.as_deref(), query.category_id, page, page_size)
        .await?;

    Ok(Json(ApiResponse::success(tests)))
}

/// GET /tests/{id}
pub async fn get_test(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Query(query): Query<GetTestQuery>,
) -> Result<Json<ApiResponse<TestDetail>>, ApiError> {
    let id = validate_id(id, "test")?;

    let test = state
        .quizzes()
        .get_test(&user, id, query.lang.as_deref(), query.include_answers)
        .await?;

    Ok(Json(ApiResponse::success(test)))
}

/// POST /tests
pub async fn create_test(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateTestInput>,
) -> Result<impl IntoResponse, ApiError> {
    let test = state.quizzes().create_test(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(test))))
}

/// PUT /tests/{id}
pub async fn update_test(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateTestInput>,
) -> Result<Json<ApiResponse<TestSummary>>, ApiError> {
    let id = validate_id(id, "test")?;
    let test = state.quizzes().update_test(&user, id, payload).await?;
    Ok(Json(ApiResponse::success(test)))
}

/// DELETE /tests/{id}
pub async fn delete_test(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let id = validate_id(id, "test")?;
    state.quizzes().delete_test(&user, id).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new("Test deleted"))))
}

/// PUT /tests/{id}/translations/{lang}
pub async fn upsert_test_translation(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path((id, lang)): Path<(i32, String)>,
    Json(payload): Json<TestTranslationBody>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let id = validate_id(id, "test")?;
    let lang = validate_language_code(&lang)?;
    let title = validate_required(&payload.title, "Title")?;

    state
        .quizzes()
        .upsert_test_translation(&user, id, lang, title, payload.description.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Translation saved",
    ))))
}

/// POST /tests/{id}/questions
pub async fn add_question(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<QuestionInput>,
) -> Result<impl IntoResponse, ApiError> {
    let id = validate_id(id, "test")?;
    let question: QuestionView = state.quizzes().add_question(&user, id, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(question))))
}

/// DELETE /questions/{id}
pub async fn delete_question(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let id = validate_id(id, "question")?;
    state.quizzes().delete_question(&user, id).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Question deleted",
    ))))
}

/// PUT /questions/{id}/translations/{lang}
pub async fn upsert_question_translation(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path((id, lang)): Path<(i32, String)>,
    Json(payload): Json<QuestionTranslationBody>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let id = validate_id(id, "question")?;
    let lang = validate_language_code(&lang)?;
    let content = validate_required(&payload.content, "Content")?;

    state
        .quizzes()
        .upsert_question_translation(&user, id, lang, content, payload.explanation.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Translation saved",
    ))))
}

/// PUT /answers/{id}/translations/{lang}
pub async fn upsert_answer_translation(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path((id, lang)): Path<(i32, String)>,
    Json(payload): Json<AnswerTranslationBody>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let id = validate_id(id, "answer")?;
    let lang = validate_language_code(&lang)?;
    let content = validate_required(&payload.content, "Content")?;

    state
        .quizzes()
        .upsert_answer_translation(&user, id, lang, content)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Translation saved",
    ))))
}
