//! AI quiz generation and answer explanations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CurrentUser, QuestionType};
use crate::entities::ai_requests;
use crate::services::quiz_service::{QuizError, TestSummary};

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI features are disabled")]
    Disabled,

    #[error("Daily AI request limit of {limit} reached")]
    DailyLimit { limit: u32 },

    #[error("AI provider error: {0}")]
    ProviderError(String),

    #[error("AI returned an unusable response: {0}")]
    InvalidResponse(String),

    #[error("Question not found")]
    QuestionNotFound,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Quiz(#[from] QuizError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AiError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Disabled => "AI_DISABLED",
            Self::DailyLimit { .. } => "AI_DAILY_LIMIT",
            Self::ProviderError(_) => "AI_PROVIDER_ERROR",
            Self::InvalidResponse(_) => "AI_INVALID_RESPONSE",
            Self::QuestionNotFound => "QUESTION_NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Quiz(err) => err.code(),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<sea_orm::DbErr> for AiError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for AiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizDraftRequest {
    pub topic: String,
    pub language: String,
    pub question_count: usize,
    pub category_id: i32,
    pub difficulty_id: i32,
    /// Empty means every type is allowed.
    #[serde(default)]
    pub question_types: Vec<QuestionType>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizDraftResult {
    pub request_id: i32,
    pub test: TestSummary,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    pub question_id: i32,
    pub explanation: String,
    /// Set when the text was built locally instead of by the model.
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AiRequestPage {
    pub items: Vec<ai_requests::Model>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

#[async_trait::async_trait]
pub trait AiService: Send + Sync {
    /// Asks the model for a quiz and stores it as a private AI-sourced test.
    /// Every call is recorded as an AI request row.
    async fn generate_quiz_draft(
        &self,
        user: &CurrentUser,
        request: QuizDraftRequest,
    ) -> Result<QuizDraftResult, AiError>;

    /// Explains the correct answer to a question. Falls back to listing the
    /// correct answers whenever the model cannot be used.
    async fn explain_answer(
        &self,
        user: &CurrentUser,
        question_id: i32,
        language: Option<&str>,
    ) -> Result<Explanation, AiError>;

    /// Own requests, or every request for admins.
    async fn list_ai_requests(
        &self,
        user: &CurrentUser,
        page: u64,
        page_size: u64,
    ) -> Result<AiRequestPage, AiError>;
}

/// Text used when no model explanation is available.
#[must_use]
pub fn fallback_explanation(correct_answers: &[String]) -> String {
    format!("The correct answer is: {}.", correct_answers.join(", "))
}

/// Price of a call given per-1k-token rates.
#[must_use]
pub fn estimate_cost(
    prompt_tokens: u32,
    completion_tokens: u32,
    prompt_per_1k: f64,
    completion_per_1k: f64,
) -> f64 {
    f64::from(prompt_tokens) / 1000.0 * prompt_per_1k
        + f64::from(completion_tokens) / 1000.0 * completion_per_1k
}
