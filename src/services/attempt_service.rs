//! Taking tests: starting attempts, submitting answers and reading results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CurrentUser, QuestionType};
use crate::entities::{test_attempt_answers, test_attempts};
use crate::services::content::QuestionView;
use crate::services::scoring::MatchPair;

#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("Attempt not found")]
    AttemptNotFound,

    #[error("Attempt is already finished")]
    AttemptFinished,

    #[error("Test not found")]
    TestNotFound,

    #[error("Test has no active questions")]
    NoQuestions,

    #[error("Question {0} does not belong to this test")]
    InvalidQuestion(i32),

    #[error("Question {0} was answered more than once")]
    DuplicateAnswer(i32),

    #[error("Unknown language: {0}")]
    LanguageNotFound(String),

    #[error("Failed to save the submission")]
    SubmitFailed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AttemptError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::AttemptNotFound => "ATTEMPT_NOT_FOUND",
            Self::AttemptFinished => "ATTEMPT_FINISHED",
            Self::TestNotFound => "TEST_NOT_FOUND",
            Self::NoQuestions => "NO_QUESTIONS",
            Self::InvalidQuestion(_) => "INVALID_QUESTION",
            Self::DuplicateAnswer(_) => "DUPLICATE_ANSWER",
            Self::LanguageNotFound(_) => "LANGUAGE_NOT_FOUND",
            Self::SubmitFailed => "SUBMIT_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<sea_orm::DbErr> for AttemptError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for AttemptError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// One answer as sent by the client. Which field is read depends on the
/// question type: `answer_id` for choice questions, `text` for text
/// questions, `pairs` for matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairs: Option<Vec<MatchPair>>,
}

impl SubmittedAnswer {
    /// Rebuilds the submission from a stored answer row.
    #[must_use]
    pub fn from_row(row: &test_attempt_answers::Model) -> Self {
        Self {
            question_id: row.question_id,
            answer_id: row.answer_id,
            text: row.user_answer_text.clone(),
            pairs: row
                .user_answer_payload
                .as_deref()
                .and_then(|payload| serde_json::from_str(payload).ok()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptSummary {
    pub id: i32,
    pub test_id: i32,
    pub status: String,
    pub score: f64,
    pub correct_answers: i32,
    pub total_questions: i32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i32>,
}

impl From<test_attempts::Model> for AttemptSummary {
    fn from(model: test_attempts::Model) -> Self {
        Self {
            id: model.id,
            test_id: model.test_id,
            status: model.status,
            score: model.score,
            correct_answers: model.correct_answers,
            total_questions: model.total_questions,
            started_at: model.started_at,
            finished_at: model.finished_at,
            duration_seconds: model.duration_seconds,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StartedAttempt {
    pub attempt_id: i32,
    pub test_id: i32,
    pub title: String,
    pub language: String,
    pub started_at: DateTime<Utc>,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionResult {
    pub question_id: i32,
    pub question_type: QuestionType,
    pub content: String,
    pub submitted: Option<SubmittedAnswer>,
    pub is_correct: bool,
    pub correct_answers: Vec<String>,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptResult {
    #[serde(flatten)]
    pub attempt: AttemptSummary,
    pub questions: Vec<QuestionResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptPage {
    pub items: Vec<AttemptSummary>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

#[async_trait::async_trait]
pub trait AttemptService: Send + Sync {
    /// Opens an attempt on a visible test. Questions come back without
    /// correctness data and with matching right-hand items shuffled.
    async fn start_attempt(
        &self,
        user: &CurrentUser,
        test_id: i32,
        language: Option<&str>,
    ) -> Result<StartedAttempt, AttemptError>;

    /// Scores and finalizes an attempt. Only the first submit succeeds.
    ///
    /// # Errors
    ///
    /// [`AttemptError::AttemptFinished`] when the attempt was already
    /// submitted, including by a concurrent caller.
    async fn submit_attempt(
        &self,
        user: &CurrentUser,
        attempt_id: i32,
        answers: Vec<SubmittedAnswer>,
    ) -> Result<AttemptResult, AttemptError>;

    async fn get_attempt_result(
        &self,
        user: &CurrentUser,
        attempt_id: i32,
        language: Option<&str>,
    ) -> Result<AttemptResult, AttemptError>;

    async fn list_user_attempts(
        &self,
        user: &CurrentUser,
        page: u64,
        page_size: u64,
    ) -> Result<AttemptPage, AttemptError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submitted_answer_from_row_restores_pairs() {
        let row = test_attempt_answers::Model {
            id: 1,
            attempt_id: 1,
            question_id: 7,
            answer_id: None,
            user_answer_text: None,
            user_answer_payload: Some(r#"[{"left_id":1,"right_id":3}]"#.to_string()),
            is_correct: true,
            created_at: Utc::now(),
        };

        let submitted = SubmittedAnswer::from_row(&row);
        assert_eq!(submitted.question_id, 7);
        assert_eq!(
            submitted.pairs,
            Some(vec![MatchPair {
                left_id: 1,
                right_id: 3
            }])
        );
    }

    #[test]
    fn test_submitted_answer_ignores_missing_fields() {
        let parsed: SubmittedAnswer =
            serde_json::from_str(r#"{"question_id": 4, "text": "Paris"}"#).unwrap();
        assert_eq!(parsed.answer_id, None);
        assert_eq!(parsed.text.as_deref(), Some("Paris"));
        assert!(parsed.pairs.is_none());
    }
}
