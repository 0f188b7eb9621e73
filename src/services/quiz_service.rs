//! Domain service for authoring and browsing tests.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CurrentUser, MatchSide, QuestionType, TestSource};
use crate::services::content::QuestionView;

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("You do not have permission to do this")]
    Forbidden,

    #[error("Test not found")]
    TestNotFound,

    #[error("Question not found")]
    QuestionNotFound,

    #[error("Answer not found")]
    AnswerNotFound,

    #[error("Unknown language: {0}")]
    LanguageNotFound(String),

    #[error("A valid category is required")]
    CategoryRequired,

    #[error("A valid difficulty is required")]
    DifficultyRequired,

    #[error("Translation for language '{0}' already exists")]
    TranslationExists(String),

    #[error("Invalid answers: {0}")]
    InvalidAnswers(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QuizError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Forbidden => "FORBIDDEN",
            Self::TestNotFound => "TEST_NOT_FOUND",
            Self::QuestionNotFound => "QUESTION_NOT_FOUND",
            Self::AnswerNotFound => "ANSWER_NOT_FOUND",
            Self::LanguageNotFound(_) => "LANGUAGE_NOT_FOUND",
            Self::CategoryRequired => "CATEGORY_REQUIRED",
            Self::DifficultyRequired => "DIFFICULTY_REQUIRED",
            Self::TranslationExists(_) => "TRANSLATION_EXISTS",
            Self::InvalidAnswers(_) => "INVALID_ANSWERS",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<sea_orm::DbErr> for QuizError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for QuizError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

// ========== Inputs ==========

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TestTranslationInput {
    pub language: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuestionTranslationInput {
    pub language: String,
    pub content: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnswerTranslationInput {
    pub language: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnswerInput {
    #[serde(default)]
    pub is_correct: bool,
    #[serde(default)]
    pub match_side: Option<MatchSide>,
    #[serde(default)]
    pub match_group: Option<i32>,
    pub translations: Vec<AnswerTranslationInput>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuestionInput {
    pub question_type: QuestionType,
    pub translations: Vec<QuestionTranslationInput>,
    pub answers: Vec<AnswerInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTestInput {
    #[serde(default)]
    pub category_id: Option<i32>,
    #[serde(default)]
    pub difficulty_id: Option<i32>,
    #[serde(default)]
    pub is_public: bool,
    pub translations: Vec<TestTranslationInput>,
    #[serde(default)]
    pub questions: Vec<QuestionInput>,
    #[serde(skip)]
    pub source: Option<TestSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTestInput {
    pub category_id: Option<i32>,
    pub difficulty_id: Option<i32>,
    pub is_public: Option<bool>,
}

// ========== Outputs ==========

#[derive(Debug, Clone, Serialize)]
pub struct TestSummary {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub category_id: i32,
    pub difficulty_id: i32,
    pub is_public: bool,
    pub source: String,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestDetail {
    #[serde(flatten)]
    pub summary: TestSummary,
    pub language: String,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestPage {
    pub items: Vec<TestSummary>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

/// Domain service trait for test authoring and browsing.
#[async_trait::async_trait]
pub trait QuizService: Send + Sync {
    /// Public tests plus, for authors, their own.
    async fn list_tests(
        &self,
        viewer: &CurrentUser,
        language: Option<&str>,
        category_id: Option<i32>,
        page: u64,
        page_size: u64,
    ) -> Result<TestPage, QuizError>;

    /// Full test with questions. Answer keys are only revealed to the owner
    /// and admins, and only when `include_answers` is set.
    async fn get_test(
        &self,
        viewer: &CurrentUser,
        test_id: i32,
        language: Option<&str>,
        include_answers: bool,
    ) -> Result<TestDetail, QuizError>;

    /// Creates a test, its translations and any questions in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::CategoryRequired`] or [`QuizError::DifficultyRequired`]
    /// when the references are missing or unknown.
    async fn create_test(
        &self,
        creator: &CurrentUser,
        input: CreateTestInput,
    ) -> Result<TestSummary, QuizError>;

    async fn update_test(
        &self,
        user: &CurrentUser,
        test_id: i32,
        input: UpdateTestInput,
    ) -> Result<TestSummary, QuizError>;

    async fn delete_test(&self, user: &CurrentUser, test_id: i32) -> Result<(), QuizError>;

    async fn upsert_test_translation(
        &self,
        user: &CurrentUser,
        test_id: i32,
        language: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<(), QuizError>;

    /// Appends a question to the end of a test.
    async fn add_question(
        &self,
        user: &CurrentUser,
        test_id: i32,
        input: QuestionInput,
    ) -> Result<QuestionView, QuizError>;

    async fn delete_question(&self, user: &CurrentUser, question_id: i32)
    -> Result<(), QuizError>;

    async fn upsert_question_translation(
        &self,
        user: &CurrentUser,
        question_id: i32,
        language: &str,
        content: &str,
        explanation: Option<&str>,
    ) -> Result<(), QuizError>;

    async fn upsert_answer_translation(
        &self,
        user: &CurrentUser,
        answer_id: i32,
        language: &str,
        content: &str,
    ) -> Result<(), QuizError>;
}

/// Checks that a question's answers form a usable set for its type.
pub fn validate_answer_set(
    question_type: QuestionType,
    answers: &[AnswerInput],
) -> Result<(), QuizError> {
    let invalid = |msg: &str| Err(QuizError::InvalidAnswers(msg.to_string()));

    if answers.iter().any(|a| {
        a.translations.is_empty() || a.translations.iter().any(|t| t.content.trim().is_empty())
    }) {
        return invalid("every answer needs non-empty content");
    }

    let correct = answers.iter().filter(|a| a.is_correct).count();

    match question_type {
        QuestionType::MultipleChoice => {
            if answers.len() < 2 {
                return invalid("multiple choice questions need at least 2 answers");
            }
            if correct == 0 {
                return invalid("multiple choice questions need a correct answer");
            }
        }
        QuestionType::TrueFalse => {
            if answers.len() != 2 || correct != 1 {
                return invalid("true/false questions need exactly 2 answers, 1 correct");
            }
        }
        QuestionType::Text => {
            if answers.is_empty() {
                return invalid("text questions need at least 1 accepted answer");
            }
        }
        QuestionType::Matching => {
            let mut groups: BTreeMap<i32, (usize, usize)> = BTreeMap::new();
            for answer in answers {
                let (Some(side), Some(group)) = (answer.match_side, answer.match_group) else {
                    return invalid("matching answers need a side and a group");
                };
                let counts = groups.entry(group).or_default();
                match side {
                    MatchSide::Left => counts.0 += 1,
                    MatchSide::Right => counts.1 += 1,
                }
            }

            if groups.len() < 2 {
                return invalid("matching questions need at least 2 pairs");
            }
            if groups.values().any(|&counts| counts != (1, 1)) {
                return invalid("each matching group needs exactly one left and one right item");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(is_correct: bool) -> AnswerInput {
        AnswerInput {
            is_correct,
            match_side: None,
            match_group: None,
            translations: vec![AnswerTranslationInput {
                language: "en".to_string(),
                content: "x".to_string(),
            }],
        }
    }

    fn matched(side: MatchSide, group: i32) -> AnswerInput {
        AnswerInput {
            match_side: Some(side),
            match_group: Some(group),
            ..answer(true)
        }
    }

    #[test]
    fn test_multiple_choice_rules() {
        let ok = [answer(true), answer(false), answer(true)];
        assert!(validate_answer_set(QuestionType::MultipleChoice, &ok).is_ok());

        let none_correct = [answer(false), answer(false)];
        assert!(validate_answer_set(QuestionType::MultipleChoice, &none_correct).is_err());
        assert!(validate_answer_set(QuestionType::MultipleChoice, &[answer(true)]).is_err());
    }

    #[test]
    fn test_true_false_rules() {
        assert!(validate_answer_set(QuestionType::TrueFalse, &[answer(true), answer(false)]).is_ok());
        assert!(validate_answer_set(QuestionType::TrueFalse, &[answer(true), answer(true)]).is_err());
        assert!(
            validate_answer_set(
                QuestionType::TrueFalse,
                &[answer(true), answer(false), answer(false)]
            )
            .is_err()
        );
    }

    #[test]
    fn test_text_rules() {
        assert!(validate_answer_set(QuestionType::Text, &[answer(true)]).is_ok());
        assert!(validate_answer_set(QuestionType::Text, &[]).is_err());

        let mut blank = answer(true);
        blank.translations[0].content = "  ".to_string();
        assert!(validate_answer_set(QuestionType::Text, &[blank]).is_err());
    }

    #[test]
    fn test_matching_rules() {
        let ok = [
            matched(MatchSide::Left, 1),
            matched(MatchSide::Right, 1),
            matched(MatchSide::Left, 2),
            matched(MatchSide::Right, 2),
        ];
        assert!(validate_answer_set(QuestionType::Matching, &ok).is_ok());

        let one_pair = [matched(MatchSide::Left, 1), matched(MatchSide::Right, 1)];
        assert!(validate_answer_set(QuestionType::Matching, &one_pair).is_err());

        let lopsided = [
            matched(MatchSide::Left, 1),
            matched(MatchSide::Left, 1),
            matched(MatchSide::Left, 2),
            matched(MatchSide::Right, 2),
        ];
        assert!(validate_answer_set(QuestionType::Matching, &lopsided).is_err());

        let missing_side = [answer(true), matched(MatchSide::Right, 1)];
        assert!(validate_answer_set(QuestionType::Matching, &missing_side).is_err());
    }
}
