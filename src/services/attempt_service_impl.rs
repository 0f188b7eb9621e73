//! `SeaORM` implementation of the `AttemptService` trait.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use sea_orm::TransactionTrait;
use tracing::{error, info};

use crate::db::Store;
use crate::db::repositories::attempt::{AttemptOutcome, AttemptRepository, NewAttemptAnswer};
use crate::domain::{AttemptStatus, CurrentUser, MatchSide, QuestionType};
use crate::entities::test_attempts;
use crate::services::attempt_service::{
    AttemptError, AttemptPage, AttemptResult, AttemptService, AttemptSummary, QuestionResult,
    StartedAttempt, SubmittedAnswer,
};
use crate::services::catalog::{CatalogService, LanguageChain};
use crate::services::content::{self, LoadedQuestion, QuestionView};
use crate::services::quiz_service_impl::can_view;
use crate::services::scoring::{
    evaluate_choice, evaluate_matching, score_percent, text_matches,
};

pub struct SeaOrmAttemptService {
    store: Store,
    catalog: Arc<CatalogService>,
}

impl SeaOrmAttemptService {
    #[must_use]
    pub const fn new(store: Store, catalog: Arc<CatalogService>) -> Self {
        Self { store, catalog }
    }

    async fn owned_attempt(
        &self,
        user: &CurrentUser,
        attempt_id: i32,
        allow_admin: bool,
    ) -> Result<test_attempts::Model, AttemptError> {
        let attempt = self
            .store
            .attempts()
            .get(attempt_id)
            .await?
            .ok_or(AttemptError::AttemptNotFound)?;

        if attempt.user_id == user.id || (allow_admin && user.is_admin()) {
            Ok(attempt)
        } else {
            Err(AttemptError::AttemptNotFound)
        }
    }

    /// Chain for an explicit language code, or for the attempt's own language.
    async fn chain_for(
        &self,
        code: Option<&str>,
        attempt_language_id: i32,
    ) -> Result<LanguageChain, AttemptError> {
        if let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) {
            let language = self
                .catalog
                .resolve_language(Some(code))
                .await?
                .ok_or_else(|| AttemptError::LanguageNotFound(code.to_string()))?;
            return Ok(self.catalog.fallback_chain(&language).await?);
        }

        let default = self.catalog.default_language().await?.map(|l| l.id);
        Ok(LanguageChain {
            requested: attempt_language_id,
            default,
        })
    }

    async fn build_result(
        &self,
        attempt: test_attempts::Model,
        chain: &LanguageChain,
    ) -> Result<AttemptResult, AttemptError> {
        let rows = self.store.attempts().answers_for(attempt.id).await?;
        let mut submitted: HashMap<i32, (SubmittedAnswer, bool)> = rows
            .iter()
            .map(|row| (row.question_id, (SubmittedAnswer::from_row(row), row.is_correct)))
            .collect();

        let answered: HashSet<i32> = submitted.keys().copied().collect();
        let questions = content::load_questions(&self.store, attempt.test_id, false).await?;

        let results = questions
            .iter()
            .filter(|q| shown_in(attempt.started_at, q) || answered.contains(&q.question.id))
            .map(|q| {
                let (content, explanation) = q.content(chain);
                let (answer, is_correct) = submitted
                    .remove(&q.question.id)
                    .map_or((None, false), |(a, correct)| (Some(a), correct));

                QuestionResult {
                    question_id: q.question.id,
                    question_type: q.question_type,
                    content,
                    submitted: answer,
                    is_correct,
                    correct_answers: q.correct_answer_texts(chain),
                    explanation,
                }
            })
            .collect();

        Ok(AttemptResult {
            attempt: AttemptSummary::from(attempt),
            questions: results,
        })
    }
}

/// Renders a question for taking, with the right-hand matching items shuffled.
fn render_for_taking(question: &LoadedQuestion, chain: &LanguageChain) -> QuestionView {
    let mut view = QuestionView::render(question, chain, false);

    if question.question_type == QuestionType::Matching {
        let (lefts, mut rights): (Vec<_>, Vec<_>) = view
            .answers
            .into_iter()
            .partition(|a| a.match_side != Some(MatchSide::Right));
        rights.shuffle(&mut rand::rng());
        view.answers = lefts.into_iter().chain(rights).collect();
    }

    view
}

/// Whether the question was part of the set handed out when the attempt
/// started. Questions added later are neither answerable nor counted.
fn shown_in(started_at: DateTime<Utc>, question: &LoadedQuestion) -> bool {
    question.question.created_at <= started_at
        && (question.question.is_active || question.question.updated_at > started_at)
}

/// Scores one submission against its question.
fn grade(question: &LoadedQuestion, submitted: &SubmittedAnswer) -> NewAttemptAnswer {
    let keys = question.answer_keys();

    let (answer_id, text, payload, is_correct) = match question.question_type {
        QuestionType::MultipleChoice | QuestionType::TrueFalse => {
            let answer_id = submitted
                .answer_id
                .filter(|id| keys.iter().any(|k| k.id == *id));
            (answer_id, None, None, evaluate_choice(answer_id, &keys))
        }
        QuestionType::Text => {
            let text = submitted.text.clone().unwrap_or_default();
            let correct = text_matches(&text, question.accepted_texts());
            (None, Some(text), None, correct)
        }
        QuestionType::Matching => {
            let pairs = submitted.pairs.clone().unwrap_or_default();
            let correct = evaluate_matching(&pairs, &keys);
            (None, None, serde_json::to_string(&pairs).ok(), correct)
        }
    };

    NewAttemptAnswer {
        question_id: question.question.id,
        answer_id,
        user_answer_text: text,
        user_answer_payload: payload,
        is_correct,
    }
}

fn submit_failed(err: impl std::fmt::Display) -> AttemptError {
    error!(error = %err, "Failed to save attempt submission");
    AttemptError::SubmitFailed
}

fn as_count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[async_trait]
impl AttemptService for SeaOrmAttemptService {
    async fn start_attempt(
        &self,
        user: &CurrentUser,
        test_id: i32,
        language: Option<&str>,
    ) -> Result<StartedAttempt, AttemptError> {
        let quizzes = self.store.quizzes();
        let test = quizzes
            .get_test(test_id)
            .await?
            .filter(|t| can_view(user, t))
            .ok_or(AttemptError::TestNotFound)?;

        let language = self
            .catalog
            .resolve_language(language)
            .await?
            .ok_or_else(|| AttemptError::LanguageNotFound(language.unwrap_or_default().into()))?;
        let chain = self.catalog.fallback_chain(&language).await?;

        let questions = content::load_questions(&self.store, test.id, true).await?;
        if questions.is_empty() {
            return Err(AttemptError::NoQuestions);
        }

        let attempt = self
            .store
            .attempts()
            .create(test.id, user.id, language.id, as_count(questions.len()))
            .await?;

        let translations = quizzes.test_translations_for(&[test.id]).await?;
        let title = chain
            .pick(&translations, |t| t.language_id)
            .map(|t| t.title.clone())
            .unwrap_or_default();

        info!(
            attempt_id = attempt.id,
            test_id,
            user_id = user.id,
            "Attempt started"
        );

        Ok(StartedAttempt {
            attempt_id: attempt.id,
            test_id: test.id,
            title,
            language: language.code,
            started_at: attempt.started_at,
            questions: questions
                .iter()
                .map(|q| render_for_taking(q, &chain))
                .collect(),
        })
    }

    async fn submit_attempt(
        &self,
        user: &CurrentUser,
        attempt_id: i32,
        answers: Vec<SubmittedAnswer>,
    ) -> Result<AttemptResult, AttemptError> {
        let attempt = self.owned_attempt(user, attempt_id, false).await?;
        if attempt.status != AttemptStatus::InProgress.as_str() {
            return Err(AttemptError::AttemptFinished);
        }

        let questions = content::load_questions(&self.store, attempt.test_id, false).await?;
        let by_id: HashMap<i32, &LoadedQuestion> = questions
            .iter()
            .filter(|q| shown_in(attempt.started_at, q))
            .map(|q| (q.question.id, q))
            .collect();

        let mut seen = HashSet::with_capacity(answers.len());
        let mut graded = Vec::with_capacity(answers.len());
        for submitted in &answers {
            let question = by_id
                .get(&submitted.question_id)
                .ok_or(AttemptError::InvalidQuestion(submitted.question_id))?;
            if !seen.insert(submitted.question_id) {
                return Err(AttemptError::DuplicateAnswer(submitted.question_id));
            }
            graded.push(grade(question, submitted));
        }

        let total = usize::try_from(attempt.total_questions).unwrap_or_default();
        let correct = graded.iter().filter(|a| a.is_correct).count().min(total);
        let finished_at = Utc::now();
        let outcome = AttemptOutcome {
            score: score_percent(correct, total),
            correct_answers: as_count(correct),
            total_questions: as_count(total),
            finished_at,
            duration_seconds: i32::try_from(
                (finished_at - attempt.started_at).num_seconds().max(0),
            )
            .unwrap_or(i32::MAX),
        };

        let txn = self.store.conn.begin().await.map_err(submit_failed)?;
        let repo = AttemptRepository::new(&txn);
        repo.insert_answers(attempt.id, graded)
            .await
            .map_err(submit_failed)?;

        if !repo.finish(attempt.id, outcome).await.map_err(submit_failed)? {
            txn.rollback().await.map_err(submit_failed)?;
            return Err(AttemptError::AttemptFinished);
        }
        txn.commit().await.map_err(submit_failed)?;

        info!(
            attempt_id,
            user_id = user.id,
            score = outcome.score,
            correct,
            total,
            "Attempt submitted"
        );

        let finished = self
            .store
            .attempts()
            .get(attempt.id)
            .await?
            .ok_or(AttemptError::AttemptNotFound)?;
        let chain = self.chain_for(None, finished.language_id).await?;
        self.build_result(finished, &chain).await
    }

    async fn get_attempt_result(
        &self,
        user: &CurrentUser,
        attempt_id: i32,
        language: Option<&str>,
    ) -> Result<AttemptResult, AttemptError> {
        let attempt = self.owned_attempt(user, attempt_id, true).await?;
        let chain = self.chain_for(language, attempt.language_id).await?;
        self.build_result(attempt, &chain).await
    }

    async fn list_user_attempts(
        &self,
        user: &CurrentUser,
        page: u64,
        page_size: u64,
    ) -> Result<AttemptPage, AttemptError> {
        let (items, total) = self
            .store
            .attempts()
            .list_for_user(user.id, page, page_size)
            .await?;

        Ok(AttemptPage {
            items: items.into_iter().map(AttemptSummary::from).collect(),
            total,
            page,
            page_size,
        })
    }
}
