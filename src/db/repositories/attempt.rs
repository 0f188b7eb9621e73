use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, sea_query::Expr,
};

use crate::domain::AttemptStatus;
use crate::entities::{prelude::*, test_attempt_answers, test_attempts};

pub struct NewAttemptAnswer {
    pub question_id: i32,
    pub answer_id: Option<i32>,
    pub user_answer_text: Option<String>,
    pub user_answer_payload: Option<String>,
    pub is_correct: bool,
}

/// Final figures written when an attempt is submitted.
#[derive(Debug, Clone, Copy)]
pub struct AttemptOutcome {
    pub score: f64,
    pub correct_answers: i32,
    pub total_questions: i32,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: i32,
}

pub struct AttemptRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> AttemptRepository<'a, C> {
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        test_id: i32,
        user_id: i32,
        language_id: i32,
        total_questions: i32,
    ) -> Result<test_attempts::Model> {
        let active = test_attempts::ActiveModel {
            test_id: Set(test_id),
            user_id: Set(user_id),
            language_id: Set(language_id),
            status: Set(AttemptStatus::InProgress.as_str().to_string()),
            score: Set(0.0),
            correct_answers: Set(0),
            total_questions: Set(total_questions),
            started_at: Set(Utc::now()),
            finished_at: Set(None),
            duration_seconds: Set(None),
            ..Default::default()
        };

        active
            .insert(self.db)
            .await
            .context("Failed to insert test attempt")
    }

    pub async fn get(&self, id: i32) -> Result<Option<test_attempts::Model>> {
        Ok(TestAttempts::find_by_id(id).one(self.db).await?)
    }

    /// Moves an in-progress attempt to finished. Returns false if the attempt
    /// was already finished by another caller.
    pub async fn finish(&self, id: i32, outcome: AttemptOutcome) -> Result<bool> {
        let result = TestAttempts::update_many()
            .col_expr(
                test_attempts::Column::Status,
                Expr::value(AttemptStatus::Finished.as_str()),
            )
            .col_expr(test_attempts::Column::Score, Expr::value(outcome.score))
            .col_expr(
                test_attempts::Column::CorrectAnswers,
                Expr::value(outcome.correct_answers),
            )
            .col_expr(
                test_attempts::Column::TotalQuestions,
                Expr::value(outcome.total_questions),
            )
            .col_expr(
                test_attempts::Column::FinishedAt,
                Expr::value(outcome.finished_at),
            )
            .col_expr(
                test_attempts::Column::DurationSeconds,
                Expr::value(outcome.duration_seconds),
            )
            .filter(test_attempts::Column::Id.eq(id))
            .filter(test_attempts::Column::Status.eq(AttemptStatus::InProgress.as_str()))
            .exec(self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    pub async fn insert_answers(&self, attempt_id: i32, answers: Vec<NewAttemptAnswer>) -> Result<()> {
        if answers.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let rows = answers.into_iter().map(|a| test_attempt_answers::ActiveModel {
            attempt_id: Set(attempt_id),
            question_id: Set(a.question_id),
            answer_id: Set(a.answer_id),
            user_answer_text: Set(a.user_answer_text),
            user_answer_payload: Set(a.user_answer_payload),
            is_correct: Set(a.is_correct),
            created_at: Set(now),
            ..Default::default()
        });

        TestAttemptAnswers::insert_many(rows)
            .exec(self.db)
            .await
            .context("Failed to insert attempt answers")?;

        Ok(())
    }

    pub async fn answers_for(&self, attempt_id: i32) -> Result<Vec<test_attempt_answers::Model>> {
        Ok(TestAttemptAnswers::find()
            .filter(test_attempt_answers::Column::AttemptId.eq(attempt_id))
            .order_by_asc(test_attempt_answers::Column::Id)
            .all(self.db)
            .await?)
    }

    pub async fn has_finished(&self, user_id: i32, test_id: i32) -> Result<bool> {
        let count = TestAttempts::find()
            .filter(test_attempts::Column::UserId.eq(user_id))
            .filter(test_attempts::Column::TestId.eq(test_id))
            .filter(test_attempts::Column::Status.eq(AttemptStatus::Finished.as_str()))
            .count(self.db)
            .await?;
        Ok(count > 0)
    }

    pub async fn list_for_user(
        &self,
        user_id: i32,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<test_attempts::Model>, u64)> {
        let paginator = TestAttempts::find()
            .filter(test_attempts::Column::UserId.eq(user_id))
            .order_by_desc(test_attempts::Column::StartedAt)
            .order_by_desc(test_attempts::Column::Id)
            .paginate(self.db, page_size);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, total))
    }
}
