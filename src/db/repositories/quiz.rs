use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::domain::{MatchSide, QuestionType, TestSource};
use crate::entities::{
    answer_translations, answers, prelude::*, question_translations, questions, test_translations,
    tests,
};

pub struct NewTest {
    pub category_id: i32,
    pub difficulty_id: i32,
    pub created_by: Option<i32>,
    pub is_public: bool,
    pub source: TestSource,
}

#[derive(Debug, Default, Clone)]
pub struct TestUpdate {
    pub category_id: Option<i32>,
    pub difficulty_id: Option<i32>,
    pub is_public: Option<bool>,
}

pub struct NewQuestion {
    pub test_id: i32,
    pub category_id: i32,
    pub question_type: QuestionType,
    pub position: i32,
}

pub struct NewAnswer {
    pub question_id: i32,
    pub is_correct: bool,
    pub match_side: Option<MatchSide>,
    pub match_group: Option<i32>,
    pub position: i32,
}

/// Which tests a listing may return.
#[derive(Debug, Clone, Copy)]
pub enum TestVisibility {
    Public,
    PublicOrOwnedBy(i32),
    All,
}

pub struct QuizRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> QuizRepository<'a, C> {
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    // ========== Tests ==========

    pub async fn insert_test(&self, test: NewTest) -> Result<tests::Model> {
        let now = Utc::now();
        let active = tests::ActiveModel {
            category_id: Set(test.category_id),
            difficulty_id: Set(test.difficulty_id),
            created_by: Set(test.created_by),
            is_public: Set(test.is_public),
            source: Set(test.source.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        active.insert(self.db).await.context("Failed to insert test")
    }

    pub async fn get_test(&self, id: i32) -> Result<Option<tests::Model>> {
        Ok(Tests::find_by_id(id).one(self.db).await?)
    }

    pub async fn update_test(&self, id: i32, update: TestUpdate) -> Result<Option<tests::Model>> {
        let Some(test) = Tests::find_by_id(id).one(self.db).await? else {
            return Ok(None);
        };

        let mut active: tests::ActiveModel = test.into();
        if let Some(category_id) = update.category_id {
            active.category_id = Set(category_id);
        }
        if let Some(difficulty_id) = update.difficulty_id {
            active.difficulty_id = Set(difficulty_id);
        }
        if let Some(is_public) = update.is_public {
            active.is_public = Set(is_public);
        }
        active.updated_at = Set(Utc::now());

        Ok(Some(active.update(self.db).await?))
    }

    pub async fn delete_test(&self, id: i32) -> Result<bool> {
        let result = Tests::delete_by_id(id).exec(self.db).await?;
        Ok(result.rows_affected > 0)
    }

    /// Page through tests, newest first. `page` is 1-based.
    pub async fn list_tests(
        &self,
        visibility: TestVisibility,
        category_id: Option<i32>,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<tests::Model>, u64)> {
        let mut query = Tests::find()
            .order_by_desc(tests::Column::CreatedAt)
            .order_by_desc(tests::Column::Id);

        query = match visibility {
            TestVisibility::Public => query.filter(tests::Column::IsPublic.eq(true)),
            TestVisibility::PublicOrOwnedBy(user_id) => query.filter(
                Condition::any()
                    .add(tests::Column::IsPublic.eq(true))
                    .add(tests::Column::CreatedBy.eq(user_id)),
            ),
            TestVisibility::All => query,
        };

        if let Some(category_id) = category_id {
            query = query.filter(tests::Column::CategoryId.eq(category_id));
        }

        let paginator = query.paginate(self.db, page_size);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, total))
    }

    pub async fn test_translation(
        &self,
        test_id: i32,
        language_id: i32,
    ) -> Result<Option<test_translations::Model>> {
        Ok(TestTranslations::find()
            .filter(test_translations::Column::TestId.eq(test_id))
            .filter(test_translations::Column::LanguageId.eq(language_id))
            .one(self.db)
            .await?)
    }

    pub async fn insert_test_translation(
        &self,
        test_id: i32,
        language_id: i32,
        title: &str,
        description: Option<&str>,
    ) -> Result<test_translations::Model> {
        let active = test_translations::ActiveModel {
            test_id: Set(test_id),
            language_id: Set(language_id),
            title: Set(title.to_string()),
            description: Set(description.map(str::to_string)),
            ..Default::default()
        };

        active
            .insert(self.db)
            .await
            .context("Failed to insert test translation")
    }

    pub async fn upsert_test_translation(
        &self,
        test_id: i32,
        language_id: i32,
        title: &str,
        description: Option<&str>,
    ) -> Result<test_translations::Model> {
        match self.test_translation(test_id, language_id).await? {
            Some(existing) => {
                let mut active: test_translations::ActiveModel = existing.into();
                active.title = Set(title.to_string());
                active.description = Set(description.map(str::to_string));
                Ok(active.update(self.db).await?)
            }
            None => {
                self.insert_test_translation(test_id, language_id, title, description)
                    .await
            }
        }
    }

    pub async fn test_translations_for(
        &self,
        test_ids: &[i32],
    ) -> Result<Vec<test_translations::Model>> {
        if test_ids.is_empty() {
            return Ok(Vec::new());
        }

        Ok(TestTranslations::find()
            .filter(test_translations::Column::TestId.is_in(test_ids.iter().copied()))
            .order_by_asc(test_translations::Column::Id)
            .all(self.db)
            .await?)
    }

    // ========== Questions ==========

    pub async fn insert_question(&self, question: NewQuestion) -> Result<questions::Model> {
        let now = Utc::now();
        let active = questions::ActiveModel {
            test_id: Set(question.test_id),
            category_id: Set(question.category_id),
            question_type: Set(question.question_type.as_str().to_string()),
            position: Set(question.position),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        active
            .insert(self.db)
            .await
            .context("Failed to insert question")
    }

    pub async fn next_question_position(&self, test_id: i32) -> Result<i32> {
        let max: Option<Option<i32>> = Questions::find()
            .select_only()
            .column_as(questions::Column::Position.max(), "max_position")
            .filter(questions::Column::TestId.eq(test_id))
            .into_tuple()
            .one(self.db)
            .await?;

        Ok(max.flatten().map_or(1, |p| p + 1))
    }

    pub async fn get_question(&self, id: i32) -> Result<Option<questions::Model>> {
        Ok(Questions::find_by_id(id).one(self.db).await?)
    }

    pub async fn questions_for_test(
        &self,
        test_id: i32,
        active_only: bool,
    ) -> Result<Vec<questions::Model>> {
        let mut query = Questions::find().filter(questions::Column::TestId.eq(test_id));
        if active_only {
            query = query.filter(questions::Column::IsActive.eq(true));
        }

        Ok(query
            .order_by_asc(questions::Column::Position)
            .order_by_asc(questions::Column::Id)
            .all(self.db)
            .await?)
    }

    pub async fn count_active_questions(&self, test_id: i32) -> Result<u64> {
        Ok(Questions::find()
            .filter(questions::Column::TestId.eq(test_id))
            .filter(questions::Column::IsActive.eq(true))
            .count(self.db)
            .await?)
    }

    pub async fn delete_question(&self, id: i32) -> Result<bool> {
        let result = Questions::delete_by_id(id).exec(self.db).await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn question_translation(
        &self,
        question_id: i32,
        language_id: i32,
    ) -> Result<Option<question_translations::Model>> {
        Ok(QuestionTranslations::find()
            .filter(question_translations::Column::QuestionId.eq(question_id))
            .filter(question_translations::Column::LanguageId.eq(language_id))
            .one(self.db)
            .await?)
    }

    pub async fn insert_question_translation(
        &self,
        question_id: i32,
        language_id: i32,
        content: &str,
        explanation: Option<&str>,
    ) -> Result<question_translations::Model> {
        let active = question_translations::ActiveModel {
            question_id: Set(question_id),
            language_id: Set(language_id),
            content: Set(content.to_string()),
            explanation: Set(explanation.map(str::to_string)),
            ..Default::default()
        };

        active
            .insert(self.db)
            .await
            .context("Failed to insert question translation")
    }

    pub async fn upsert_question_translation(
        &self,
        question_id: i32,
        language_id: i32,
        content: &str,
        explanation: Option<&str>,
    ) -> Result<question_translations::Model> {
        match self.question_translation(question_id, language_id).await? {
            Some(existing) => {
                let mut active: question_translations::ActiveModel = existing.into();
                active.content = Set(content.to_string());
                active.explanation = Set(explanation.map(str::to_string));
                Ok(active.update(self.db).await?)
            }
            None => {
                self.insert_question_translation(question_id, language_id, content, explanation)
                    .await
            }
        }
    }

    pub async fn question_translations_for(
        &self,
        question_ids: &[i32],
    ) -> Result<Vec<question_translations::Model>> {
        if question_ids.is_empty() {
            return Ok(Vec::new());
        }

        Ok(QuestionTranslations::find()
            .filter(question_translations::Column::QuestionId.is_in(question_ids.iter().copied()))
            .order_by_asc(question_translations::Column::Id)
            .all(self.db)
            .await?)
    }

    // ========== Answers ==========

    pub async fn insert_answer(&self, answer: NewAnswer) -> Result<answers::Model> {
        let active = answers::ActiveModel {
            question_id: Set(answer.question_id),
            is_correct: Set(answer.is_correct),
            match_side: Set(answer.match_side.map(|s| s.as_str().to_string())),
            match_group: Set(answer.match_group),
            position: Set(answer.position),
            ..Default::default()
        };

        active
            .insert(self.db)
            .await
            .context("Failed to insert answer")
    }

    pub async fn get_answer(&self, id: i32) -> Result<Option<answers::Model>> {
        Ok(Answers::find_by_id(id).one(self.db).await?)
    }

    pub async fn answers_for_questions(&self, question_ids: &[i32]) -> Result<Vec<answers::Model>> {
        if question_ids.is_empty() {
            return Ok(Vec::new());
        }

        Ok(Answers::find()
            .filter(answers::Column::QuestionId.is_in(question_ids.iter().copied()))
            .order_by_asc(answers::Column::Position)
            .order_by_asc(answers::Column::Id)
            .all(self.db)
            .await?)
    }

    pub async fn insert_answer_translation(
        &self,
        answer_id: i32,
        language_id: i32,
        content: &str,
    ) -> Result<answer_translations::Model> {
        let active = answer_translations::ActiveModel {
            answer_id: Set(answer_id),
            language_id: Set(language_id),
            content: Set(content.to_string()),
            ..Default::default()
        };

        active
            .insert(self.db)
            .await
            .context("Failed to insert answer translation")
    }

    pub async fn upsert_answer_translation(
        &self,
        answer_id: i32,
        language_id: i32,
        content: &str,
    ) -> Result<answer_translations::Model> {
        let existing = AnswerTranslations::find()
            .filter(answer_translations::Column::AnswerId.eq(answer_id))
            .filter(answer_translations::Column::LanguageId.eq(language_id))
            .one(self.db)
            .await?;

        match existing {
            Some(existing) => {
                let mut active: answer_translations::ActiveModel = existing.into();
                active.content = Set(content.to_string());
                Ok(active.update(self.db).await?)
            }
            None => {
                self.insert_answer_translation(answer_id, language_id, content)
                    .await
            }
        }
    }

    pub async fn answer_translations_for(
        &self,
        answer_ids: &[i32],
    ) -> Result<Vec<answer_translations::Model>> {
        if answer_ids.is_empty() {
            return Ok(Vec::new());
        }

        Ok(AnswerTranslations::find()
            .filter(answer_translations::Column::AnswerId.is_in(answer_ids.iter().copied()))
            .order_by_asc(answer_translations::Column::Id)
            .all(self.db)
            .await?)
    }
}
