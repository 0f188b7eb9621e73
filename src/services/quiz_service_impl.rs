//! `SeaORM` implementation of the `QuizService` trait.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, TransactionTrait};
use tracing::info;

use crate::db::Store;
use crate::db::repositories::quiz::{
    NewAnswer, NewQuestion, NewTest, QuizRepository, TestUpdate, TestVisibility,
};
use crate::domain::{CurrentUser, QuestionType, TestSource};
use crate::entities::{languages, test_translations, tests};
use crate::services::catalog::{CatalogService, LanguageChain};
use crate::services::content::{self, QuestionView};
use crate::services::quiz_service::{
    CreateTestInput, QuestionInput, QuizError, QuizService, TestDetail, TestPage, TestSummary,
    UpdateTestInput, validate_answer_set,
};

pub struct SeaOrmQuizService {
    store: Store,
    catalog: Arc<CatalogService>,
}

impl SeaOrmQuizService {
    #[must_use]
    pub const fn new(store: Store, catalog: Arc<CatalogService>) -> Self {
        Self { store, catalog }
    }

    async fn language(&self, code: Option<&str>) -> Result<languages::Model, QuizError> {
        self.catalog
            .resolve_language(code)
            .await?
            .ok_or_else(|| QuizError::LanguageNotFound(code.unwrap_or_default().to_string()))
    }

    /// Language code to id, for resolving translation inputs.
    async fn language_ids(&self) -> Result<LanguageIds, QuizError> {
        let ids = self
            .catalog
            .languages()
            .await?
            .into_iter()
            .map(|l| (l.code.to_lowercase(), l.id))
            .collect();
        Ok(LanguageIds(ids))
    }

    async fn load_test(&self, test_id: i32) -> Result<tests::Model, QuizError> {
        self.store
            .quizzes()
            .get_test(test_id)
            .await?
            .ok_or(QuizError::TestNotFound)
    }

    async fn load_editable_test(
        &self,
        user: &CurrentUser,
        test_id: i32,
    ) -> Result<tests::Model, QuizError> {
        let test = self.load_test(test_id).await?;
        ensure_can_edit(user, &test)?;
        Ok(test)
    }

    async fn check_references(
        &self,
        category_id: Option<i32>,
        difficulty_id: Option<i32>,
    ) -> Result<(i32, i32), QuizError> {
        let catalog = self.store.catalog();

        let category_id = category_id.ok_or(QuizError::CategoryRequired)?;
        if catalog.get_category(category_id).await?.is_none() {
            return Err(QuizError::CategoryRequired);
        }

        let difficulty_id = difficulty_id.ok_or(QuizError::DifficultyRequired)?;
        if catalog.get_difficulty(difficulty_id).await?.is_none() {
            return Err(QuizError::DifficultyRequired);
        }

        Ok((category_id, difficulty_id))
    }
}

struct LanguageIds(HashMap<String, i32>);

impl LanguageIds {
    fn get(&self, code: &str) -> Result<i32, QuizError> {
        self.0
            .get(&code.trim().to_lowercase())
            .copied()
            .ok_or_else(|| QuizError::LanguageNotFound(code.to_string()))
    }

    /// Resolves the languages of one entity's translations, rejecting repeats.
    fn resolve_unique<'a>(
        &self,
        codes: impl IntoIterator<Item = &'a str>,
    ) -> Result<Vec<i32>, QuizError> {
        let mut seen = HashSet::new();
        codes
            .into_iter()
            .map(|code| {
                let id = self.get(code)?;
                if seen.insert(id) {
                    Ok(id)
                } else {
                    Err(QuizError::TranslationExists(code.to_string()))
                }
            })
            .collect()
    }
}

/// Admins edit everything, creators their own tests.
pub fn can_edit(user: &CurrentUser, test: &tests::Model) -> bool {
    user.is_admin() || (user.can_create_content() && test.created_by == Some(user.id))
}

fn ensure_can_edit(user: &CurrentUser, test: &tests::Model) -> Result<(), QuizError> {
    if can_edit(user, test) {
        Ok(())
    } else {
        Err(QuizError::Forbidden)
    }
}

/// Visibility rule shared with attempts.
#[must_use]
pub fn can_view(user: &CurrentUser, test: &tests::Model) -> bool {
    test.is_public || user.is_admin() || test.created_by == Some(user.id)
}

fn summarize(
    test: &tests::Model,
    translations: &[test_translations::Model],
    chain: &LanguageChain,
) -> TestSummary {
    let translation = chain.pick(
        translations.iter().filter(|t| t.test_id == test.id),
        |t| t.language_id,
    );

    TestSummary {
        id: test.id,
        title: translation.map(|t| t.title.clone()).unwrap_or_default(),
        description: translation.and_then(|t| t.description.clone()),
        category_id: test.category_id,
        difficulty_id: test.difficulty_id,
        is_public: test.is_public,
        source: test.source.clone(),
        created_by: test.created_by,
        created_at: test.created_at,
    }
}

fn validate_question(input: &QuestionInput) -> Result<(), QuizError> {
    if input.translations.is_empty()
        || input
            .translations
            .iter()
            .any(|t| t.content.trim().is_empty())
    {
        return Err(QuizError::Validation(
            "Every question needs non-empty content".to_string(),
        ));
    }
    validate_answer_set(input.question_type, &input.answers)
}

/// Inserts a validated question with its translations and answers.
async fn insert_question_tree<C: ConnectionTrait>(
    repo: &QuizRepository<'_, C>,
    test_id: i32,
    category_id: i32,
    position: i32,
    input: &QuestionInput,
    languages: &LanguageIds,
) -> Result<i32, QuizError> {
    let question_languages =
        languages.resolve_unique(input.translations.iter().map(|t| t.language.as_str()))?;

    let question = repo
        .insert_question(NewQuestion {
            test_id,
            category_id,
            question_type: input.question_type,
            position,
        })
        .await?;

    for (translation, language_id) in input.translations.iter().zip(question_languages) {
        repo.insert_question_translation(
            question.id,
            language_id,
            translation.content.trim(),
            translation.explanation.as_deref().map(str::trim),
        )
        .await?;
    }

    // Text answers are all accepted spellings; matching rows are correct by pairing.
    let always_correct = matches!(
        input.question_type,
        QuestionType::Text | QuestionType::Matching
    );

    for (index, answer) in input.answers.iter().enumerate() {
        let answer_languages =
            languages.resolve_unique(answer.translations.iter().map(|t| t.language.as_str()))?;
        let is_matching = input.question_type == QuestionType::Matching;

        let row = repo
            .insert_answer(NewAnswer {
                question_id: question.id,
                is_correct: always_correct || answer.is_correct,
                match_side: answer.match_side.filter(|_| is_matching),
                match_group: answer.match_group.filter(|_| is_matching),
                position: i32::try_from(index + 1).unwrap_or(i32::MAX),
            })
            .await?;

        for (translation, language_id) in answer.translations.iter().zip(answer_languages) {
            repo.insert_answer_translation(row.id, language_id, translation.content.trim())
                .await?;
        }
    }

    Ok(question.id)
}

#[async_trait]
impl QuizService for SeaOrmQuizService {
    async fn list_tests(
        &self,
        viewer: &CurrentUser,
        language: Option<&str>,
        category_id: Option<i32>,
        page: u64,
        page_size: u64,
    ) -> Result<TestPage, QuizError> {
        let language = self.language(language).await?;
        let chain = self.catalog.fallback_chain(&language).await?;

        let visibility = if viewer.is_admin() {
            TestVisibility::All
        } else if viewer.can_create_content() {
            TestVisibility::PublicOrOwnedBy(viewer.id)
        } else {
            TestVisibility::Public
        };

        let quizzes = self.store.quizzes();
        let (tests, total) = quizzes
            .list_tests(visibility, category_id, page, page_size)
            .await?;

        let ids: Vec<i32> = tests.iter().map(|t| t.id).collect();
        let translations = quizzes.test_translations_for(&ids).await?;

        Ok(TestPage {
            items: tests
                .iter()
                .map(|t| summarize(t, &translations, &chain))
                .collect(),
            total,
            page,
            page_size,
        })
    }

    async fn get_test(
        &self,
        viewer: &CurrentUser,
        test_id: i32,
        language: Option<&str>,
        include_answers: bool,
    ) -> Result<TestDetail, QuizError> {
        let test = self.load_test(test_id).await?;
        if !can_view(viewer, &test) {
            return Err(QuizError::TestNotFound);
        }

        let language = self.language(language).await?;
        let chain = self.catalog.fallback_chain(&language).await?;

        let is_editor = ensure_can_edit(viewer, &test).is_ok();
        let reveal = include_answers && is_editor;

        let translations = self.store.quizzes().test_translations_for(&[test.id]).await?;
        let questions = content::load_questions(&self.store, test.id, !is_editor).await?;

        Ok(TestDetail {
            summary: summarize(&test, &translations, &chain),
            language: language.code,
            questions: questions
                .iter()
                .map(|q| QuestionView::render(q, &chain, reveal))
                .collect(),
        })
    }

    async fn create_test(
        &self,
        creator: &CurrentUser,
        input: CreateTestInput,
    ) -> Result<TestSummary, QuizError> {
        if !creator.can_create_content() {
            return Err(QuizError::Forbidden);
        }

        let (category_id, difficulty_id) = self
            .check_references(input.category_id, input.difficulty_id)
            .await?;

        if input.translations.is_empty() {
            return Err(QuizError::Validation(
                "At least one translation is required".to_string(),
            ));
        }
        if input.translations.iter().any(|t| t.title.trim().is_empty()) {
            return Err(QuizError::Validation("Title cannot be empty".to_string()));
        }
        for question in &input.questions {
            validate_question(question)?;
        }

        let languages = self.language_ids().await?;
        let test_languages =
            languages.resolve_unique(input.translations.iter().map(|t| t.language.as_str()))?;

        let txn = self.store.conn.begin().await?;
        let repo = QuizRepository::new(&txn);

        let test = repo
            .insert_test(NewTest {
                category_id,
                difficulty_id,
                created_by: Some(creator.id),
                is_public: input.is_public,
                source: input.source.unwrap_or(TestSource::Manual),
            })
            .await?;

        for (translation, language_id) in input.translations.iter().zip(&test_languages) {
            repo.insert_test_translation(
                test.id,
                *language_id,
                translation.title.trim(),
                translation
                    .description
                    .as_deref()
                    .map(str::trim)
                    .filter(|d| !d.is_empty()),
            )
            .await?;
        }

        for (index, question) in input.questions.iter().enumerate() {
            let position = i32::try_from(index + 1).unwrap_or(i32::MAX);
            insert_question_tree(&repo, test.id, category_id, position, question, &languages)
                .await?;
        }

        txn.commit().await?;

        info!(
            test_id = test.id,
            user_id = creator.id,
            questions = input.questions.len(),
            "Test created"
        );

        let translations = self.store.quizzes().test_translations_for(&[test.id]).await?;
        let chain = LanguageChain {
            requested: test_languages[0],
            default: None,
        };
        Ok(summarize(&test, &translations, &chain))
    }

    async fn update_test(
        &self,
        user: &CurrentUser,
        test_id: i32,
        input: UpdateTestInput,
    ) -> Result<TestSummary, QuizError> {
        let test = self.load_editable_test(user, test_id).await?;

        let catalog = self.store.catalog();
        if let Some(category_id) = input.category_id
            && catalog.get_category(category_id).await?.is_none()
        {
            return Err(QuizError::CategoryRequired);
        }
        if let Some(difficulty_id) = input.difficulty_id
            && catalog.get_difficulty(difficulty_id).await?.is_none()
        {
            return Err(QuizError::DifficultyRequired);
        }

        let quizzes = self.store.quizzes();
        let updated = quizzes
            .update_test(
                test.id,
                TestUpdate {
                    category_id: input.category_id,
                    difficulty_id: input.difficulty_id,
                    is_public: input.is_public,
                },
            )
            .await?
            .ok_or(QuizError::TestNotFound)?;

        let language = self.language(None).await?;
        let chain = self.catalog.fallback_chain(&language).await?;
        let translations = quizzes.test_translations_for(&[test.id]).await?;

        Ok(summarize(&updated, &translations, &chain))
    }

    async fn delete_test(&self, user: &CurrentUser, test_id: i32) -> Result<(), QuizError> {
        let test = self.load_editable_test(user, test_id).await?;

        if !self.store.quizzes().delete_test(test.id).await? {
            return Err(QuizError::TestNotFound);
        }

        info!(test_id, user_id = user.id, "Test deleted");
        Ok(())
    }

    async fn upsert_test_translation(
        &self,
        user: &CurrentUser,
        test_id: i32,
        language: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<(), QuizError> {
        let test = self.load_editable_test(user, test_id).await?;
        let language_id = self.language_ids().await?.get(language)?;

        let title = title.trim();
        if title.is_empty() {
            return Err(QuizError::Validation("Title cannot be empty".to_string()));
        }

        self.store
            .quizzes()
            .upsert_test_translation(test.id, language_id, title, description.map(str::trim))
            .await?;
        Ok(())
    }

    async fn add_question(
        &self,
        user: &CurrentUser,
        test_id: i32,
        input: QuestionInput,
    ) -> Result<QuestionView, QuizError> {
        let test = self.load_editable_test(user, test_id).await?;
        validate_question(&input)?;
        let languages = self.language_ids().await?;

        let txn = self.store.conn.begin().await?;
        let repo = QuizRepository::new(&txn);
        let position = repo.next_question_position(test.id).await?;
        let question_id = insert_question_tree(
            &repo,
            test.id,
            test.category_id,
            position,
            &input,
            &languages,
        )
        .await?;
        txn.commit().await?;

        let loaded = content::load_question(&self.store, question_id)
            .await?
            .ok_or(QuizError::QuestionNotFound)?;
        let first_language = languages.get(&input.translations[0].language)?;
        let chain = LanguageChain {
            requested: first_language,
            default: None,
        };

        Ok(QuestionView::render(&loaded, &chain, true))
    }

    async fn delete_question(
        &self,
        user: &CurrentUser,
        question_id: i32,
    ) -> Result<(), QuizError> {
        let quizzes = self.store.quizzes();
        let question = quizzes
            .get_question(question_id)
            .await?
            .ok_or(QuizError::QuestionNotFound)?;
        self.load_editable_test(user, question.test_id).await?;

        quizzes.delete_question(question.id).await?;
        Ok(())
    }

    async fn upsert_question_translation(
        &self,
        user: &CurrentUser,
        question_id: i32,
        language: &str,
        content: &str,
        explanation: Option<&str>,
    ) -> Result<(), QuizError> {
        let quizzes = self.store.quizzes();
        let question = quizzes
            .get_question(question_id)
            .await?
            .ok_or(QuizError::QuestionNotFound)?;
        self.load_editable_test(user, question.test_id).await?;
        let language_id = self.language_ids().await?.get(language)?;

        let content = content.trim();
        if content.is_empty() {
            return Err(QuizError::Validation("Content cannot be empty".to_string()));
        }

        quizzes
            .upsert_question_translation(
                question.id,
                language_id,
                content,
                explanation.map(str::trim),
            )
            .await?;
        Ok(())
    }

    async fn upsert_answer_translation(
        &self,
        user: &CurrentUser,
        answer_id: i32,
        language: &str,
        content: &str,
    ) -> Result<(), QuizError> {
        let quizzes = self.store.quizzes();
        let answer = quizzes
            .get_answer(answer_id)
            .await?
            .ok_or(QuizError::AnswerNotFound)?;
        let question = quizzes
            .get_question(answer.question_id)
            .await?
            .ok_or(QuizError::QuestionNotFound)?;
        self.load_editable_test(user, question.test_id).await?;
        let language_id = self.language_ids().await?.get(language)?;

        let content = content.trim();
        if content.is_empty() {
            return Err(QuizError::Validation("Content cannot be empty".to_string()));
        }

        quizzes
            .upsert_answer_translation(answer.id, language_id, content)
            .await?;
        Ok(())
    }
}
