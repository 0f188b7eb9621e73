//! `SeaORM` implementation of the `AiService` trait.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{NaiveTime, Utc};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::clients::openai::{AiClientError, ChatCompletion, ChatMessage, OpenAiClient};
use crate::config::AiConfig;
use crate::db::Store;
use crate::db::repositories::ai_request::{AiRequestSuccess, NewAiRequest};
use crate::domain::events::AppEvent;
use crate::domain::{AiRequestType, CurrentUser, QuestionType, TestSource};
use crate::services::ai_draft::{
    DraftLimits, draft_system_prompt, draft_user_prompt, parse_draft,
};
use crate::services::ai_service::{
    AiError, AiRequestPage, AiService, Explanation, QuizDraftRequest, QuizDraftResult,
    estimate_cost, fallback_explanation,
};
use crate::services::catalog::CatalogService;
use crate::services::content;
use crate::services::quiz_service::{QuizError, QuizService};
use crate::services::quiz_service_impl::{can_edit, can_view};

const ALL_QUESTION_TYPES: &[QuestionType] = &[
    QuestionType::MultipleChoice,
    QuestionType::TrueFalse,
    QuestionType::Text,
    QuestionType::Matching,
];

const MAX_TOPIC_CHARS: usize = 200;
const DRAFT_TEMPERATURE: f32 = 0.7;
const EXPLAIN_TEMPERATURE: f32 = 0.3;

pub struct SeaOrmAiService {
    store: Store,
    client: Arc<OpenAiClient>,
    config: AiConfig,
    catalog: Arc<CatalogService>,
    quizzes: Arc<dyn QuizService>,
    event_bus: broadcast::Sender<AppEvent>,
}

impl SeaOrmAiService {
    #[must_use]
    pub fn new(
        store: Store,
        client: Arc<OpenAiClient>,
        config: AiConfig,
        catalog: Arc<CatalogService>,
        quizzes: Arc<dyn QuizService>,
        event_bus: broadcast::Sender<AppEvent>,
    ) -> Self {
        Self {
            store,
            client,
            config,
            catalog,
            quizzes,
            event_bus,
        }
    }

    fn is_available(&self) -> bool {
        self.config.enabled && self.client.is_configured()
    }

    /// Admins and a zero limit bypass the quota.
    async fn check_quota(&self, user: &CurrentUser) -> Result<(), AiError> {
        let limit = self.config.daily_limit_per_user;
        if limit == 0 || user.is_admin() {
            return Ok(());
        }

        let midnight = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
        let used = self.store.ai_requests().count_since(user.id, midnight).await?;

        if used >= u64::from(limit) {
            return Err(AiError::DailyLimit { limit });
        }
        Ok(())
    }

    fn record_success(
        &self,
        request_id: i32,
        user_id: i32,
        request_type: AiRequestType,
        completion: &ChatCompletion,
    ) {
        metrics::counter!(
            "ai_requests_total",
            "type" => request_type.as_str(),
            "status" => "success"
        )
        .increment(1);

        let _ = self.event_bus.send(AppEvent::AiRequestCompleted {
            request_id,
            user_id,
            request_type: request_type.as_str().to_string(),
            total_tokens: i32::try_from(completion.usage.total_tokens).ok(),
        });
    }

    async fn record_failure(
        &self,
        request_id: i32,
        user_id: i32,
        request_type: AiRequestType,
        error: &str,
        response: Option<String>,
        started: Instant,
    ) -> Result<(), AiError> {
        metrics::counter!(
            "ai_requests_total",
            "type" => request_type.as_str(),
            "status" => "failed"
        )
        .increment(1);

        warn!(request_id, user_id, error, "AI request failed");

        self.store
            .ai_requests()
            .mark_failed(request_id, error, response, elapsed_ms(started))
            .await?;

        let _ = self.event_bus.send(AppEvent::AiRequestFailed {
            request_id,
            user_id,
            request_type: request_type.as_str().to_string(),
            error: error.to_string(),
        });
        Ok(())
    }

    fn success_row(&self, completion: &ChatCompletion, test_id: Option<i32>) -> AiRequestSuccess {
        let usage = completion.usage;
        AiRequestSuccess {
            response: completion.content.clone(),
            test_id,
            prompt_tokens: i32::try_from(usage.prompt_tokens).ok(),
            completion_tokens: i32::try_from(usage.completion_tokens).ok(),
            total_tokens: i32::try_from(usage.total_tokens).ok(),
            cost_usd: Some(estimate_cost(
                usage.prompt_tokens,
                usage.completion_tokens,
                self.config.prompt_cost_per_1k_tokens,
                self.config.completion_cost_per_1k_tokens,
            )),
            duration_ms: i64::try_from(completion.duration.as_millis()).unwrap_or(i64::MAX),
        }
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}

fn provider_error(err: &AiClientError) -> AiError {
    match err {
        AiClientError::BadResponse(msg) => AiError::InvalidResponse(msg.clone()),
        other => AiError::ProviderError(other.to_string()),
    }
}

#[async_trait]
impl AiService for SeaOrmAiService {
    async fn generate_quiz_draft(
        &self,
        user: &CurrentUser,
        request: QuizDraftRequest,
    ) -> Result<QuizDraftResult, AiError> {
        if !self.is_available() {
            return Err(AiError::Disabled);
        }
        if !user.can_create_content() {
            return Err(QuizError::Forbidden.into());
        }

        let topic = request.topic.trim();
        if topic.is_empty() || topic.chars().count() > MAX_TOPIC_CHARS {
            return Err(AiError::Validation(format!(
                "Topic must be 1-{MAX_TOPIC_CHARS} characters"
            )));
        }
        let max_questions = self.config.max_questions_per_draft;
        if request.question_count == 0 || request.question_count > max_questions {
            return Err(AiError::Validation(format!(
                "Question count must be between 1 and {max_questions}"
            )));
        }

        let catalog = self.store.catalog();
        if catalog.get_category(request.category_id).await?.is_none() {
            return Err(QuizError::CategoryRequired.into());
        }
        if catalog.get_difficulty(request.difficulty_id).await?.is_none() {
            return Err(QuizError::DifficultyRequired.into());
        }
        let language = self
            .catalog
            .resolve_language(Some(&request.language))
            .await?
            .filter(|_| !request.language.trim().is_empty())
            .ok_or_else(|| QuizError::LanguageNotFound(request.language.clone()))?;

        self.check_quota(user).await?;

        let allowed_types = if request.question_types.is_empty() {
            ALL_QUESTION_TYPES
        } else {
            request.question_types.as_slice()
        };

        let prompt = draft_user_prompt(topic, &language.name, request.question_count, allowed_types);
        let row = self
            .store
            .ai_requests()
            .create_pending(NewAiRequest {
                user_id: user.id,
                request_type: AiRequestType::GenerateQuiz,
                model: self.client.model(),
                language_code: Some(&language.code),
                prompt: prompt.clone(),
            })
            .await?;

        let started = Instant::now();
        let messages = [
            ChatMessage::system(draft_system_prompt()),
            ChatMessage::user(prompt),
        ];

        let completion = match self.client.chat(&messages, true, DRAFT_TEMPERATURE).await {
            Ok(completion) => completion,
            Err(err) => {
                self.record_failure(
                    row.id,
                    user.id,
                    AiRequestType::GenerateQuiz,
                    &err.to_string(),
                    None,
                    started,
                )
                .await?;
                return Err(provider_error(&err));
            }
        };

        let limits = DraftLimits {
            max_questions: request.question_count,
            allowed_types,
        };
        let draft = match parse_draft(&completion.content)
            .and_then(|draft| draft.validate(&limits).map(|()| draft))
        {
            Ok(draft) => draft,
            Err(reason) => {
                self.record_failure(
                    row.id,
                    user.id,
                    AiRequestType::GenerateQuiz,
                    &reason,
                    Some(completion.content.clone()),
                    started,
                )
                .await?;
                return Err(AiError::InvalidResponse(reason));
            }
        };

        let mut input =
            draft.into_test_input(&language.code, request.category_id, request.difficulty_id);
        input.source = Some(TestSource::Ai);

        let test = match self.quizzes.create_test(user, input).await {
            Ok(test) => test,
            Err(err) => {
                self.record_failure(
                    row.id,
                    user.id,
                    AiRequestType::GenerateQuiz,
                    &err.to_string(),
                    Some(completion.content.clone()),
                    started,
                )
                .await?;
                return Err(match err {
                    QuizError::Internal(msg) => AiError::Internal(msg),
                    other => AiError::InvalidResponse(other.to_string()),
                });
            }
        };

        self.store
            .ai_requests()
            .mark_success(row.id, self.success_row(&completion, Some(test.id)))
            .await?;
        self.record_success(row.id, user.id, AiRequestType::GenerateQuiz, &completion);

        info!(
            request_id = row.id,
            test_id = test.id,
            user_id = user.id,
            "AI quiz draft stored"
        );

        Ok(QuizDraftResult {
            request_id: row.id,
            test,
            total_tokens: completion.usage.total_tokens,
        })
    }

    async fn explain_answer(
        &self,
        user: &CurrentUser,
        question_id: i32,
        language: Option<&str>,
    ) -> Result<Explanation, AiError> {
        let question = content::load_question(&self.store, question_id)
            .await?
            .ok_or(AiError::QuestionNotFound)?;
        let test = self
            .store
            .quizzes()
            .get_test(question.question.test_id)
            .await?
            .filter(|t| can_view(user, t))
            .ok_or(AiError::QuestionNotFound)?;
        if !can_edit(user, &test) && !self.store.attempts().has_finished(user.id, test.id).await? {
            return Err(QuizError::Forbidden.into());
        }

        let language = self
            .catalog
            .resolve_language(language)
            .await?
            .ok_or_else(|| QuizError::LanguageNotFound(language.unwrap_or_default().into()))?;
        let chain = self.catalog.fallback_chain(&language).await?;

        let correct = question.correct_answer_texts(&chain);
        let fallback = Explanation {
            question_id,
            explanation: fallback_explanation(&correct),
            fallback: true,
            request_id: None,
        };

        if !self.is_available() {
            return Ok(fallback);
        }
        if let Err(err) = self.check_quota(user).await {
            info!(user_id = user.id, error = %err, "Explanation served from fallback");
            return Ok(fallback);
        }

        let (content, _) = question.content(&chain);
        let prompt = format!(
            "Question ({}): {content}\nCorrect answer(s): {}\nExplain briefly in {} why this is correct.",
            question.question_type,
            correct.join(", "),
            language.name,
        );

        let row = self
            .store
            .ai_requests()
            .create_pending(NewAiRequest {
                user_id: user.id,
                request_type: AiRequestType::ExplainAnswer,
                model: self.client.model(),
                language_code: Some(&language.code),
                prompt: prompt.clone(),
            })
            .await?;

        let started = Instant::now();
        let messages = [
            ChatMessage::system(
                "You are a patient tutor. Answer in two or three sentences, in plain text.",
            ),
            ChatMessage::user(prompt),
        ];

        match self.client.chat(&messages, false, EXPLAIN_TEMPERATURE).await {
            Ok(completion) => {
                self.store
                    .ai_requests()
                    .mark_success(row.id, self.success_row(&completion, None))
                    .await?;
                self.record_success(row.id, user.id, AiRequestType::ExplainAnswer, &completion);

                Ok(Explanation {
                    question_id,
                    explanation: completion.content,
                    fallback: false,
                    request_id: Some(row.id),
                })
            }
            Err(err) => {
                self.record_failure(
                    row.id,
                    user.id,
                    AiRequestType::ExplainAnswer,
                    &err.to_string(),
                    None,
                    started,
                )
                .await?;

                Ok(Explanation {
                    request_id: Some(row.id),
                    ..fallback
                })
            }
        }
    }

    async fn list_ai_requests(
        &self,
        user: &CurrentUser,
        page: u64,
        page_size: u64,
    ) -> Result<AiRequestPage, AiError> {
        let owner = (!user.is_admin()).then_some(user.id);
        let (items, total) = self
            .store
            .ai_requests()
            .list(owner, page, page_size)
            .await?;

        Ok(AiRequestPage {
            items,
            total,
            page,
            page_size,
        })
    }
}
