use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::domain::{AiRequestStatus, AiRequestType};
use crate::entities::{ai_requests, prelude::*};

pub struct NewAiRequest<'a> {
    pub user_id: i32,
    pub request_type: AiRequestType,
    pub model: &'a str,
    pub language_code: Option<&'a str>,
    pub prompt: String,
}

/// Usage figures reported by the provider for one call.
#[derive(Debug, Clone, Default)]
pub struct AiRequestSuccess {
    pub response: String,
    pub test_id: Option<i32>,
    pub prompt_tokens: Option<i32>,
    pub completion_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
    pub cost_usd: Option<f64>,
    pub duration_ms: i64,
}

pub struct AiRequestRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> AiRequestRepository<'a, C> {
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn create_pending(&self, request: NewAiRequest<'_>) -> Result<ai_requests::Model> {
        let now = Utc::now();
        let active = ai_requests::ActiveModel {
            user_id: Set(request.user_id),
            test_id: Set(None),
            request_type: Set(request.request_type.as_str().to_string()),
            model: Set(request.model.to_string()),
            language_code: Set(request.language_code.map(str::to_string)),
            prompt: Set(request.prompt),
            response: Set(None),
            prompt_tokens: Set(None),
            completion_tokens: Set(None),
            total_tokens: Set(None),
            cost_usd: Set(None),
            status: Set(AiRequestStatus::Pending.as_str().to_string()),
            error_message: Set(None),
            duration_ms: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        active
            .insert(self.db)
            .await
            .context("Failed to insert AI request")
    }

    pub async fn mark_success(&self, id: i32, outcome: AiRequestSuccess) -> Result<()> {
        let mut active = self.load_active(id).await?;
        active.status = Set(AiRequestStatus::Success.as_str().to_string());
        active.response = Set(Some(outcome.response));
        active.test_id = Set(outcome.test_id);
        active.prompt_tokens = Set(outcome.prompt_tokens);
        active.completion_tokens = Set(outcome.completion_tokens);
        active.total_tokens = Set(outcome.total_tokens);
        active.cost_usd = Set(outcome.cost_usd);
        active.duration_ms = Set(Some(outcome.duration_ms));
        active.updated_at = Set(Utc::now());
        active.update(self.db).await?;
        Ok(())
    }

    /// `response` keeps whatever the provider returned, if anything, so bad
    /// drafts can be inspected later.
    pub async fn mark_failed(
        &self,
        id: i32,
        error: &str,
        response: Option<String>,
        duration_ms: i64,
    ) -> Result<()> {
        let mut active = self.load_active(id).await?;
        active.status = Set(AiRequestStatus::Failed.as_str().to_string());
        active.error_message = Set(Some(error.to_string()));
        active.response = Set(response);
        active.duration_ms = Set(Some(duration_ms));
        active.updated_at = Set(Utc::now());
        active.update(self.db).await?;
        Ok(())
    }

    async fn load_active(&self, id: i32) -> Result<ai_requests::ActiveModel> {
        let model = AiRequests::find_by_id(id)
            .one(self.db)
            .await?
            .ok_or_else(|| anyhow::anyhow!("AI request not found: {id}"))?;
        Ok(model.into())
    }

    /// Requests created by the user since `since`, regardless of outcome.
    pub async fn count_since(&self, user_id: i32, since: DateTime<Utc>) -> Result<u64> {
        Ok(AiRequests::find()
            .filter(ai_requests::Column::UserId.eq(user_id))
            .filter(ai_requests::Column::CreatedAt.gte(since))
            .count(self.db)
            .await?)
    }

    pub async fn list(
        &self,
        user_id: Option<i32>,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<ai_requests::Model>, u64)> {
        let mut query = AiRequests::find()
            .order_by_desc(ai_requests::Column::CreatedAt)
            .order_by_desc(ai_requests::Column::Id);

        if let Some(user_id) = user_id {
            query = query.filter(ai_requests::Column::UserId.eq(user_id));
        }

        let paginator = query.paginate(self.db, page_size);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, total))
    }
}
