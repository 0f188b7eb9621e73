use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, sea_query::Expr,
};

use crate::domain::TokenType;
use crate::entities::{api_tokens, prelude::*};

pub struct NewApiToken<'a> {
    pub token_id: String,
    pub user_id: i32,
    pub token_hash: String,
    pub token_type: TokenType,
    pub family_id: &'a str,
    pub parent_token_id: Option<i32>,
    pub ip_address: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub expires_at: DateTime<Utc>,
}

pub struct TokenRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> TokenRepository<'a, C> {
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn insert(&self, token: NewApiToken<'_>) -> Result<api_tokens::Model> {
        let active = api_tokens::ActiveModel {
            token_id: Set(token.token_id),
            user_id: Set(token.user_id),
            token_hash: Set(token.token_hash),
            token_type: Set(token.token_type.as_str().to_string()),
            family_id: Set(token.family_id.to_string()),
            parent_token_id: Set(token.parent_token_id),
            replaced_by_token_id: Set(None),
            ip_address: Set(token.ip_address.map(str::to_string)),
            user_agent: Set(token.user_agent.map(str::to_string)),
            expires_at: Set(token.expires_at),
            used_at: Set(None),
            last_used_at: Set(None),
            revoked_at: Set(None),
            revoked_reason: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        active
            .insert(self.db)
            .await
            .context("Failed to insert API token")
    }

    pub async fn find_by_token_id(&self, token_id: &str) -> Result<Option<api_tokens::Model>> {
        ApiTokens::find()
            .filter(api_tokens::Column::TokenId.eq(token_id))
            .one(self.db)
            .await
            .context("Failed to query API token")
    }

    pub async fn get(&self, id: i32) -> Result<Option<api_tokens::Model>> {
        Ok(ApiTokens::find_by_id(id).one(self.db).await?)
    }

    /// Marks a refresh token as used, but only if nobody else has.
    /// Returns false when the row was already used or revoked.
    pub async fn claim_unused(&self, id: i32, now: DateTime<Utc>) -> Result<bool> {
        let result = ApiTokens::update_many()
            .col_expr(api_tokens::Column::UsedAt, Expr::value(now))
            .filter(api_tokens::Column::Id.eq(id))
            .filter(api_tokens::Column::UsedAt.is_null())
            .filter(api_tokens::Column::RevokedAt.is_null())
            .exec(self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    pub async fn set_replaced_by(&self, id: i32, replaced_by: i32) -> Result<()> {
        ApiTokens::update_many()
            .col_expr(api_tokens::Column::ReplacedByTokenId, Expr::value(replaced_by))
            .filter(api_tokens::Column::Id.eq(id))
            .exec(self.db)
            .await?;
        Ok(())
    }

    pub async fn touch_last_used(&self, id: i32, now: DateTime<Utc>) -> Result<()> {
        ApiTokens::update_many()
            .col_expr(api_tokens::Column::LastUsedAt, Expr::value(now))
            .filter(api_tokens::Column::Id.eq(id))
            .exec(self.db)
            .await?;
        Ok(())
    }

    /// Revokes every unrevoked token in the family. Returns rows changed.
    pub async fn revoke_family(&self, family_id: &str, reason: &str) -> Result<u64> {
        self.revoke_where(
            Condition::all().add(api_tokens::Column::FamilyId.eq(family_id)),
            reason,
        )
        .await
    }

    pub async fn revoke_all_for_user(&self, user_id: i32, reason: &str) -> Result<u64> {
        self.revoke_where(
            Condition::all().add(api_tokens::Column::UserId.eq(user_id)),
            reason,
        )
        .await
    }

    async fn revoke_where(&self, condition: Condition, reason: &str) -> Result<u64> {
        let result = ApiTokens::update_many()
            .col_expr(api_tokens::Column::RevokedAt, Expr::value(Utc::now()))
            .col_expr(api_tokens::Column::RevokedReason, Expr::value(reason))
            .filter(condition)
            .filter(api_tokens::Column::RevokedAt.is_null())
            .exec(self.db)
            .await
            .context("Failed to revoke API tokens")?;

        Ok(result.rows_affected)
    }

    /// Deletes expired tokens and tokens revoked before `revoked_before`.
    pub async fn delete_stale(
        &self,
        now: DateTime<Utc>,
        revoked_before: DateTime<Utc>,
    ) -> Result<u64> {
        let result = ApiTokens::delete_many()
            .filter(
                Condition::any()
                    .add(api_tokens::Column::ExpiresAt.lt(now))
                    .add(api_tokens::Column::RevokedAt.lt(revoked_before)),
            )
            .exec(self.db)
            .await
            .context("Failed to delete stale API tokens")?;

        Ok(result.rows_affected)
    }

    /// Whether the family still holds an unrevoked, unexpired token.
    pub async fn family_is_live(&self, family_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let count = ApiTokens::find()
            .filter(api_tokens::Column::FamilyId.eq(family_id))
            .filter(api_tokens::Column::RevokedAt.is_null())
            .filter(api_tokens::Column::ExpiresAt.gt(now))
            .count(self.db)
            .await?;
        Ok(count > 0)
    }

    pub async fn list_family(&self, family_id: &str) -> Result<Vec<api_tokens::Model>> {
        Ok(ApiTokens::find()
            .filter(api_tokens::Column::FamilyId.eq(family_id))
            .order_by_asc(api_tokens::Column::Id)
            .all(self.db)
            .await?)
    }
}
