//! Bulk moderation of users and tests.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::info;

use crate::db::Store;
use crate::db::repositories::user::UserFlagChange;
use crate::db::repositories::quiz::TestUpdate;
use crate::domain::events::AppEvent;
use crate::entities::system_logs;
use crate::domain::{CurrentUser, Role};
use crate::services::auth_service::UserInfo;
use crate::services::token_service::{ApiTokenService, TokenError};

const MAX_BULK_IDS: usize = 500;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Admin role required")]
    Forbidden,

    #[error("User not found")]
    UserNotFound,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AdminError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Forbidden => "FORBIDDEN",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<anyhow::Error> for AdminError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<TokenError> for AdminError {
    fn from(err: TokenError) -> Self {
        Self::Internal(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    Activate,
    Deactivate,
    Block,
    Unblock,
    MakeCreator,
    MakeUser,
    MakeAdmin,
    Delete,
}

impl UserAction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
            Self::Block => "block",
            Self::Unblock => "unblock",
            Self::MakeCreator => "make_creator",
            Self::MakeUser => "make_user",
            Self::MakeAdmin => "make_admin",
            Self::Delete => "delete",
        }
    }

    /// Actions after which the account must not keep any live token.
    const fn revokes_tokens(self) -> bool {
        matches!(self, Self::Deactivate | Self::Block | Self::Delete)
    }

    const fn flag_change(self) -> Option<UserFlagChange> {
        match self {
            Self::Activate => Some(UserFlagChange::Active(true)),
            Self::Deactivate => Some(UserFlagChange::Active(false)),
            Self::Block => Some(UserFlagChange::Blocked(true)),
            Self::Unblock => Some(UserFlagChange::Blocked(false)),
            Self::MakeCreator => Some(UserFlagChange::Role(Role::Creator)),
            Self::MakeUser => Some(UserFlagChange::Role(Role::User)),
            Self::MakeAdmin => Some(UserFlagChange::Role(Role::Admin)),
            Self::Delete => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestAction {
    Publish,
    Unpublish,
    Delete,
}

impl TestAction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Unpublish => "unpublish",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkSummary {
    pub processed: usize,
    pub skipped: usize,
    pub not_found: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogPage {
    pub items: Vec<system_logs::Model>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserPage {
    pub items: Vec<UserInfo>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

pub struct AdminService {
    store: Store,
    tokens: Arc<ApiTokenService>,
    event_bus: broadcast::Sender<AppEvent>,
}

impl AdminService {
    #[must_use]
    pub const fn new(
        store: Store,
        tokens: Arc<ApiTokenService>,
        event_bus: broadcast::Sender<AppEvent>,
    ) -> Self {
        Self {
            store,
            tokens,
            event_bus,
        }
    }

    pub async fn list_users(
        &self,
        admin: &CurrentUser,
        page: u64,
        page_size: u64,
        search: Option<&str>,
    ) -> Result<UserPage, AdminError> {
        ensure_admin(admin)?;

        let (users, total) = self.store.users().list(page, page_size, search).await?;
        Ok(UserPage {
            items: users.into_iter().map(UserInfo::from).collect(),
            total,
            page,
            page_size,
        })
    }

    /// Applies `action` to each user. The acting admin is always skipped.
    pub async fn bulk_user_action(
        &self,
        admin: &CurrentUser,
        user_ids: &[i32],
        action: UserAction,
    ) -> Result<BulkSummary, AdminError> {
        ensure_admin(admin)?;
        let ids = unique_ids(user_ids)?;

        let users = self.store.users();
        let mut summary = BulkSummary::default();

        for id in ids {
            if id == admin.id {
                summary.skipped += 1;
                continue;
            }
            if users.get_by_id(id).await?.is_none() {
                summary.not_found += 1;
                continue;
            }

            if action.revokes_tokens() {
                self.tokens
                    .revoke_all_for_user(id, &format!("admin_{}", action.as_str()))
                    .await?;
            }

            let applied = match action.flag_change() {
                Some(change) => users.update_flags(id, change).await?,
                None => users.delete(id).await?,
            };

            if applied {
                summary.processed += 1;
            } else {
                summary.not_found += 1;
            }
        }

        self.announce(admin, "users", action.as_str(), summary);
        Ok(summary)
    }

    pub async fn bulk_test_action(
        &self,
        admin: &CurrentUser,
        test_ids: &[i32],
        action: TestAction,
    ) -> Result<BulkSummary, AdminError> {
        ensure_admin(admin)?;
        let ids = unique_ids(test_ids)?;

        let quizzes = self.store.quizzes();
        let mut summary = BulkSummary::default();

        for id in ids {
            let applied = match action {
                TestAction::Publish | TestAction::Unpublish => quizzes
                    .update_test(
                        id,
                        TestUpdate {
                            is_public: Some(action == TestAction::Publish),
                            ..TestUpdate::default()
                        },
                    )
                    .await?
                    .is_some(),
                TestAction::Delete => quizzes.delete_test(id).await?,
            };

            if applied {
                summary.processed += 1;
            } else {
                summary.not_found += 1;
            }
        }

        self.announce(admin, "tests", action.as_str(), summary);
        Ok(summary)
    }

    /// Deletes expired and revoked tokens past the retention window.
    pub async fn cleanup_tokens(
        &self,
        admin: &CurrentUser,
        retention_days: Option<i64>,
    ) -> Result<u64, AdminError> {
        ensure_admin(admin)?;

        let retention_days =
            retention_days.unwrap_or(self.tokens.config().cleanup_retention_days);
        if retention_days < 0 {
            return Err(AdminError::Validation(
                "Retention days cannot be negative".to_string(),
            ));
        }

        Ok(self.tokens.cleanup(retention_days).await?)
    }

    pub async fn revoke_user_tokens(
        &self,
        admin: &CurrentUser,
        user_id: i32,
    ) -> Result<u64, AdminError> {
        ensure_admin(admin)?;

        if self.store.users().get_by_id(user_id).await?.is_none() {
            return Err(AdminError::UserNotFound);
        }

        Ok(self
            .tokens
            .revoke_all_for_user(user_id, "admin_revoke")
            .await?)
    }

    pub async fn list_logs(
        &self,
        admin: &CurrentUser,
        page: u64,
        page_size: u64,
        level: Option<String>,
        event_type: Option<String>,
    ) -> Result<LogPage, AdminError> {
        ensure_admin(admin)?;

        let (items, total) = self
            .store
            .logs()
            .get_logs(page, page_size, level, event_type)
            .await?;

        Ok(LogPage {
            items,
            total,
            page,
            page_size,
        })
    }

    fn announce(&self, admin: &CurrentUser, target: &str, action: &str, summary: BulkSummary) {
        info!(
            admin_id = admin.id,
            target,
            action,
            processed = summary.processed,
            skipped = summary.skipped,
            not_found = summary.not_found,
            "Bulk action applied"
        );

        let _ = self.event_bus.send(AppEvent::BulkActionApplied {
            admin_id: admin.id,
            target: target.to_string(),
            action: action.to_string(),
            processed: summary.processed,
        });
    }
}

const fn ensure_admin(user: &CurrentUser) -> Result<(), AdminError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AdminError::Forbidden)
    }
}

/// Drops repeated ids, keeping first-seen order.
fn unique_ids(ids: &[i32]) -> Result<Vec<i32>, AdminError> {
    if ids.is_empty() {
        return Err(AdminError::Validation("No ids given".to_string()));
    }
    if ids.len() > MAX_BULK_IDS {
        return Err(AdminError::Validation(format!(
            "At most {MAX_BULK_IDS} ids per request"
        )));
    }

    let mut seen = HashSet::with_capacity(ids.len());
    Ok(ids.iter().copied().filter(|id| seen.insert(*id)).collect())
}
