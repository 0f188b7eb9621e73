//! Domain events for the application.
//!
//! Events are published on the broadcast event bus and persisted by the
//! [`LogService`](crate::services::LogService) listener as audit rows.

use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum AppEvent {
    UserRegistered {
        user_id: i32,
        username: String,
    },
    LoginSucceeded {
        user_id: i32,
        ip: Option<String>,
    },
    LoginFailed {
        identifier: String,
        ip: Option<String>,
    },
    LoginLockedOut {
        ip: String,
        retry_after_seconds: u64,
    },
    PasswordChanged {
        user_id: i32,
    },
    TokenReuseDetected {
        user_id: i32,
        family_id: String,
        revoked: u64,
    },
    TokenFamilyRevoked {
        family_id: String,
        reason: String,
        revoked: u64,
    },
    UserTokensRevoked {
        user_id: i32,
        reason: String,
        revoked: u64,
    },
    TokensCleanedUp {
        deleted: u64,
    },
    LogsPruned {
        deleted: u64,
    },
    AiRequestCompleted {
        request_id: i32,
        user_id: i32,
        request_type: String,
        total_tokens: Option<i32>,
    },
    AiRequestFailed {
        request_id: i32,
        user_id: i32,
        request_type: String,
        error: String,
    },
    BulkActionApplied {
        admin_id: i32,
        target: String,
        action: String,
        processed: usize,
    },
    Error {
        message: String,
    },
}

impl AppEvent {
    /// Stable name stored in the `event_type` column.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::UserRegistered { .. } => "UserRegistered",
            Self::LoginSucceeded { .. } => "LoginSucceeded",
            Self::LoginFailed { .. } => "LoginFailed",
            Self::LoginLockedOut { .. } => "LoginLockedOut",
            Self::PasswordChanged { .. } => "PasswordChanged",
            Self::TokenReuseDetected { .. } => "TokenReuseDetected",
            Self::TokenFamilyRevoked { .. } => "TokenFamilyRevoked",
            Self::UserTokensRevoked { .. } => "UserTokensRevoked",
            Self::TokensCleanedUp { .. } => "TokensCleanedUp",
            Self::LogsPruned { .. } => "LogsPruned",
            Self::AiRequestCompleted { .. } => "AiRequestCompleted",
            Self::AiRequestFailed { .. } => "AiRequestFailed",
            Self::BulkActionApplied { .. } => "BulkActionApplied",
            Self::Error { .. } => "Error",
        }
    }
}
