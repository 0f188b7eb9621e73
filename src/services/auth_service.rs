//! Domain service for authentication and account management.
//!
//! Handles registration, login with throttling, token refresh and logout,
//! password changes, and resolving bearer tokens to the calling user.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::db::User;
use crate::domain::{CurrentUser, Role};
use crate::services::token_service::{ClientInfo, TokenError, TokenPair};

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is not active")]
    UserInactive,

    #[error("Account is blocked")]
    UserBlocked,

    #[error("Too many failed login attempts, retry in {retry_after_seconds}s")]
    TooManyAttempts { retry_after_seconds: u64 },

    #[error("Username is already taken")]
    UsernameTaken,

    #[error("Email is already registered")]
    EmailTaken,

    #[error("User not found")]
    UserNotFound,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::UserInactive => "USER_INACTIVE",
            Self::UserBlocked => "USER_BLOCKED",
            Self::TooManyAttempts { .. } => "TOO_MANY_ATTEMPTS",
            Self::UsernameTaken => "USERNAME_TAKEN",
            Self::EmailTaken => "EMAIL_TAKEN",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Token(e) => e.code(),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// User info DTO for responses.
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub is_blocked: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
            is_blocked: user.is_blocked,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

/// Login result containing the user and a fresh token pair.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub user: UserInfo,
    pub tokens: TokenPair,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates an active account with the `user` role.
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserInfo, AuthError>;

    /// Verifies credentials (username or email) and issues a token pair.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TooManyAttempts`] while the client is locked out,
    /// and [`AuthError::InvalidCredentials`] if the login fails.
    async fn login(
        &self,
        identifier: &str,
        password: &str,
        client: ClientInfo<'_>,
    ) -> Result<LoginResult, AuthError>;

    /// Rotates a refresh token into a new pair.
    async fn refresh(
        &self,
        refresh_token: &str,
        client: ClientInfo<'_>,
    ) -> Result<TokenPair, AuthError>;

    /// Revokes the token family of the presented token. Returns rows revoked.
    async fn logout(&self, token: &str) -> Result<u64, AuthError>;

    async fn get_user_info(&self, user_id: i32) -> Result<UserInfo, AuthError>;

    /// Changes a user's password and revokes all of their tokens.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] if current password is incorrect or new password invalid.
    async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    /// Resolves a bearer access token to its active owner.
    async fn authenticate_access_token(&self, raw: &str) -> Result<CurrentUser, AuthError>;

    /// Loads a user known from a session, rejecting inactive or blocked accounts.
    async fn current_user(&self, user_id: i32) -> Result<CurrentUser, AuthError>;

    /// Resolves a cookie session opened together with the token family
    /// `family_id`. Revoking or expiring the family ends the session.
    async fn session_user(
        &self,
        user_id: i32,
        family_id: &str,
    ) -> Result<CurrentUser, AuthError>;
}
