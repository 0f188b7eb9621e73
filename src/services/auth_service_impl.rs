//! `SeaORM` implementation of the `AuthService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::SecurityConfig;
use crate::db::Store;
use crate::db::repositories::user::{NewUser, User, hash_password_blocking};
use crate::domain::events::AppEvent;
use crate::domain::{CurrentUser, Role, TokenType};
use crate::services::auth_service::{AuthError, AuthService, LoginResult, UserInfo};
use crate::services::throttle::LoginThrottle;
use crate::services::token_service::{ApiTokenService, ClientInfo, TokenPair};

const REASON_PASSWORD_CHANGED: &str = "password_changed";
const REASON_ACCOUNT_DISABLED: &str = "account_disabled";
const UNKNOWN_CLIENT: &str = "unknown";

pub struct SeaOrmAuthService {
    store: Store,
    tokens: Arc<ApiTokenService>,
    throttle: Arc<LoginThrottle>,
    security: SecurityConfig,
    event_bus: broadcast::Sender<AppEvent>,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(
        store: Store,
        tokens: Arc<ApiTokenService>,
        throttle: Arc<LoginThrottle>,
        security: SecurityConfig,
        event_bus: broadcast::Sender<AppEvent>,
    ) -> Self {
        Self {
            store,
            tokens,
            throttle,
            security,
            event_bus,
        }
    }

    async fn load_user(&self, user_id: i32) -> Result<User, AuthError> {
        self.store
            .users()
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

/// Accounts that may not hold tokens.
fn ensure_usable(user: &User) -> Result<(), AuthError> {
    if user.is_blocked {
        return Err(AuthError::UserBlocked);
    }
    if !user.is_active {
        return Err(AuthError::UserInactive);
    }
    Ok(())
}

fn current_user(user: User) -> CurrentUser {
    CurrentUser {
        id: user.id,
        username: user.username,
        role: user.role,
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserInfo, AuthError> {
        let username = validate_username(username)?;
        let email = validate_email(email)?;
        validate_password(password, self.security.min_password_length)?;

        let users = self.store.users();
        if users.username_exists(username).await? {
            return Err(AuthError::UsernameTaken);
        }
        if users.email_exists(&email).await? {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password_blocking(password, &self.security).await?;
        let user = users
            .create(NewUser {
                username,
                email: &email,
                password_hash,
                role: Role::User,
            })
            .await?;

        info!(user_id = user.id, username = %user.username, "User registered");
        let _ = self.event_bus.send(AppEvent::UserRegistered {
            user_id: user.id,
            username: user.username.clone(),
        });

        Ok(UserInfo::from(user))
    }

    async fn login(
        &self,
        identifier: &str,
        password: &str,
        client: ClientInfo<'_>,
    ) -> Result<LoginResult, AuthError> {
        let key = client.ip.unwrap_or(UNKNOWN_CLIENT);

        if let Err(retry_after_seconds) = self.throttle.check(key).await {
            return Err(AuthError::TooManyAttempts {
                retry_after_seconds,
            });
        }

        let identifier = identifier.trim();
        let user = self
            .store
            .users()
            .verify_credentials(identifier, password)
            .await?;

        let Some(user) = user else {
            warn!(ip = key, "Failed login attempt");
            let _ = self.event_bus.send(AppEvent::LoginFailed {
                identifier: identifier.to_string(),
                ip: client.ip.map(str::to_string),
            });

            if let Some(retry_after_seconds) = self.throttle.record_failure(key).await {
                let _ = self.event_bus.send(AppEvent::LoginLockedOut {
                    ip: key.to_string(),
                    retry_after_seconds,
                });
            }
            return Err(AuthError::InvalidCredentials);
        };

        ensure_usable(&user)?;

        self.throttle.record_success(key).await;
        self.store.users().touch_last_login(user.id).await?;

        let tokens = self
            .tokens
            .issue_token_pair(user.id, client, None, None)
            .await?;

        info!(user_id = user.id, "User logged in");
        let _ = self.event_bus.send(AppEvent::LoginSucceeded {
            user_id: user.id,
            ip: client.ip.map(str::to_string),
        });

        let user = self.load_user(user.id).await?;
        Ok(LoginResult {
            user: UserInfo::from(user),
            tokens,
        })
    }

    async fn refresh(
        &self,
        refresh_token: &str,
        client: ClientInfo<'_>,
    ) -> Result<TokenPair, AuthError> {
        let pair = self.tokens.rotate_refresh_token(refresh_token, client).await?;

        let user = self.load_user(pair.user_id).await?;

        if let Err(e) = ensure_usable(&user) {
            self.tokens
                .revoke_family(&pair.family_id, REASON_ACCOUNT_DISABLED)
                .await?;
            return Err(e);
        }

        Ok(pair)
    }

    async fn logout(&self, token: &str) -> Result<u64, AuthError> {
        Ok(self.tokens.revoke_token(token).await?)
    }

    async fn get_user_info(&self, user_id: i32) -> Result<UserInfo, AuthError> {
        Ok(UserInfo::from(self.load_user(user_id).await?))
    }

    async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_password(new_password, self.security.min_password_length)?;

        if current_password == new_password {
            return Err(AuthError::Validation(
                "New password must be different from current password".to_string(),
            ));
        }

        let is_valid = self
            .store
            .users()
            .verify_password_for(user_id, current_password)
            .await?;

        if !is_valid {
            return Err(AuthError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        let password_hash = hash_password_blocking(new_password, &self.security).await?;
        self.store
            .users()
            .update_password_hash(user_id, password_hash)
            .await?;

        self.tokens
            .revoke_all_for_user(user_id, REASON_PASSWORD_CHANGED)
            .await?;

        info!(user_id, "Password changed");
        let _ = self.event_bus.send(AppEvent::PasswordChanged { user_id });

        Ok(())
    }

    async fn authenticate_access_token(&self, raw: &str) -> Result<CurrentUser, AuthError> {
        let token = self.tokens.validate_token(raw, TokenType::Access).await?;
        self.current_user(token.user_id).await
    }

    async fn current_user(&self, user_id: i32) -> Result<CurrentUser, AuthError> {
        let user = self.load_user(user_id).await?;
        ensure_usable(&user)?;
        Ok(current_user(user))
    }

    async fn session_user(
        &self,
        user_id: i32,
        family_id: &str,
    ) -> Result<CurrentUser, AuthError> {
        self.tokens.ensure_family_live(family_id).await?;
        self.current_user(user_id).await
    }
}

/// 3-32 characters of letters, digits, `_`, `.` or `-`.
pub fn validate_username(username: &str) -> Result<&str, AuthError> {
    let username = username.trim();

    if !(3..=32).contains(&username.chars().count()) {
        return Err(AuthError::Validation(
            "Username must be between 3 and 32 characters".to_string(),
        ));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(AuthError::Validation(
            "Username can only contain letters, numbers, '_', '.' and '-'".to_string(),
        ));
    }

    Ok(username)
}

/// Returns the normalized (trimmed, lowercase) address.
pub fn validate_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();

    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !domain.contains('@')
            && domain
                .split_once('.')
                .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
    });

    if !valid || email.len() > 254 || email.contains(char::is_whitespace) {
        return Err(AuthError::Validation("Invalid email address".to_string()));
    }

    Ok(email)
}

pub fn validate_password(password: &str, min_length: usize) -> Result<(), AuthError> {
    if password.chars().count() < min_length {
        return Err(AuthError::Validation(format!(
            "Password must be at least {min_length} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username() {
        assert_eq!(validate_username("  alice ").unwrap(), "alice");
        assert!(validate_username("a.b-c_9").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
        assert!(validate_username("bad name").is_err());
        assert!(validate_username("zażółć").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email(" Bob@Example.COM ").unwrap(), "bob@example.com");
        assert!(validate_email("bob@example").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("bob@.com").is_err());
        assert!(validate_email("bob@exa mple.com").is_err());
        assert!(validate_email("bob@a@b.com").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("12345678", 8).is_ok());
        assert!(validate_password("1234567", 8).is_err());
    }
}
