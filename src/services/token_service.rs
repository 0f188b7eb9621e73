//! Opaque API tokens with refresh rotation and reuse detection.
//!
//! A bearer value is `<token_id>.<secret>`. The token id is public and indexed;
//! only the SHA-256 of the secret is stored. Every login starts a token family.
//! Rotating a refresh token marks it used and issues a new pair in the same
//! family, so presenting a used refresh token again means someone kept a copy:
//! the whole family is revoked.

use chrono::{DateTime, Duration, Utc};
use sea_orm::{ConnectionTrait, TransactionTrait};
use serde::Serialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::TokenConfig;
use crate::db::Store;
use crate::db::repositories::token::{NewApiToken, TokenRepository};
use crate::domain::TokenType;
use crate::domain::events::AppEvent;
use crate::entities::api_tokens;

const TOKEN_ID_BYTES: usize = 16;
const SECRET_BYTES: usize = 32;

pub const REASON_REUSE_DETECTED: &str = "reuse_detected";
pub const REASON_LOGOUT: &str = "logout";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token is invalid")]
    Invalid,

    #[error("Token has expired")]
    Expired,

    #[error("Token has been revoked")]
    Revoked,

    #[error("Refresh token was already used")]
    Reused,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TokenError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Invalid => "TOKEN_INVALID",
            Self::Expired => "TOKEN_EXPIRED",
            Self::Revoked => "TOKEN_REVOKED",
            Self::Reused => "TOKEN_REUSED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<sea_orm::DbErr> for TokenError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for TokenError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Both halves of a freshly issued pair. The raw values are only ever
/// available here.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub access_expires_in: i64,
    pub refresh_expires_in: i64,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub family_id: String,
    #[serde(skip)]
    pub user_id: i32,
    #[serde(skip)]
    pub refresh_row_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedToken {
    pub id: i32,
    pub token_id: String,
    pub user_id: i32,
    pub token_type: TokenType,
    pub family_id: String,
    pub expires_at: DateTime<Utc>,
}

impl From<&api_tokens::Model> for ValidatedToken {
    fn from(model: &api_tokens::Model) -> Self {
        Self {
            id: model.id,
            token_id: model.token_id.clone(),
            user_id: model.user_id,
            token_type: model.token_type.parse().unwrap_or(TokenType::Access),
            family_id: model.family_id.clone(),
            expires_at: model.expires_at,
        }
    }
}

/// Client metadata recorded on issued tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientInfo<'a> {
    pub ip: Option<&'a str>,
    pub user_agent: Option<&'a str>,
}

pub struct ApiTokenService {
    store: Store,
    config: TokenConfig,
    event_bus: broadcast::Sender<AppEvent>,
}

impl ApiTokenService {
    #[must_use]
    pub const fn new(
        store: Store,
        config: TokenConfig,
        event_bus: broadcast::Sender<AppEvent>,
    ) -> Self {
        Self {
            store,
            config,
            event_bus,
        }
    }

    /// Issues an access/refresh pair. Without `family_id` a new family starts.
    pub async fn issue_token_pair(
        &self,
        user_id: i32,
        client: ClientInfo<'_>,
        family_id: Option<&str>,
        parent_refresh_id: Option<i32>,
    ) -> Result<TokenPair, TokenError> {
        let family_id = family_id.map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_string);
        let pair = self
            .insert_pair(
                &self.store.conn,
                user_id,
                client,
                &family_id,
                parent_refresh_id,
            )
            .await?;

        info!(user_id, family_id = %pair.family_id, "Issued token pair");
        Ok(pair)
    }

    /// Checks a presented bearer value. Successful access-token checks bump
    /// `last_used_at`.
    pub async fn validate_token(
        &self,
        raw: &str,
        expected: TokenType,
    ) -> Result<ValidatedToken, TokenError> {
        let model = self.lookup(raw, Some(expected)).await?;
        let now = Utc::now();
        check_state(&model, now)?;

        if expected == TokenType::Access {
            self.store.tokens().touch_last_used(model.id, now).await?;
        }

        Ok(ValidatedToken::from(&model))
    }

    pub async fn rotate_refresh_token(
        &self,
        raw: &str,
        client: ClientInfo<'_>,
    ) -> Result<TokenPair, TokenError> {
        let presented = self.lookup(raw, Some(TokenType::Refresh)).await?;
        let now = Utc::now();

        match check_state(&presented, now) {
            Ok(()) => {}
            Err(TokenError::Reused) => return Err(self.handle_reuse(&presented).await),
            Err(e) => return Err(e),
        }

        let txn = self.store.conn.begin().await?;
        let tokens = TokenRepository::new(&txn);

        if !tokens.claim_unused(presented.id, now).await? {
            txn.rollback().await?;
            return Err(self.handle_reuse(&presented).await);
        }

        let pair = self
            .insert_pair(
                &txn,
                presented.user_id,
                client,
                &presented.family_id,
                Some(presented.id),
            )
            .await?;
        tokens
            .set_replaced_by(presented.id, pair.refresh_row_id)
            .await?;

        txn.commit().await?;

        info!(
            user_id = presented.user_id,
            family_id = %presented.family_id,
            "Rotated refresh token"
        );
        Ok(pair)
    }

    /// Sessions opened at login stay valid while their token family is.
    pub async fn ensure_family_live(&self, family_id: &str) -> Result<(), TokenError> {
        if self.store.tokens().family_is_live(family_id, Utc::now()).await? {
            Ok(())
        } else {
            Err(TokenError::Revoked)
        }
    }

    /// Revokes the family of the presented token, whichever half it is.
    pub async fn revoke_token(&self, raw: &str) -> Result<u64, TokenError> {
        let model = self.lookup(raw, None).await?;
        self.revoke_family(&model.family_id, REASON_LOGOUT).await
    }

    pub async fn revoke_family(&self, family_id: &str, reason: &str) -> Result<u64, TokenError> {
        let revoked = self.store.tokens().revoke_family(family_id, reason).await?;

        if revoked > 0 {
            let _ = self.event_bus.send(AppEvent::TokenFamilyRevoked {
                family_id: family_id.to_string(),
                reason: reason.to_string(),
                revoked,
            });
        }

        Ok(revoked)
    }

    pub async fn revoke_all_for_user(&self, user_id: i32, reason: &str) -> Result<u64, TokenError> {
        let revoked = self
            .store
            .tokens()
            .revoke_all_for_user(user_id, reason)
            .await?;

        if revoked > 0 {
            info!(user_id, revoked, reason, "Revoked all tokens for user");
            let _ = self.event_bus.send(AppEvent::UserTokensRevoked {
                user_id,
                reason: reason.to_string(),
                revoked,
            });
        }

        Ok(revoked)
    }

    /// Deletes expired tokens and tokens revoked more than `retention_days` ago.
    pub async fn cleanup(&self, retention_days: i64) -> Result<u64, TokenError> {
        let now = Utc::now();
        let deleted = self
            .store
            .tokens()
            .delete_stale(now, now - Duration::days(retention_days))
            .await?;

        info!(deleted, retention_days, "Token cleanup finished");
        let _ = self.event_bus.send(AppEvent::TokensCleanedUp { deleted });

        Ok(deleted)
    }

    #[must_use]
    pub const fn config(&self) -> &TokenConfig {
        &self.config
    }

    async fn lookup(
        &self,
        raw: &str,
        expected: Option<TokenType>,
    ) -> Result<api_tokens::Model, TokenError> {
        let (token_id, secret) = parse_bearer(raw).ok_or(TokenError::Invalid)?;

        let model = self
            .store
            .tokens()
            .find_by_token_id(token_id)
            .await?
            .ok_or(TokenError::Invalid)?;

        if !hashes_match(&model.token_hash, &hash_secret(secret)) {
            return Err(TokenError::Invalid);
        }

        if let Some(expected) = expected
            && model.token_type != expected.as_str()
        {
            return Err(TokenError::Invalid);
        }

        Ok(model)
    }

    async fn handle_reuse(&self, presented: &api_tokens::Model) -> TokenError {
        metrics::counter!("auth_token_reuse_detected_total").increment(1);

        let revoked = match self
            .store
            .tokens()
            .revoke_family(&presented.family_id, REASON_REUSE_DETECTED)
            .await
        {
            Ok(n) => n,
            Err(e) => return TokenError::Internal(e.to_string()),
        };

        warn!(
            user_id = presented.user_id,
            family_id = %presented.family_id,
            revoked,
            "Refresh token reuse detected, family revoked"
        );
        let _ = self.event_bus.send(AppEvent::TokenReuseDetected {
            user_id: presented.user_id,
            family_id: presented.family_id.clone(),
            revoked,
        });

        TokenError::Reused
    }

    async fn insert_pair<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: i32,
        client: ClientInfo<'_>,
        family_id: &str,
        parent_refresh_id: Option<i32>,
    ) -> Result<TokenPair, TokenError> {
        let tokens = TokenRepository::new(db);
        let now = Utc::now();
        let access_ttl = Duration::minutes(self.config.access_ttl_minutes);
        let refresh_ttl = Duration::days(self.config.refresh_ttl_days);

        let (refresh_token, refresh_id, refresh_hash) = generate_token();
        let refresh_row = tokens
            .insert(NewApiToken {
                token_id: refresh_id,
                user_id,
                token_hash: refresh_hash,
                token_type: TokenType::Refresh,
                family_id,
                parent_token_id: parent_refresh_id,
                ip_address: client.ip,
                user_agent: client.user_agent,
                expires_at: now + refresh_ttl,
            })
            .await?;

        let (access_token, access_id, access_hash) = generate_token();
        let access_row = tokens
            .insert(NewApiToken {
                token_id: access_id,
                user_id,
                token_hash: access_hash,
                token_type: TokenType::Access,
                family_id,
                parent_token_id: Some(refresh_row.id),
                ip_address: client.ip,
                user_agent: client.user_agent,
                expires_at: now + access_ttl,
            })
            .await?;

        metrics::counter!("auth_tokens_issued_total").increment(2);

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer",
            access_expires_in: access_ttl.num_seconds(),
            refresh_expires_in: refresh_ttl.num_seconds(),
            access_expires_at: access_row.expires_at,
            refresh_expires_at: refresh_row.expires_at,
            family_id: family_id.to_string(),
            user_id,
            refresh_row_id: refresh_row.id,
        })
    }
}

/// Revocation wins over reuse, reuse over expiry.
fn check_state(model: &api_tokens::Model, now: DateTime<Utc>) -> Result<(), TokenError> {
    if model.revoked_at.is_some() {
        return Err(TokenError::Revoked);
    }

    if model.token_type == TokenType::Refresh.as_str() && model.used_at.is_some() {
        return Err(TokenError::Reused);
    }

    if model.expires_at <= now {
        return Err(TokenError::Expired);
    }

    Ok(())
}

/// Splits `<token_id>.<secret>`, checking lengths and lowercase hex.
#[must_use]
pub fn parse_bearer(raw: &str) -> Option<(&str, &str)> {
    let (token_id, secret) = raw.trim().split_once('.')?;

    let is_hex = |s: &str, len: usize| {
        s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    };

    (is_hex(token_id, TOKEN_ID_BYTES * 2) && is_hex(secret, SECRET_BYTES * 2))
        .then_some((token_id, secret))
}

#[must_use]
pub fn hash_secret(secret: &str) -> String {
    to_hex(&Sha256::digest(secret.as_bytes()))
}

fn hashes_match(stored: &str, computed: &str) -> bool {
    stored.as_bytes().ct_eq(computed.as_bytes()).into()
}

/// Returns `(bearer, token_id, secret_hash)`.
fn generate_token() -> (String, String, String) {
    let token_id = random_hex::<TOKEN_ID_BYTES>();
    let secret = random_hex::<SECRET_BYTES>();
    let hash = hash_secret(&secret);
    (format!("{token_id}.{secret}"), token_id, hash)
}

fn random_hex<const N: usize>() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let mut bytes = [0u8; N];
    rng.fill(&mut bytes[..]);
    to_hex(&bytes)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut acc, b| {
            use std::fmt::Write;
            let _ = write!(acc, "{b:02x}");
            acc
        })
}
