use axum::{
    Extension, Json,
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{HeaderMap, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_sessions::Session;

use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::domain::CurrentUser;
use crate::services::throttle::client_identity;
use crate::services::token_service::{ClientInfo, TokenPair};
use crate::services::{LoginResult, UserInfo};

const SESSION_USER_KEY: &str = "user_id";
const SESSION_FAMILY_KEY: &str = "family_id";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    #[serde(alias = "username", alias = "email")]
    pub identifier: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Caller address and user agent, recorded on issued tokens and used as the
/// login throttle key.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientMeta {
    #[must_use]
    pub fn info(&self) -> ClientInfo<'_> {
        ClientInfo {
            ip: self.ip.as_deref(),
            user_agent: self.user_agent.as_deref(),
        }
    }
}

impl FromRequestParts<Arc<AppState>> for ClientMeta {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let forwarded_for = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok());

        let ip = {
            let config = state.config().read().await;
            client_identity(
                peer,
                forwarded_for,
                &config.security.auth_throttle.trusted_proxy_ips,
            )
        };

        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(|ua| ua.chars().take(255).collect());

        Ok(Self { ip, user_agent })
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves the caller from either:
/// 1. Session cookie (from login)
/// 2. `Authorization: Bearer <access token>` header
///
/// and stores it as an [`Extension<CurrentUser>`] for the handlers.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = resolve_user(&state, &headers, &session).await?;

    tracing::Span::current().record("user_id", user.id);
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

async fn resolve_user(
    state: &AppState,
    headers: &HeaderMap,
    session: &Session,
) -> Result<CurrentUser, ApiError> {
    if let Ok(Some(user_id)) = session.get::<i32>(SESSION_USER_KEY).await {
        let family_id = session
            .get::<String>(SESSION_FAMILY_KEY)
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        return match state.auth().session_user(user_id, &family_id).await {
            Ok(user) => Ok(user),
            Err(e) => {
                let _ = session.flush().await;
                Err(e.into())
            }
        };
    }

    if let Some(token) = extract_bearer(headers) {
        return Ok(state.auth().authenticate_access_token(token).await?);
    }

    Err(ApiError::unauthorized("Authentication required"))
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub fn require_admin(user: &CurrentUser) -> Result<(), ApiError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Admin role required"))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .auth()
        .register(&payload.username, &payload.email, &payload.password)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

/// POST /auth/login
/// Returns a token pair and also opens a cookie session.
pub async fn login(
    State(state): State<Arc<AppState>>,
    client: ClientMeta,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResult>>, ApiError> {
    if payload.identifier.trim().is_empty() {
        return Err(ApiError::validation("Username or email is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let result = state
        .auth()
        .login(payload.identifier.trim(), &payload.password, client.info())
        .await?;

    session.cycle_id().await.map_err(|e| ApiError::internal(format!("Session error: {e}")))?;
    session
        .insert(SESSION_USER_KEY, result.user.id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;
    session
        .insert(SESSION_FAMILY_KEY, &result.tokens.family_id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;

    Ok(Json(ApiResponse::success(result)))
}

/// POST /auth/refresh
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    client: ClientMeta,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<TokenPair>>, ApiError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(ApiError::validation("Refresh token is required"));
    }

    let pair = state
        .auth()
        .refresh(payload.refresh_token.trim(), client.info())
        .await?;

    Ok(Json(ApiResponse::success(pair)))
}

/// POST /auth/logout
/// Revokes the presented token family and ends the session.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    session: Session,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if let Some(token) = extract_bearer(&headers) {
        let revoked = state.auth().logout(token).await?;
        tracing::debug!(revoked, "Revoked token family on logout");
    }

    let _ = session.flush().await;

    Ok(Json(ApiResponse::success(MessageResponse::new("Logged out"))))
}

/// GET /auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    let info = state.auth().get_user_info(user.id).await?;
    Ok(Json(ApiResponse::success(info)))
}

/// PUT /auth/password
/// Every token of the user is revoked afterwards.
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if payload.current_password == payload.new_password {
        return Err(ApiError::validation(
            "New password must be different from current password",
        ));
    }

    state
        .auth()
        .change_password(user.id, &payload.current_password, &payload.new_password)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password updated successfully",
    ))))
}
