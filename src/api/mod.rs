use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::Config;
use crate::services::{
    AdminService, AiService, AttemptService, AuthService, CatalogService, QuizService,
};
use crate::state::SharedState;

mod admin;
mod ai;
mod attempts;
pub mod auth;
mod catalog;
mod error;
mod observability;
mod quizzes;
mod system;
mod types;
mod validation;

pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn auth(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<CatalogService> {
        &self.shared.catalog
    }

    #[must_use]
    pub fn quizzes(&self) -> &Arc<dyn QuizService> {
        &self.shared.quiz_service
    }

    #[must_use]
    pub fn attempts(&self) -> &Arc<dyn AttemptService> {
        &self.shared.attempt_service
    }

    #[must_use]
    pub fn ai(&self) -> &Arc<dyn AiService> {
        &self.shared.ai_service
    }

    #[must_use]
    pub fn admin(&self) -> &Arc<AdminService> {
        &self.shared.admin_service
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub async fn router(state: Arc<AppState>) -> Router {
    let (cors_origins, secure_cookies) = {
        let config = state.config().read().await;
        (
            config.server.cors_allowed_origins.clone(),
            config.server.secure_cookies,
        )
    };

    let protected_routes = create_protected_router(state.clone());

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(60)));

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/health", get(system::health))
        .route("/languages", get(catalog::list_languages))
        .route("/categories", get(catalog::list_categories))
        .route("/difficulties", get(catalog::list_difficulties))
        .layer(session_layer)
        .with_state(state);

    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(middleware::from_fn(observability::logging_middleware))
        .layer(TraceLayer::new_for_http())
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/password", put(auth::change_password))
        .route("/tests", get(quizzes::list_tests))
        .route("/tests", post(quizzes::create_test))
        .route("/tests/{id}", get(quizzes::get_test))
        .route("/tests/{id}", put(quizzes::update_test))
        .route("/tests/{id}", delete(quizzes::delete_test))
        .route(
            "/tests/{id}/translations/{lang}",
            put(quizzes::upsert_test_translation),
        )
        .route("/tests/{id}/questions", post(quizzes::add_question))
        .route("/questions/{id}", delete(quizzes::delete_question))
        .route(
            "/questions/{id}/translations/{lang}",
            put(quizzes::upsert_question_translation),
        )
        .route(
            "/answers/{id}/translations/{lang}",
            put(quizzes::upsert_answer_translation),
        )
        .route("/tests/{id}/attempts", post(attempts::start_attempt))
        .route("/attempts", get(attempts::list_attempts))
        .route("/attempts/{id}", get(attempts::get_attempt))
        .route("/attempts/{id}/submit", post(attempts::submit_attempt))
        .route("/ai/quiz-drafts", post(ai::create_quiz_draft))
        .route("/ai/explanations", post(ai::explain_answer))
        .route("/ai/requests", get(ai::list_requests))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/bulk", post(admin::bulk_users))
        .route(
            "/admin/users/{id}/revoke-tokens",
            post(admin::revoke_user_tokens),
        )
        .route("/admin/tests/bulk", post(admin::bulk_tests))
        .route("/admin/tokens/cleanup", post(admin::cleanup_tokens))
        .route("/system/logs", get(system::get_logs))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
