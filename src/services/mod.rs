pub mod admin;
pub use admin::{AdminError, AdminService, BulkSummary, TestAction, UserAction};

pub mod ai_draft;
pub mod ai_service;
pub mod ai_service_impl;
pub use ai_service::{AiError, AiService};
pub use ai_service_impl::SeaOrmAiService;

pub mod attempt_service;
pub mod attempt_service_impl;
pub use attempt_service::{AttemptError, AttemptService};
pub use attempt_service_impl::SeaOrmAttemptService;

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, LoginResult, UserInfo};
pub use auth_service_impl::SeaOrmAuthService;

pub mod catalog;
pub use catalog::CatalogService;

pub mod content;

pub mod logs;
pub use logs::LogService;

pub mod maintenance;
pub use maintenance::MaintenanceService;

pub mod quiz_service;
pub mod quiz_service_impl;
pub use quiz_service::{QuizError, QuizService};
pub use quiz_service_impl::SeaOrmQuizService;

pub mod scheduler;
pub use scheduler::Scheduler;

pub mod scoring;

pub mod throttle;
pub use throttle::LoginThrottle;

pub mod token_service;
pub use token_service::{ApiTokenService, TokenError};
