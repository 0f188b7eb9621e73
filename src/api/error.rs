use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::services::{AdminError, AiError, AttemptError, AuthError, QuizError, TokenError};

#[derive(Debug)]
pub enum ApiError {
    NotFound {
        code: &'static str,
        message: String,
    },

    ValidationError {
        code: &'static str,
        message: String,
    },

    Unauthorized {
        code: &'static str,
        message: String,
    },

    Forbidden {
        code: &'static str,
        message: String,
    },

    Conflict {
        code: &'static str,
        message: String,
    },

    TooManyRequests {
        code: &'static str,
        message: String,
        retry_after_seconds: Option<u64>,
    },

    ServiceUnavailable {
        code: &'static str,
        message: String,
    },

    ExternalApiError {
        service: String,
        code: &'static str,
        message: String,
    },

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { message, .. } => write!(f, "Not found: {message}"),
            Self::ValidationError { message, .. } => write!(f, "Validation error: {message}"),
            Self::Unauthorized { message, .. } => write!(f, "Unauthorized: {message}"),
            Self::Forbidden { message, .. } => write!(f, "Forbidden: {message}"),
            Self::Conflict { message, .. } => write!(f, "Conflict: {message}"),
            Self::TooManyRequests { message, .. } => write!(f, "Too many requests: {message}"),
            Self::ServiceUnavailable { message, .. } => write!(f, "Unavailable: {message}"),
            Self::ExternalApiError {
                service, message, ..
            } => write!(f, "{service} error: {message}"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut retry_after = None;

        let (status, code, error_message) = match self {
            Self::NotFound { code, message } => (StatusCode::NOT_FOUND, code, message),
            Self::ValidationError { code, message } => (StatusCode::BAD_REQUEST, code, message),
            Self::Unauthorized { code, message } => (StatusCode::UNAUTHORIZED, code, message),
            Self::Forbidden { code, message } => (StatusCode::FORBIDDEN, code, message),
            Self::Conflict { code, message } => (StatusCode::CONFLICT, code, message),
            Self::TooManyRequests {
                code,
                message,
                retry_after_seconds,
            } => {
                retry_after = retry_after_seconds;
                (StatusCode::TOO_MANY_REQUESTS, code, message)
            }
            Self::ServiceUnavailable { code, message } => {
                (StatusCode::SERVICE_UNAVAILABLE, code, message)
            }
            Self::ExternalApiError {
                service,
                code,
                message,
            } => {
                tracing::warn!("{} API error: {}", service, message);
                (
                    StatusCode::BAD_GATEWAY,
                    code,
                    format!("{service} service is unavailable"),
                )
            }
            Self::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ApiResponse::<()>::error(error_message, code);
        let mut response = (status, Json(body)).into_response();

        if let Some(seconds) = retry_after
            && let Ok(value) = HeaderValue::from_str(&seconds.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }

        response
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError {
            code: "VALIDATION_ERROR",
            message: msg.into(),
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized {
            code: "UNAUTHORIZED",
            message: msg.into(),
        }
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden {
            code: "FORBIDDEN",
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Internal(msg) => Self::InternalError(msg),
            other => Self::Unauthorized {
                code: other.code(),
                message: other.to_string(),
            },
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let code = err.code();
        match err {
            AuthError::InvalidCredentials => Self::Unauthorized {
                code,
                message: err.to_string(),
            },
            AuthError::UserInactive | AuthError::UserBlocked => Self::Forbidden {
                code,
                message: err.to_string(),
            },
            AuthError::TooManyAttempts {
                retry_after_seconds,
            } => Self::TooManyRequests {
                code,
                message: err.to_string(),
                retry_after_seconds: Some(retry_after_seconds),
            },
            AuthError::UsernameTaken | AuthError::EmailTaken => Self::Conflict {
                code,
                message: err.to_string(),
            },
            AuthError::UserNotFound => Self::NotFound {
                code,
                message: err.to_string(),
            },
            AuthError::Validation(message) => Self::ValidationError { code, message },
            AuthError::Token(token) => token.into(),
            AuthError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<QuizError> for ApiError {
    fn from(err: QuizError) -> Self {
        let code = err.code();
        let message = err.to_string();
        match err {
            QuizError::Forbidden => Self::Forbidden { code, message },
            QuizError::TestNotFound
            | QuizError::QuestionNotFound
            | QuizError::AnswerNotFound
            | QuizError::LanguageNotFound(_) => Self::NotFound { code, message },
            QuizError::CategoryRequired
            | QuizError::DifficultyRequired
            | QuizError::InvalidAnswers(_)
            | QuizError::Validation(_) => Self::ValidationError { code, message },
            QuizError::TranslationExists(_) => Self::Conflict { code, message },
            QuizError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<AttemptError> for ApiError {
    fn from(err: AttemptError) -> Self {
        let code = err.code();
        let message = err.to_string();
        match err {
            AttemptError::AttemptNotFound
            | AttemptError::TestNotFound
            | AttemptError::LanguageNotFound(_) => Self::NotFound { code, message },
            AttemptError::AttemptFinished => Self::Conflict { code, message },
            AttemptError::NoQuestions
            | AttemptError::InvalidQuestion(_)
            | AttemptError::DuplicateAnswer(_) => Self::ValidationError { code, message },
            AttemptError::SubmitFailed => Self::ServiceUnavailable { code, message },
            AttemptError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<AiError> for ApiError {
    fn from(err: AiError) -> Self {
        let code = err.code();
        let message = err.to_string();
        match err {
            AiError::Disabled => Self::ServiceUnavailable { code, message },
            AiError::DailyLimit { .. } => Self::TooManyRequests {
                code,
                message,
                retry_after_seconds: None,
            },
            AiError::ProviderError(detail) | AiError::InvalidResponse(detail) => {
                Self::ExternalApiError {
                    service: "AI".to_string(),
                    code,
                    message: detail,
                }
            }
            AiError::QuestionNotFound => Self::NotFound { code, message },
            AiError::Validation(_) => Self::ValidationError { code, message },
            AiError::Quiz(quiz) => quiz.into(),
            AiError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        let code = err.code();
        match err {
            AdminError::Forbidden => Self::Forbidden {
                code,
                message: err.to_string(),
            },
            AdminError::UserNotFound => Self::NotFound {
                code,
                message: err.to_string(),
            },
            AdminError::Validation(message) => Self::ValidationError { code, message },
            AdminError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (TokenError::Reused.into(), StatusCode::UNAUTHORIZED),
            (
                AuthError::TooManyAttempts {
                    retry_after_seconds: 30,
                }
                .into(),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (AuthError::UserBlocked.into(), StatusCode::FORBIDDEN),
            (AuthError::EmailTaken.into(), StatusCode::CONFLICT),
            (QuizError::CategoryRequired.into(), StatusCode::BAD_REQUEST),
            (QuizError::TestNotFound.into(), StatusCode::NOT_FOUND),
            (AttemptError::AttemptFinished.into(), StatusCode::CONFLICT),
            (
                AiError::ProviderError("boom".to_string()).into(),
                StatusCode::BAD_GATEWAY,
            ),
            (AiError::DailyLimit { limit: 1 }.into(), StatusCode::TOO_MANY_REQUESTS),
            (AdminError::Forbidden.into(), StatusCode::FORBIDDEN),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_retry_after_header() {
        let response = ApiError::from(AuthError::TooManyAttempts {
            retry_after_seconds: 42,
        })
        .into_response();
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = ApiError::from(QuizError::Internal("disk I/O error".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
