//! Client for OpenAI-compatible `chat/completions` endpoints.
//!
//! The API key is never logged. Only model names, latencies and token
//! counts are.

use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AiConfig;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum AiClientError {
    #[error("AI provider is not configured")]
    NotConfigured,

    #[error("AI provider returned HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        attempts: u32,
    },

    #[error("AI provider request failed: {message}")]
    Transport { message: String, attempts: u32 },

    #[error("AI provider returned an empty or unreadable response: {0}")]
    BadResponse(String),
}

impl AiClientError {
    /// True when the call was attempted more than once before failing.
    #[must_use]
    pub const fn was_retried(&self) -> bool {
        match self {
            Self::Http { attempts, .. } | Self::Transport { attempts, .. } => *attempts > 1,
            Self::NotConfigured | Self::BadResponse(_) => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub content: String,
    pub usage: Usage,
    pub model: String,
    pub duration: Duration,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenAiClient {
    pub fn new(config: &AiConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds.max(1)))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.base_url.is_empty()
    }

    /// Sends one chat completion. With `json_mode` the provider is asked for
    /// a JSON object. Rate limits, 5xx responses and transport errors are
    /// retried with a doubling delay.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        json_mode: bool,
        temperature: f32,
    ) -> Result<ChatCompletion, AiClientError> {
        if !self.is_configured() {
            return Err(AiClientError::NotConfigured);
        }

        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature,
            response_format: json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let started = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.send_once(&url, &request, attempt).await {
                Ok(response) => {
                    return Self::into_completion(response, &self.model, started.elapsed());
                }
                Err(err) if attempt <= self.max_retries && is_retryable(&err) => {
                    let delay = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt - 1);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %err,
                        "AI request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_once(
        &self,
        url: &str,
        request: &ChatCompletionRequest<'_>,
        attempt: u32,
    ) -> Result<ChatCompletionResponse, AiClientError> {
        debug!(model = %self.model, attempt, "Sending chat completion");

        let response = self
            .client
            .post(url)
            .header(USER_AGENT, concat!("lingoquiz/", env!("CARGO_PKG_VERSION")))
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| AiClientError::Transport {
                message: e.to_string(),
                attempts: attempt,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiClientError::Http {
                status: status.as_u16(),
                message: extract_error_message(&body).unwrap_or(body),
                attempts: attempt,
            });
        }

        response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| AiClientError::BadResponse(e.to_string()))
    }

    fn into_completion(
        response: ChatCompletionResponse,
        requested_model: &str,
        duration: Duration,
    ) -> Result<ChatCompletion, AiClientError> {
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AiClientError::BadResponse("no message content".to_string()))?;

        let usage = response.usage.unwrap_or_default();
        info!(
            model = requested_model,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            duration_ms = duration.as_millis(),
            "AI chat completion received"
        );

        Ok(ChatCompletion {
            content,
            usage,
            model: response
                .model
                .unwrap_or_else(|| requested_model.to_string()),
            duration,
        })
    }
}

fn is_retryable(err: &AiClientError) -> bool {
    match err {
        AiClientError::Http { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
                || StatusCode::from_u16(*status).is_ok_and(|s| s.is_server_error())
        }
        AiClientError::Transport { .. } => true,
        AiClientError::NotConfigured | AiClientError::BadResponse(_) => false,
    }
}

/// Pulls `error.message` out of a provider error body.
fn extract_error_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct Wrapper {
        error: Inner,
    }
    #[derive(Deserialize)]
    struct Inner {
        message: String,
    }

    serde_json::from_str::<Wrapper>(body)
        .ok()
        .map(|w| w.error.message)
}
