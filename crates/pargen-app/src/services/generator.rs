//! Text-generation client for the external chat-completions service.
//!
//! One request per report section: a role-setting system message, a user
//! message carrying the template plus input text, and the section's maximum
//! output token bound. Transient failures (rate limiting, server errors,
//! transport) are retried with exponential backoff; permanent failures
//! surface immediately and abort the job.

use std::{num::NonZeroU32, sync::Arc, time::Duration};

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;

use crate::config::GeneratorConfig;

type GenericRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

const API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Shared ceiling across all concurrent jobs in this process.
const REQUESTS_PER_MINUTE: u32 = 60;

/// One section-generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
    pub max_output_tokens: u32,
}

/// Errors emitted by the text-generation client.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("missing {API_KEY_ENV} environment variable")]
    MissingApiKey,
    #[error("text generation request failed: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },
    #[error("text generation service rate limited the request: {message}")]
    RateLimited { message: String },
    #[error("text generation service error (status {status}): {message}")]
    Service { status: u16, message: String },
    #[error("text generation request rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed text generation response: {message}")]
    MalformedResponse { message: String },
}

impl GenerateError {
    /// Transient errors are worth retrying with backoff; everything else is
    /// permanent and aborts the job on first occurrence.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerateError::Transport { .. }
                | GenerateError::RateLimited { .. }
                | GenerateError::Service { .. }
        )
    }
}

/// Seam between the report assembler and the external generation service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the service's text response unmodified; no post-validation of
    /// structure, length, or content. Output is not reproducible.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerateError>;
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiGenerator {
    http: Client,
    api_base_url: String,
    api_key: String,
    model: String,
    backoff: ExponentialBuilder,
    rate_limiter: Arc<GenericRateLimiter>,
}

impl OpenAiGenerator {
    /// Construct from config, taking the API key from `OPENAI_API_KEY`.
    pub fn from_env(config: &GeneratorConfig) -> Result<Self, GenerateError> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| GenerateError::MissingApiKey)?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|source| GenerateError::Transport { source })?;

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(config.min_retry_delay_ms))
            .with_max_times(config.max_retries);

        let quota = Quota::per_minute(
            NonZeroU32::new(REQUESTS_PER_MINUTE).expect("request quota is non-zero"),
        );

        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            backoff,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    async fn request_once(&self, request: &GenerationRequest) -> Result<String, GenerateError> {
        self.rate_limiter.until_ready().await;

        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            max_tokens: request.max_output_tokens,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|source| GenerateError::Transport { source })?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(classify_http_failure(status, message));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|source| GenerateError::Transport { source })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GenerateError::MalformedResponse {
                message: "response contained no message content".to_string(),
            })?;

        Ok(content)
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerateError> {
        (|| self.request_once(&request))
            .retry(self.backoff)
            .sleep(sleep)
            .when(GenerateError::is_transient)
            .notify(|err: &GenerateError, delay: Duration| {
                warn!(
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "retrying text generation request"
                );
            })
            .await
    }
}

fn classify_http_failure(status: StatusCode, message: String) -> GenerateError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        GenerateError::RateLimited { message }
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        GenerateError::Service {
            status: status.as_u16(),
            message,
        }
    } else {
        GenerateError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiErrorEnvelope>(&body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.is_empty() => "no error detail".to_string(),
        Err(_) => body,
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_transient() {
        let rate_limited = classify_http_failure(StatusCode::TOO_MANY_REQUESTS, "slow down".into());
        assert!(matches!(rate_limited, GenerateError::RateLimited { .. }));
        assert!(rate_limited.is_transient());

        let unavailable =
            classify_http_failure(StatusCode::SERVICE_UNAVAILABLE, "overloaded".into());
        assert!(matches!(unavailable, GenerateError::Service { status: 503, .. }));
        assert!(unavailable.is_transient());
    }

    #[test]
    fn quota_and_validation_errors_are_permanent() {
        let unauthorized = classify_http_failure(StatusCode::UNAUTHORIZED, "bad key".into());
        assert!(matches!(unauthorized, GenerateError::Rejected { status: 401, .. }));
        assert!(!unauthorized.is_transient());

        let malformed = GenerateError::MalformedResponse {
            message: "empty choices".to_string(),
        };
        assert!(!malformed.is_transient());
    }

    #[test]
    fn completion_response_parses_first_choice() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"section text"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).expect("valid payload");
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content);
        assert_eq!(content.as_deref(), Some("section text"));
    }
}
