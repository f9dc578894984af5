//! Generation client trait and transport errors

use async_trait::async_trait;
use std::time::Duration;

use super::types::{CompletionRequest, CompletionResponse};

/// Stateless generation client - each call is independent (fresh context)
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single completion request; suspends until the service responds
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Model identifier used for requests that do not name one
    fn model(&self) -> &str;

    /// Whether the client is configured well enough to send requests
    fn is_ready(&self) -> bool {
        true
    }
}

/// Errors raised by the generation service itself (transport kind)
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing API key: environment variable {env_var} not set")]
    MissingApiKey { env_var: String },

    #[error("Client error: {0}")]
    Client(String),
}
