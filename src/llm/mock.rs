//! Scripted generation client for tests and offline runs.
//!
//! Responses are served either from a queue, in order, or from a responder
//! closure that sees each request. Every request is recorded so tests can
//! inspect exactly what each stage rendered.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::client::{LlmClient, LlmError};
use super::types::{CompletionRequest, CompletionResponse};

/// One scripted reply
#[derive(Debug)]
pub enum MockResponse {
    Text(String),
    Fail(LlmError),
}

impl MockResponse {
    pub fn text(content: impl Into<String>) -> Self {
        MockResponse::Text(content.into())
    }

    fn into_result(self) -> Result<CompletionResponse, LlmError> {
        match self {
            MockResponse::Text(content) => Ok(CompletionResponse::text(content)),
            MockResponse::Fail(err) => Err(err),
        }
    }
}

type Responder = Box<dyn Fn(&CompletionRequest) -> MockResponse + Send + Sync>;

/// Deterministic stand-in for a real generation service
pub struct MockLlmClient {
    queue: Mutex<VecDeque<MockResponse>>,
    responder: Option<Responder>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmClient {
    /// A client with nothing scripted; every call fails
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            responder: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Serve the given replies in order
    pub fn with_responses(responses: impl IntoIterator<Item = MockResponse>) -> Self {
        Self {
            queue: Mutex::new(responses.into_iter().collect()),
            ..Self::new()
        }
    }

    /// Serve the given texts in order
    pub fn with_texts<S: Into<String>>(texts: impl IntoIterator<Item = S>) -> Self {
        Self::with_responses(texts.into_iter().map(MockResponse::text))
    }

    /// Compute each reply from the request; used once the queue is empty
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> MockResponse + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new()
        }
    }

    /// Append a reply to the queue
    pub fn push(&self, response: MockResponse) {
        lock(&self.queue).push_back(response);
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let queued = lock(&self.queue).pop_front();
        let response = match (queued, &self.responder) {
            (Some(response), _) => response,
            (None, Some(responder)) => responder(&request),
            (None, None) => MockResponse::Fail(LlmError::InvalidResponse(
                "mock client has no scripted response".to_string(),
            )),
        };
        lock(&self.requests).push(request);
        response.into_result()
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
