//! LLM Client Layer - the generation capability behind every stage
//!
//! This module provides:
//! - Message types for generation requests
//! - LlmClient trait for API abstraction
//! - AnthropicClient implementation
//! - MockLlmClient for deterministic tests

pub mod anthropic;
pub mod client;
pub mod mock;
pub mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
pub use client::{LlmClient, LlmError};
pub use mock::{MockLlmClient, MockResponse};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, Usage};
