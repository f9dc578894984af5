//! Error types for Refinr
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::domain::{StageName, StateField};
use crate::extract::ExtractError;
use crate::llm::LlmError;

/// All error types that can occur in Refinr
#[derive(Debug, Error)]
pub enum RefinrError {
    /// Generated text could not be extracted into the stage's output shape
    #[error("Malformed output in {stage} stage: {source}")]
    Malformed {
        stage: StageName,
        #[source]
        source: ExtractError,
    },

    /// The generation service itself failed (network, auth, quota)
    #[error("Transport error in {stage} stage: {source}")]
    Transport {
        stage: StageName,
        #[source]
        source: LlmError,
    },

    /// Run was cancelled before or during a stage
    #[error("Run cancelled at {stage} stage")]
    Cancelled { stage: StageName },

    /// A stage ran before the state field it reads was committed
    #[error("{stage} stage requires {field}, which has not been produced yet")]
    MissingInput { stage: StageName, field: StateField },

    /// Caller-supplied run inputs were rejected
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Prompt template could not be registered or rendered
    #[error("Template error: {0}")]
    Template(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl RefinrError {
    /// The stage this error is attributed to, if any
    pub fn stage(&self) -> Option<StageName> {
        match self {
            RefinrError::Malformed { stage, .. }
            | RefinrError::Transport { stage, .. }
            | RefinrError::Cancelled { stage }
            | RefinrError::MissingInput { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, RefinrError::Malformed { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, RefinrError::Transport { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RefinrError::Cancelled { .. })
    }
}

/// Result type alias for Refinr operations
pub type Result<T> = std::result::Result<T, RefinrError>;
