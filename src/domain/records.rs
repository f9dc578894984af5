//! Records produced by the stages: criteria, plan steps, artifacts, evaluations.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RefinrError, Result};

/// Lowest score an evaluation may carry
pub const MIN_SCORE: u8 = 1;

/// Highest score an evaluation may carry
pub const MAX_SCORE: u8 = 10;

/// Scores at or above this value are sufficient to stop the loop
pub const SUFFICIENCY_THRESHOLD: u8 = 8;

/// One actionable, checkable instruction derived from the goal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Criterion(String);

impl Criterion {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One planned action that transforms the current artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionStep(String);

impl RevisionStep {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The text under refinement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Artifact(String);

impl Artifact {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for Artifact {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for Artifact {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Score and rationale for one artifact version.
///
/// `is_improvement_sufficient` is derived from `score` on construction and
/// cannot be set independently, so `sufficient == (score >= 8)` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EvaluationFields")]
pub struct Evaluation {
    score: u8,
    rationale: String,
    is_improvement_sufficient: bool,
}

impl Evaluation {
    /// Build an evaluation, rejecting scores outside 1..=10
    pub fn new(score: u8, rationale: impl Into<String>) -> Result<Self> {
        if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
            return Err(RefinrError::InvalidInput(format!(
                "score {} is outside {}..={}",
                score, MIN_SCORE, MAX_SCORE
            )));
        }
        Ok(Self {
            score,
            rationale: rationale.into(),
            is_improvement_sufficient: score >= SUFFICIENCY_THRESHOLD,
        })
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    pub fn is_improvement_sufficient(&self) -> bool {
        self.is_improvement_sufficient
    }
}

/// Wire form of an evaluation; the stored flag is recomputed on load
#[derive(Deserialize)]
struct EvaluationFields {
    score: u8,
    rationale: String,
}

impl TryFrom<EvaluationFields> for Evaluation {
    type Error = RefinrError;

    fn try_from(fields: EvaluationFields) -> Result<Self> {
        Evaluation::new(fields.score, fields.rationale)
    }
}
