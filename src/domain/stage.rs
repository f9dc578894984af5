//! Stage names and state field identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four stages of a refinement run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    Decompose,
    Plan,
    Apply,
    Evaluate,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Decompose => "decompose",
            StageName::Plan => "plan",
            StageName::Apply => "apply",
            StageName::Evaluate => "evaluate",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named fields of `LoopState`, used by stages to declare what they read and write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    Goal,
    InitialArtifact,
    Criteria,
    Plan,
    Artifact,
    Evaluation,
    IterationCount,
}

impl StateField {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateField::Goal => "goal",
            StateField::InitialArtifact => "initial_artifact",
            StateField::Criteria => "criteria",
            StateField::Plan => "plan",
            StateField::Artifact => "artifact",
            StateField::Evaluation => "evaluation",
            StateField::IterationCount => "iteration_count",
        }
    }
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_name_display() {
        assert_eq!(StageName::Decompose.to_string(), "decompose");
        assert_eq!(StageName::Evaluate.to_string(), "evaluate");
    }

    #[test]
    fn test_stage_name_serialization() {
        assert_eq!(serde_json::to_string(&StageName::Apply).unwrap(), "\"apply\"");
        let stage: StageName = serde_json::from_str("\"plan\"").unwrap();
        assert_eq!(stage, StageName::Plan);
    }

    #[test]
    fn test_state_field_display_matches_serde() {
        let json = serde_json::to_string(&StateField::IterationCount).unwrap();
        assert_eq!(json, format!("\"{}\"", StateField::IterationCount));
    }
}
