//! Output shapes for the four stages.

use serde::Deserialize;

use super::{ExtractError, FieldSpec, Shape};
use crate::domain::{
    Artifact, Criterion, Evaluation, MAX_SCORE, MIN_SCORE, RevisionStep, SUFFICIENCY_THRESHOLD,
};

/// Criteria derived from the goal
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DecomposedGoal {
    pub criteria: Vec<String>,
}

impl DecomposedGoal {
    pub fn into_criteria(self) -> Vec<Criterion> {
        self.criteria.into_iter().map(Criterion::new).collect()
    }
}

impl Shape for DecomposedGoal {
    const NAME: &'static str = "DecomposedGoal";

    fn fields() -> &'static [FieldSpec] {
        &[FieldSpec {
            name: "criteria",
            kind: "array of strings",
            description: "specific, actionable, verifiable criteria; one instruction per entry",
            required: true,
        }]
    }

    fn validate(&self) -> Result<(), ExtractError> {
        non_empty_list(Self::NAME, "criteria", &self.criteria)
    }
}

/// Ordered revision steps
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RevisionPlan {
    pub plan: Vec<String>,
}

impl RevisionPlan {
    pub fn into_steps(self) -> Vec<RevisionStep> {
        self.plan.into_iter().map(RevisionStep::new).collect()
    }
}

impl Shape for RevisionPlan {
    const NAME: &'static str = "RevisionPlan";

    fn fields() -> &'static [FieldSpec] {
        &[FieldSpec {
            name: "plan",
            kind: "array of strings",
            description: "step-by-step actions to revise the artifact, in order",
            required: true,
        }]
    }

    fn validate(&self) -> Result<(), ExtractError> {
        non_empty_list(Self::NAME, "plan", &self.plan)
    }
}

/// The full text of the revised artifact
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RevisedArtifact {
    pub revised_artifact: String,
}

impl RevisedArtifact {
    pub fn into_artifact(self) -> Artifact {
        Artifact::from(self.revised_artifact)
    }
}

impl Shape for RevisedArtifact {
    const NAME: &'static str = "RevisedArtifact";

    fn fields() -> &'static [FieldSpec] {
        &[FieldSpec {
            name: "revised_artifact",
            kind: "string",
            description: "the complete text of the revised artifact, with no commentary",
            required: true,
        }]
    }

    fn validate(&self) -> Result<(), ExtractError> {
        if self.revised_artifact.trim().is_empty() {
            return Err(ExtractError::constraint(Self::NAME, "revised_artifact is empty"));
        }
        Ok(())
    }
}

/// Score and rationale as reported by the service.
///
/// `is_improvement_sufficient` is accepted but never trusted; the evaluation
/// built from this report derives sufficiency from the score.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EvaluationReport {
    pub score: i64,
    pub rationale: String,
    #[serde(default)]
    pub is_improvement_sufficient: Option<bool>,
}

impl EvaluationReport {
    /// Whether the service's own sufficiency flag disagrees with its score
    pub fn has_inconsistent_flag(&self) -> bool {
        self.is_improvement_sufficient
            .is_some_and(|flag| flag != (self.score >= i64::from(SUFFICIENCY_THRESHOLD)))
    }

    pub fn into_evaluation(self) -> Result<Evaluation, ExtractError> {
        let score = u8::try_from(self.score).map_err(|_| {
            let message = format!("score {} is not a valid score", self.score);
            ExtractError::constraint(Self::NAME, message)
        })?;
        Evaluation::new(score, self.rationale)
            .map_err(|e| ExtractError::constraint(Self::NAME, e.to_string()))
    }
}

impl Shape for EvaluationReport {
    const NAME: &'static str = "EvaluationReport";

    fn fields() -> &'static [FieldSpec] {
        &[
            FieldSpec {
                name: "score",
                kind: "integer",
                description: "overall score from 1 (no improvement) to 10 (every criterion met)",
                required: true,
            },
            FieldSpec {
                name: "rationale",
                kind: "string",
                description: "what was done well and what is still missing",
                required: true,
            },
            FieldSpec {
                name: "is_improvement_sufficient",
                kind: "boolean",
                description: "true if the score is 8 or higher",
                required: false,
            },
        ]
    }

    fn validate(&self) -> Result<(), ExtractError> {
        if !(i64::from(MIN_SCORE)..=i64::from(MAX_SCORE)).contains(&self.score) {
            return Err(ExtractError::constraint(
                Self::NAME,
                format!("score {} is outside {}..={}", self.score, MIN_SCORE, MAX_SCORE),
            ));
        }
        if self.rationale.trim().is_empty() {
            return Err(ExtractError::constraint(Self::NAME, "rationale is empty"));
        }
        Ok(())
    }
}

fn non_empty_list(shape: &'static str, field: &str, items: &[String]) -> Result<(), ExtractError> {
    if items.is_empty() {
        return Err(ExtractError::constraint(shape, format!("{} is empty", field)));
    }
    if let Some(pos) = items.iter().position(|item| item.trim().is_empty()) {
        return Err(ExtractError::constraint(shape, format!("{}[{}] is blank", field, pos)));
    }
    Ok(())
}
