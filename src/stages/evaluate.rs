//! EvaluateResult - score the current artifact against the criteria.
//!
//! Sufficiency is derived from the score here, never taken from the service.
//! A reported flag that disagrees with the score is logged and dropped.

use async_trait::async_trait;
use serde::Serialize;

use super::{Stage, StageContext, require};
use crate::domain::{Criterion, LoopState, StageName, StateField, StateUpdate};
use crate::error::{RefinrError, Result};
use crate::extract::{EvaluationReport, format_instructions};

/// Evaluation gates termination, so it always samples at zero temperature
pub const EVALUATE_TEMPERATURE: f32 = 0.0;

#[derive(Serialize)]
struct EvaluateContext<'a> {
    initial_artifact: &'a str,
    artifact: &'a str,
    criteria: &'a [Criterion],
    format_instructions: String,
}

/// Produces the evaluation that drives the branch decision
pub struct EvaluateResult {
    context: StageContext,
}

impl EvaluateResult {
    pub fn new(context: StageContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Stage for EvaluateResult {
    fn name(&self) -> StageName {
        StageName::Evaluate
    }

    fn reads(&self) -> &'static [StateField] {
        &[StateField::InitialArtifact, StateField::Artifact, StateField::Criteria]
    }

    fn writes(&self) -> &'static [StateField] {
        &[StateField::Evaluation]
    }

    async fn run(&self, state: &LoopState) -> Result<StateUpdate> {
        let criteria = require(state.criteria.as_deref(), self.name(), StateField::Criteria)?;

        let prompt = self.context.render(
            self.name(),
            &EvaluateContext {
                initial_artifact: state.initial_artifact.as_str(),
                artifact: state.artifact.as_str(),
                criteria,
                format_instructions: format_instructions::<EvaluationReport>(),
            },
        )?;

        let report: EvaluationReport = self
            .context
            .generate(self.name(), prompt, EVALUATE_TEMPERATURE)
            .await?;

        if report.has_inconsistent_flag() {
            log::warn!(
                "Service reported is_improvement_sufficient={:?} for score {}; using score",
                report.is_improvement_sufficient,
                report.score
            );
        }

        let evaluation = report
            .into_evaluation()
            .map_err(|source| RefinrError::Malformed { stage: self.name(), source })?;
        log::info!(
            "Evaluation: score {}/10, sufficient={}",
            evaluation.score(),
            evaluation.is_improvement_sufficient()
        );

        Ok(StateUpdate::new().with_evaluation(evaluation))
    }
}
