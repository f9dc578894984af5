//! PlanRevision - plan the next revision, informed by the last evaluation.

use async_trait::async_trait;
use serde::Serialize;

use super::{Stage, StageContext, require};
use crate::domain::{Criterion, LoopState, StageName, StateField, StateUpdate};
use crate::error::Result;
use crate::extract::{RevisionPlan, format_instructions};

/// Feedback text used before any evaluation exists
pub const NO_FEEDBACK: &str = "N/A";

#[derive(Serialize)]
struct PlanContext<'a> {
    artifact: &'a str,
    criteria: &'a [Criterion],
    feedback: &'a str,
    has_feedback: bool,
    format_instructions: String,
}

/// Replaces the plan on every iteration
pub struct PlanRevision {
    context: StageContext,
    temperature: f32,
}

impl PlanRevision {
    pub fn new(context: StageContext, temperature: f32) -> Self {
        Self { context, temperature }
    }
}

/// Rationale of the previous evaluation, if there is one
fn feedback(state: &LoopState) -> Option<&str> {
    state.evaluation.as_ref().map(|e| e.rationale())
}

#[async_trait]
impl Stage for PlanRevision {
    fn name(&self) -> StageName {
        StageName::Plan
    }

    fn reads(&self) -> &'static [StateField] {
        &[StateField::Artifact, StateField::Criteria, StateField::Evaluation]
    }

    fn writes(&self) -> &'static [StateField] {
        &[StateField::Plan]
    }

    async fn run(&self, state: &LoopState) -> Result<StateUpdate> {
        let criteria = require(state.criteria.as_deref(), self.name(), StateField::Criteria)?;
        let feedback = feedback(state);

        let prompt = self.context.render(
            self.name(),
            &PlanContext {
                artifact: state.artifact.as_str(),
                criteria,
                feedback: feedback.unwrap_or(NO_FEEDBACK),
                has_feedback: feedback.is_some(),
                format_instructions: format_instructions::<RevisionPlan>(),
            },
        )?;

        let plan: RevisionPlan = self
            .context
            .generate(self.name(), prompt, self.temperature)
            .await?;
        let steps = plan.into_steps();
        log::info!(
            "Planned {} revision steps ({})",
            steps.len(),
            if feedback.is_some() { "with feedback" } else { "no feedback" }
        );

        Ok(StateUpdate::new().with_plan(steps))
    }
}
