//! ApplyRevision - execute the plan and produce the next artifact version.

use async_trait::async_trait;
use serde::Serialize;

use super::{Stage, StageContext, require};
use crate::domain::{LoopState, RevisionStep, StageName, StateField, StateUpdate};
use crate::error::Result;
use crate::extract::{RevisedArtifact, format_instructions};

#[derive(Serialize)]
struct ApplyContext<'a> {
    artifact: &'a str,
    plan: &'a [RevisionStep],
    format_instructions: String,
}

/// The only stage that advances `iteration_count`
pub struct ApplyRevision {
    context: StageContext,
    temperature: f32,
}

impl ApplyRevision {
    pub fn new(context: StageContext, temperature: f32) -> Self {
        Self { context, temperature }
    }
}

#[async_trait]
impl Stage for ApplyRevision {
    fn name(&self) -> StageName {
        StageName::Apply
    }

    fn reads(&self) -> &'static [StateField] {
        &[StateField::Artifact, StateField::Plan, StateField::IterationCount]
    }

    fn writes(&self) -> &'static [StateField] {
        &[StateField::Artifact, StateField::IterationCount]
    }

    async fn run(&self, state: &LoopState) -> Result<StateUpdate> {
        let plan = require(state.plan.as_deref(), self.name(), StateField::Plan)?;

        let prompt = self.context.render(
            self.name(),
            &ApplyContext {
                artifact: state.artifact.as_str(),
                plan,
                format_instructions: format_instructions::<RevisedArtifact>(),
            },
        )?;

        let revised: RevisedArtifact = self
            .context
            .generate(self.name(), prompt, self.temperature)
            .await?;
        let iteration = state.iteration_count + 1;
        log::info!("Generated artifact version {}", iteration);

        Ok(StateUpdate::new()
            .with_artifact(revised.into_artifact())
            .with_iteration_count(iteration))
    }
}
