//! DecomposeGoal - turn the goal into a fixed list of criteria.

use async_trait::async_trait;
use serde::Serialize;

use super::{Stage, StageContext};
use crate::domain::{LoopState, StageName, StateField, StateUpdate};
use crate::error::Result;
use crate::extract::{DecomposedGoal, format_instructions};

#[derive(Serialize)]
struct DecomposeContext<'a> {
    initial_artifact: &'a str,
    goal: &'a str,
    format_instructions: String,
}

/// Derives criteria once per run and initializes the current artifact
pub struct DecomposeGoal {
    context: StageContext,
    temperature: f32,
}

impl DecomposeGoal {
    pub fn new(context: StageContext, temperature: f32) -> Self {
        Self { context, temperature }
    }
}

#[async_trait]
impl Stage for DecomposeGoal {
    fn name(&self) -> StageName {
        StageName::Decompose
    }

    fn reads(&self) -> &'static [StateField] {
        &[StateField::InitialArtifact, StateField::Goal]
    }

    fn writes(&self) -> &'static [StateField] {
        &[StateField::Criteria, StateField::Artifact]
    }

    async fn run(&self, state: &LoopState) -> Result<StateUpdate> {
        let prompt = self.context.render(
            self.name(),
            &DecomposeContext {
                initial_artifact: state.initial_artifact.as_str(),
                goal: &state.goal,
                format_instructions: format_instructions::<DecomposedGoal>(),
            },
        )?;

        let decomposed: DecomposedGoal = self
            .context
            .generate(self.name(), prompt, self.temperature)
            .await?;
        let criteria = decomposed.into_criteria();
        log::info!("Decomposed goal into {} criteria", criteria.len());

        Ok(StateUpdate::new()
            .with_criteria(criteria)
            .with_artifact(state.initial_artifact.clone()))
    }
}
