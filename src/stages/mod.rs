//! Stage functions - the four units of work in a refinement run.
//!
//! Each stage renders its own request from a read-only view of the state,
//! calls the generation capability once, extracts a typed result and hands
//! back a `StateUpdate`. Stages never mutate state; the controller merges
//! what they return.

mod apply;
mod decompose;
mod evaluate;
mod plan;

pub use apply::ApplyRevision;
pub use decompose::DecomposeGoal;
pub use evaluate::{EVALUATE_TEMPERATURE, EvaluateResult};
pub use plan::{NO_FEEDBACK, PlanRevision};

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{LoopState, StageName, StateField, StateUpdate};
use crate::error::{RefinrError, Result};
use crate::extract::{self, Shape};
use crate::llm::{CompletionRequest, LlmClient};
use crate::prompt::PromptRenderer;

/// One named unit of work in the loop
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> StageName;

    /// State fields the stage reads
    fn reads(&self) -> &'static [StateField];

    /// State fields the stage's update may write
    fn writes(&self) -> &'static [StateField];

    /// Produce this stage's update from the current state
    async fn run(&self, state: &LoopState) -> Result<StateUpdate>;
}

/// Per-stage sampling settings
#[derive(Debug, Clone, PartialEq)]
pub struct StageOptions {
    pub decompose_temperature: f32,
    pub plan_temperature: f32,
    pub apply_temperature: f32,
    /// Upper bound on generated tokens; None defers to the client
    pub max_tokens: Option<u32>,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            decompose_temperature: 0.2,
            plan_temperature: 0.5,
            apply_temperature: 0.7,
            max_tokens: None,
        }
    }
}

/// What every stage needs to talk to the generation service
#[derive(Clone)]
pub struct StageContext {
    llm: Arc<dyn LlmClient>,
    renderer: Arc<PromptRenderer>,
    max_tokens: Option<u32>,
}

impl StageContext {
    pub fn new(llm: Arc<dyn LlmClient>, renderer: Arc<PromptRenderer>) -> Self {
        Self {
            llm,
            renderer,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn render<T: serde::Serialize>(&self, stage: StageName, context: &T) -> Result<String> {
        self.renderer.render_stage(stage, context)
    }

    /// Send one rendered request and extract shape `S` from the reply
    async fn generate<S: Shape>(
        &self,
        stage: StageName,
        prompt: String,
        temperature: f32,
    ) -> Result<S> {
        let mut request = CompletionRequest::default()
            .with_user_message(prompt)
            .with_temperature(temperature);
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|source| RefinrError::Transport { stage, source })?;

        log::debug!(
            "{} stage received {} bytes ({} output tokens)",
            stage,
            response.content.len(),
            response.usage.output_tokens
        );

        extract::extract::<S>(&response.content)
            .map_err(|source| RefinrError::Malformed { stage, source })
    }
}

/// The four stages in run order
#[derive(Clone)]
pub struct StageSet {
    pub decompose: Arc<dyn Stage>,
    pub plan: Arc<dyn Stage>,
    pub apply: Arc<dyn Stage>,
    pub evaluate: Arc<dyn Stage>,
}

impl StageSet {
    /// Standard stages backed by one generation client
    pub fn new(context: StageContext, options: &StageOptions) -> Self {
        Self {
            decompose: Arc::new(DecomposeGoal::new(context.clone(), options.decompose_temperature)),
            plan: Arc::new(PlanRevision::new(context.clone(), options.plan_temperature)),
            apply: Arc::new(ApplyRevision::new(context.clone(), options.apply_temperature)),
            evaluate: Arc::new(EvaluateResult::new(context)),
        }
    }

    pub fn get(&self, name: StageName) -> &Arc<dyn Stage> {
        match name {
            StageName::Decompose => &self.decompose,
            StageName::Plan => &self.plan,
            StageName::Apply => &self.apply,
            StageName::Evaluate => &self.evaluate,
        }
    }
}

/// Fetch a field a stage depends on, or report which one is missing
fn require<T>(value: Option<T>, stage: StageName, field: StateField) -> Result<T> {
    value.ok_or(RefinrError::MissingInput { stage, field })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::domain::{Criterion, RunInputs};
    use crate::llm::MockLlmClient;

    pub fn context(mock: Arc<MockLlmClient>) -> StageContext {
        StageContext::new(mock, Arc::new(PromptRenderer::builtin().unwrap()))
    }

    pub fn fresh_state() -> LoopState {
        LoopState::new(RunInputs::new(
            "Write a financial analysis for a company.",
            "Include the company's name, current price and financial statements.",
        ))
    }

    pub fn decomposed_state() -> LoopState {
        let mut state = fresh_state();
        state.apply(StateUpdate::new().with_criteria(vec![
            Criterion::new("Name the company"),
            Criterion::new("Include the balance sheet"),
        ]));
        state
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::llm::{LlmError, MockLlmClient, MockResponse};

    #[test]
    fn test_stage_options_default_temperatures() {
        let options = StageOptions::default();
        assert_eq!(options.decompose_temperature, 0.2);
        assert_eq!(options.plan_temperature, 0.5);
        assert_eq!(options.apply_temperature, 0.7);
        assert!(options.max_tokens.is_none());
    }

    #[test]
    fn test_stage_set_names() {
        let mock = Arc::new(MockLlmClient::new());
        let stages = StageSet::new(context(mock), &StageOptions::default());
        for name in [StageName::Decompose, StageName::Plan, StageName::Apply, StageName::Evaluate] {
            assert_eq!(stages.get(name).name(), name);
        }
    }

    #[test]
    fn test_only_apply_writes_iteration_count() {
        let mock = Arc::new(MockLlmClient::new());
        let stages = StageSet::new(context(mock), &StageOptions::default());
        for name in [StageName::Decompose, StageName::Plan, StageName::Apply, StageName::Evaluate] {
            let writes = stages.get(name).writes().contains(&StateField::IterationCount);
            assert_eq!(writes, name == StageName::Apply, "{}", name);
        }
    }

    #[test]
    fn test_every_state_field_is_used_by_a_stage() {
        let mock = Arc::new(MockLlmClient::new());
        let stages = StageSet::new(context(mock), &StageOptions::default());
        let all = [StageName::Decompose, StageName::Plan, StageName::Apply, StageName::Evaluate];
        for field in [
            StateField::Goal,
            StateField::InitialArtifact,
            StateField::Criteria,
            StateField::Plan,
            StateField::Artifact,
            StateField::Evaluation,
            StateField::IterationCount,
        ] {
            let used = all.iter().any(|&name| {
                let stage = stages.get(name);
                stage.reads().contains(&field) || stage.writes().contains(&field)
            });
            assert!(used, "{} is not used by any stage", field);
        }
    }

    #[tokio::test]
    async fn test_generate_maps_transport_error() {
        let mock = Arc::new(MockLlmClient::with_responses([MockResponse::Fail(LlmError::ApiError {
            status: 401,
            message: "bad key".to_string(),
        })]));
        let ctx = context(mock);
        let result = ctx
            .generate::<crate::extract::RevisionPlan>(StageName::Plan, "prompt".to_string(), 0.5)
            .await;
        assert!(matches!(result, Err(RefinrError::Transport { stage: StageName::Plan, .. })));
    }

    #[tokio::test]
    async fn test_generate_maps_malformed_output() {
        let mock = Arc::new(MockLlmClient::with_texts(["not json"]));
        let ctx = context(mock);
        let result = ctx
            .generate::<crate::extract::RevisionPlan>(StageName::Plan, "prompt".to_string(), 0.5)
            .await;
        assert!(matches!(result, Err(RefinrError::Malformed { stage: StageName::Plan, .. })));
    }

    #[tokio::test]
    async fn test_generate_passes_max_tokens() {
        let mock = Arc::new(MockLlmClient::with_texts([r#"{"plan": ["x"]}"#]));
        let ctx = context(mock.clone()).with_max_tokens(Some(512));
        ctx.generate::<crate::extract::RevisionPlan>(StageName::Plan, "prompt".to_string(), 0.5)
            .await
            .unwrap();
        assert_eq!(mock.requests()[0].max_tokens, Some(512));
    }
}
