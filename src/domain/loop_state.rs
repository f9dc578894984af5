//! Loop state record and the partial updates merged into it.
//!
//! `LoopState` is owned by the controller for the whole run. Stages only ever
//! see `&LoopState` and hand back a `StateUpdate`; the controller is the sole
//! writer, which keeps every committed change visible in the run history.

use serde::{Deserialize, Serialize};

use super::records::{Artifact, Criterion, Evaluation, RevisionStep};
use super::stage::StateField;
use crate::error::{RefinrError, Result};

/// Budget used when the host does not specify one
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// Caller-supplied inputs for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInputs {
    pub initial_artifact: Artifact,
    pub goal: String,
    pub max_iterations: u32,
}

impl RunInputs {
    /// Create inputs with the default iteration budget
    pub fn new(initial_artifact: impl Into<Artifact>, goal: impl Into<String>) -> Self {
        Self {
            initial_artifact: initial_artifact.into(),
            goal: goal.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Override the iteration budget
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Reject inputs that cannot start a run
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(RefinrError::InvalidInput(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.goal.trim().is_empty() {
            return Err(RefinrError::InvalidInput("goal must not be empty".to_string()));
        }
        Ok(())
    }
}

/// The evolving record threaded through every stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopState {
    pub goal: String,

    /// Caller-supplied artifact, kept as the baseline for evaluation
    pub initial_artifact: Artifact,

    /// Set once by Decompose, fixed for the rest of the run
    pub criteria: Option<Vec<Criterion>>,

    /// Replaced wholesale by every Plan
    pub plan: Option<Vec<RevisionStep>>,

    /// The current artifact version
    pub artifact: Artifact,

    /// Latest evaluation; each Evaluate overwrites it
    pub evaluation: Option<Evaluation>,

    /// Successful Apply executions so far
    pub iteration_count: u32,

    pub max_iterations: u32,
}

impl LoopState {
    /// Fresh state for a run; the current artifact starts as the initial one
    pub fn new(inputs: RunInputs) -> Self {
        Self {
            goal: inputs.goal,
            artifact: inputs.initial_artifact.clone(),
            initial_artifact: inputs.initial_artifact,
            criteria: None,
            plan: None,
            evaluation: None,
            iteration_count: 0,
            max_iterations: inputs.max_iterations,
        }
    }

    /// Merge a stage's update. Only fields present in the update change.
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(criteria) = update.criteria {
            self.criteria = Some(criteria);
        }
        if let Some(plan) = update.plan {
            self.plan = Some(plan);
        }
        if let Some(artifact) = update.artifact {
            self.artifact = artifact;
        }
        if let Some(evaluation) = update.evaluation {
            self.evaluation = Some(evaluation);
        }
        if let Some(iteration_count) = update.iteration_count {
            self.iteration_count = iteration_count;
        }
    }

    pub fn budget_exhausted(&self) -> bool {
        self.iteration_count >= self.max_iterations
    }

    pub fn is_sufficient(&self) -> bool {
        self.evaluation
            .as_ref()
            .is_some_and(|e| e.is_improvement_sufficient())
    }
}

/// Typed partial update returned by a stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criteria: Option<Vec<Criterion>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<RevisionStep>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration_count: Option<u32>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_criteria(mut self, criteria: Vec<Criterion>) -> Self {
        self.criteria = Some(criteria);
        self
    }

    pub fn with_plan(mut self, plan: Vec<RevisionStep>) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn with_evaluation(mut self, evaluation: Evaluation) -> Self {
        self.evaluation = Some(evaluation);
        self
    }

    pub fn with_iteration_count(mut self, iteration_count: u32) -> Self {
        self.iteration_count = Some(iteration_count);
        self
    }

    /// Fields this update writes, in declaration order
    pub fn fields(&self) -> Vec<StateField> {
        let mut fields = Vec::new();
        if self.criteria.is_some() {
            fields.push(StateField::Criteria);
        }
        if self.plan.is_some() {
            fields.push(StateField::Plan);
        }
        if self.artifact.is_some() {
            fields.push(StateField::Artifact);
        }
        if self.evaluation.is_some() {
            fields.push(StateField::Evaluation);
        }
        if self.iteration_count.is_some() {
            fields.push(StateField::IterationCount);
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Drop every field not in `allowed`, returning the dropped fields
    pub fn retain(&mut self, allowed: &[StateField]) -> Vec<StateField> {
        let dropped: Vec<StateField> = self
            .fields()
            .into_iter()
            .filter(|field| !allowed.contains(field))
            .collect();
        for field in &dropped {
            match field {
                StateField::Criteria => self.criteria = None,
                StateField::Plan => self.plan = None,
                StateField::Artifact => self.artifact = None,
                StateField::Evaluation => self.evaluation = None,
                StateField::IterationCount => self.iteration_count = None,
                StateField::Goal | StateField::InitialArtifact => {}
            }
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> RunInputs {
        RunInputs::new("Write a financial analysis.", "Include the balance sheet.")
    }

    #[test]
    fn test_run_inputs_default_budget() {
        assert_eq!(inputs().max_iterations, DEFAULT_MAX_ITERATIONS);
        assert!(inputs().validate().is_ok());
    }

    #[test]
    fn test_run_inputs_rejects_zero_budget() {
        let result = inputs().with_max_iterations(0).validate();
        assert!(matches!(result, Err(RefinrError::InvalidInput(_))));
    }

    #[test]
    fn test_run_inputs_rejects_blank_goal() {
        let result = RunInputs::new("text", "   ").validate();
        assert!(result.is_err());
    }

    #[test]
    fn test_new_state_starts_at_initial_artifact() {
        let state = LoopState::new(inputs());
        assert_eq!(state.artifact, state.initial_artifact);
        assert_eq!(state.iteration_count, 0);
        assert!(state.criteria.is_none());
        assert!(state.plan.is_none());
        assert!(state.evaluation.is_none());
        assert!(!state.budget_exhausted());
        assert!(!state.is_sufficient());
    }

    #[test]
    fn test_apply_merges_only_present_fields() {
        let mut state = LoopState::new(inputs());
        state.apply(StateUpdate::new().with_criteria(vec![Criterion::new("a")]));
        state.apply(StateUpdate::new().with_plan(vec![RevisionStep::new("b")]));

        assert_eq!(state.criteria.as_ref().unwrap().len(), 1);
        assert_eq!(state.plan.as_ref().unwrap()[0].as_str(), "b");
        assert_eq!(state.artifact, state.initial_artifact);
    }

    #[test]
    fn test_apply_replaces_plan_wholesale() {
        let mut state = LoopState::new(inputs());
        let first = vec![RevisionStep::new("one"), RevisionStep::new("two")];
        state.apply(StateUpdate::new().with_plan(first));
        state.apply(StateUpdate::new().with_plan(vec![RevisionStep::new("three")]));
        assert_eq!(state.plan.unwrap(), vec![RevisionStep::new("three")]);
    }

    #[test]
    fn test_budget_exhausted() {
        let mut state = LoopState::new(inputs().with_max_iterations(2));
        state.apply(StateUpdate::new().with_iteration_count(1));
        assert!(!state.budget_exhausted());
        state.apply(StateUpdate::new().with_iteration_count(2));
        assert!(state.budget_exhausted());
    }

    #[test]
    fn test_update_fields() {
        let update = StateUpdate::new()
            .with_artifact(Artifact::from("v2"))
            .with_iteration_count(1);
        assert_eq!(update.fields(), vec![StateField::Artifact, StateField::IterationCount]);
        assert!(!update.is_empty());
        assert!(StateUpdate::new().is_empty());
    }

    #[test]
    fn test_update_retain_drops_undeclared_fields() {
        let mut update = StateUpdate::new()
            .with_plan(vec![RevisionStep::new("x")])
            .with_iteration_count(7);

        let dropped = update.retain(&[StateField::Plan]);

        assert_eq!(dropped, vec![StateField::IterationCount]);
        assert!(update.iteration_count.is_none());
        assert_eq!(update.fields(), vec![StateField::Plan]);
    }

    #[test]
    fn test_update_serialization_skips_absent_fields() {
        let update = StateUpdate::new().with_iteration_count(3);
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"iteration_count":3}"#);
    }
}
