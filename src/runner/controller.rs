//! LoopController - the finite-state machine that runs one refinement.
//!
//! Decomposing -> Planning -> Applying -> Evaluating, then back to Planning
//! or on to Terminal. One stage is in flight at a time. A stage's update is
//! merged only after it returns successfully, so an aborted run always
//! carries the last fully committed state.

use std::ops::ControlFlow;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::observer::RunObserver;
use crate::domain::{Decision, LoopState, RunEvent, RunInputs, StageName, StateUpdate, StopReason};
use crate::error::{RefinrError, Result};
use crate::stages::{Stage, StageSet};

/// Controller position in the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Decomposing,
    Planning,
    Applying,
    Evaluating,
    Terminal(StopReason),
}

impl Phase {
    /// Stage executed in this phase, or the stop reason once terminal
    pub fn stage(self) -> ControlFlow<StopReason, StageName> {
        match self {
            Phase::Decomposing => ControlFlow::Continue(StageName::Decompose),
            Phase::Planning => ControlFlow::Continue(StageName::Plan),
            Phase::Applying => ControlFlow::Continue(StageName::Apply),
            Phase::Evaluating => ControlFlow::Continue(StageName::Evaluate),
            Phase::Terminal(reason) => ControlFlow::Break(reason),
        }
    }

    /// Next phase after this phase's stage commits.
    ///
    /// `decision` only matters when leaving `Evaluating`.
    pub fn next(self, decision: Decision) -> Phase {
        match self {
            Phase::Decomposing => Phase::Planning,
            Phase::Planning => Phase::Applying,
            Phase::Applying => Phase::Evaluating,
            Phase::Evaluating => match decision {
                Decision::Continue => Phase::Planning,
                Decision::Stop(reason) => Phase::Terminal(reason),
            },
            Phase::Terminal(reason) => Phase::Terminal(reason),
        }
    }
}

/// Branch predicate evaluated after every Evaluate stage.
///
/// The budget is checked first, so a run that reaches `max_iterations` stops
/// as `BudgetExhausted` even when its last evaluation was sufficient.
pub fn decide(state: &LoopState) -> Decision {
    if state.budget_exhausted() {
        Decision::Stop(StopReason::BudgetExhausted)
    } else if state.is_sufficient() {
        Decision::Stop(StopReason::Sufficient)
    } else {
        Decision::Continue
    }
}

/// A run that reached its terminal state
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub state: LoopState,
    pub stop_reason: StopReason,
    /// Committed updates in execution order
    pub history: Vec<(StageName, StateUpdate)>,
}

impl RunOutcome {
    /// Stage names in the order they committed
    pub fn stages_run(&self) -> Vec<StageName> {
        self.history.iter().map(|(stage, _)| *stage).collect()
    }

    /// Replay the committed updates onto a fresh state built from `inputs`
    pub fn replay(&self, inputs: RunInputs) -> LoopState {
        let mut state = LoopState::new(inputs);
        for (_, update) in &self.history {
            state.apply(update.clone());
        }
        state
    }
}

/// A run that stopped on an error, with the state as last committed
#[derive(Debug, Error)]
#[error("run aborted: {error}")]
pub struct RunAborted {
    #[source]
    pub error: RefinrError,
    pub state: LoopState,
}

/// Drives the four stages for any number of independent runs
pub struct LoopController {
    stages: StageSet,
    observer: Option<Arc<dyn RunObserver>>,
    malformed_retries: u32,
}

impl std::fmt::Debug for LoopController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopController")
            .field("malformed_retries", &self.malformed_retries)
            .finish_non_exhaustive()
    }
}

impl LoopController {
    pub fn new(stages: StageSet) -> Self {
        Self {
            stages,
            observer: None,
            malformed_retries: 0,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Re-issue a stage up to `retries` times when its output is malformed
    pub fn with_malformed_retries(mut self, retries: u32) -> Self {
        self.malformed_retries = retries;
        self
    }

    pub fn malformed_retries(&self) -> u32 {
        self.malformed_retries
    }

    /// Run the loop to a terminal state or the first error
    pub async fn run(
        &self,
        inputs: RunInputs,
        cancel: &CancellationToken,
    ) -> std::result::Result<RunOutcome, RunAborted> {
        if let Err(error) = inputs.validate() {
            return Err(self.abort(error, LoopState::new(inputs)));
        }

        let mut state = LoopState::new(inputs);
        let mut history = Vec::new();
        let mut phase = Phase::Decomposing;

        tracing::info!(
            max_iterations = state.max_iterations,
            malformed_retries = self.malformed_retries,
            "Starting refinement run"
        );

        let stop_reason = loop {
            let name = match phase.stage() {
                ControlFlow::Continue(name) => name,
                ControlFlow::Break(reason) => break reason,
            };
            let stage = self.stages.get(name);
            self.emit(RunEvent::stage_entered(name, state.iteration_count));
            tracing::debug!(stage = %name, iteration = state.iteration_count, "Entering stage");

            let mut update = match self.run_stage(stage.as_ref(), &state, cancel).await {
                Ok(update) => update,
                Err(error) => return Err(self.abort(error, state)),
            };

            restrict_to_declared(stage.as_ref(), &mut update);
            let fields = update.fields();
            state.apply(update.clone());
            history.push((name, update));
            self.emit(RunEvent::stage_completed(name, fields));

            let decision = if phase == Phase::Evaluating {
                let decision = decide(&state);
                let score = state.evaluation.as_ref().map(|e| e.score());
                tracing::info!(
                    iteration = state.iteration_count,
                    score = ?score,
                    decision = %decision,
                    "Evaluated artifact"
                );
                self.emit(RunEvent::decided(decision, state.iteration_count, score));
                decision
            } else {
                Decision::Continue
            };

            phase = phase.next(decision);
        };

        tracing::info!(
            iteration = state.iteration_count,
            stop_reason = %stop_reason,
            "Refinement run finished"
        );
        self.emit(RunEvent::finished(stop_reason, state.iteration_count));

        Ok(RunOutcome {
            state,
            stop_reason,
            history,
        })
    }

    /// Execute one stage, racing it against cancellation and re-issuing it
    /// on malformed output while retries remain
    async fn run_stage(
        &self,
        stage: &dyn Stage,
        state: &LoopState,
        cancel: &CancellationToken,
    ) -> Result<StateUpdate> {
        let name = stage.name();
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(RefinrError::Cancelled { stage: name });
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(RefinrError::Cancelled { stage: name }),
                result = stage.run(state) => result,
            };

            match result {
                Err(error) if error.is_malformed() && attempt < self.malformed_retries => {
                    attempt += 1;
                    tracing::warn!(
                        stage = %name,
                        attempt,
                        error = %error,
                        "Retrying stage after malformed output"
                    );
                    self.emit(RunEvent::stage_retried(name, attempt, &error.to_string()));
                }
                other => return other,
            }
        }
    }

    fn abort(&self, error: RefinrError, state: LoopState) -> RunAborted {
        tracing::error!(
            stage = ?error.stage(),
            iteration = state.iteration_count,
            error = %error,
            "Refinement run aborted"
        );
        self.emit(RunEvent::aborted(error.stage(), &error.to_string()));
        RunAborted { error, state }
    }

    fn emit(&self, event: RunEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(&event);
        }
    }
}

/// Drop fields the stage does not declare it writes; they are never merged
fn restrict_to_declared(stage: &dyn Stage, update: &mut StateUpdate) {
    let dropped = update.retain(stage.writes());
    if !dropped.is_empty() {
        tracing::warn!(
            stage = %stage.name(),
            fields = ?dropped,
            "Dropped undeclared fields from stage update"
        );
    }
}
