//! Progress events for observability.
//!
//! The controller emits one event per stage transition so a host can stream
//! progress without re-deriving it from raw generated text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::outcome::{Decision, StopReason};
use super::stage::{StageName, StateField};

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEventKind {
    /// The controller entered a stage
    StageEntered { stage: StageName, iteration: u32 },
    /// A stage's update was committed to the state
    StageCompleted {
        stage: StageName,
        fields: Vec<StateField>,
    },
    /// A stage produced malformed output and is being re-issued
    StageRetried {
        stage: StageName,
        attempt: u32,
        reason: String,
    },
    /// Branch decision taken on leaving Evaluate
    Decided {
        decision: Decision,
        iteration_count: u32,
        score: Option<u8>,
    },
    /// The run reached its terminal state
    Finished {
        stop_reason: StopReason,
        iteration_count: u32,
    },
    /// The run aborted with an error
    Aborted {
        stage: Option<StageName>,
        error: String,
    },
}

/// A timestamped progress event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: RunEventKind,
}

impl RunEvent {
    pub fn new(kind: RunEventKind) -> Self {
        Self { at: Utc::now(), kind }
    }

    pub fn stage_entered(stage: StageName, iteration: u32) -> Self {
        Self::new(RunEventKind::StageEntered { stage, iteration })
    }

    pub fn stage_completed(stage: StageName, fields: Vec<StateField>) -> Self {
        Self::new(RunEventKind::StageCompleted { stage, fields })
    }

    pub fn stage_retried(stage: StageName, attempt: u32, reason: &str) -> Self {
        Self::new(RunEventKind::StageRetried {
            stage,
            attempt,
            reason: reason.to_string(),
        })
    }

    pub fn decided(decision: Decision, iteration_count: u32, score: Option<u8>) -> Self {
        Self::new(RunEventKind::Decided {
            decision,
            iteration_count,
            score,
        })
    }

    pub fn finished(stop_reason: StopReason, iteration_count: u32) -> Self {
        Self::new(RunEventKind::Finished {
            stop_reason,
            iteration_count,
        })
    }

    pub fn aborted(stage: Option<StageName>, error: &str) -> Self {
        Self::new(RunEventKind::Aborted {
            stage,
            error: error.to_string(),
        })
    }

    /// Stage this event concerns, if any
    pub fn stage(&self) -> Option<StageName> {
        match &self.kind {
            RunEventKind::StageEntered { stage, .. }
            | RunEventKind::StageCompleted { stage, .. }
            | RunEventKind::StageRetried { stage, .. } => Some(*stage),
            RunEventKind::Decided { .. } => Some(StageName::Evaluate),
            RunEventKind::Aborted { stage, .. } => *stage,
            RunEventKind::Finished { .. } => None,
        }
    }
}
