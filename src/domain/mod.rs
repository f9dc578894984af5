//! Domain types for Refinr
//!
//! This module contains the records threaded through a refinement run:
//! - Records: Criterion, RevisionStep, Artifact, Evaluation
//! - LoopState: the single state record owned by the controller
//! - StateUpdate: the typed partial update a stage hands back
//! - Outcome: branch decisions and stop reasons
//! - Event: progress events emitted per stage transition

pub mod event;
pub mod loop_state;
pub mod outcome;
pub mod records;
pub mod stage;

pub use event::{RunEvent, RunEventKind};
pub use loop_state::{DEFAULT_MAX_ITERATIONS, LoopState, RunInputs, StateUpdate};
pub use outcome::{Decision, StopReason};
pub use records::{
    Artifact, Criterion, Evaluation, MAX_SCORE, MIN_SCORE, RevisionStep, SUFFICIENCY_THRESHOLD,
};
pub use stage::{StageName, StateField};
