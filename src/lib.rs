//! Refinr - self-correcting text refinement
//!
//! Refinr improves an artifact toward a goal by looping through four stages:
//! decompose the goal into criteria, plan a revision, apply it, and evaluate
//! the result, re-planning from the evaluation's feedback until the artifact
//! is good enough or the iteration budget runs out.

pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod llm;
pub mod prompt;
pub mod runner;
pub mod stages;

pub use error::{RefinrError, Result};
pub use runner::{LoopController, RunAborted, RunOutcome};
