//! Branch decisions and stop reasons.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a run reached its terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `iteration_count` reached `max_iterations`
    BudgetExhausted,
    /// The latest evaluation cleared the sufficiency threshold
    Sufficient,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::BudgetExhausted => f.write_str("budget exhausted"),
            StopReason::Sufficient => f.write_str("improvement sufficient"),
        }
    }
}

/// Result of the branch predicate evaluated after each Evaluate stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision", content = "reason")]
pub enum Decision {
    /// Re-enter the loop at Plan
    Continue,
    /// Terminate the run
    Stop(StopReason),
}

impl Decision {
    pub fn is_stop(&self) -> bool {
        matches!(self, Decision::Stop(_))
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Continue => f.write_str("continue"),
            Decision::Stop(reason) => write!(f, "stop ({})", reason),
        }
    }
}
