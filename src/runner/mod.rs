//! Loop controller - drives the stages through the refinement state machine.
//!
//! - `Phase` and `decide` encode the transition table and the branch predicate
//! - `LoopController` owns the state for one run and is the only writer
//! - `RunObserver` implementations receive progress events

mod controller;
mod observer;

pub use controller::{LoopController, Phase, RunAborted, RunOutcome, decide};
pub use observer::{ChannelObserver, LogObserver, RunObserver};
