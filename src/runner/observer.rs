//! Observers that receive run progress events.

use tokio::sync::mpsc;

use crate::domain::{RunEvent, RunEventKind};

/// Receives every event the controller emits, in order
pub trait RunObserver: Send + Sync {
    fn on_event(&self, event: &RunEvent);
}

/// Writes events through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl RunObserver for LogObserver {
    fn on_event(&self, event: &RunEvent) {
        match &event.kind {
            RunEventKind::StageEntered { stage, iteration } => {
                log::info!("[iteration {}] entering {}", iteration, stage);
            }
            RunEventKind::StageCompleted { stage, fields } => {
                log::debug!("{} committed {:?}", stage, fields);
            }
            RunEventKind::StageRetried { stage, attempt, reason } => {
                log::warn!("{} retry {} after malformed output: {}", stage, attempt, reason);
            }
            RunEventKind::Decided {
                decision,
                iteration_count,
                score,
            } => match score {
                Some(score) => log::info!(
                    "score {}/10 after {} iterations: {}",
                    score,
                    iteration_count,
                    decision
                ),
                None => log::info!("after {} iterations: {}", iteration_count, decision),
            },
            RunEventKind::Finished {
                stop_reason,
                iteration_count,
            } => {
                log::info!("run finished after {} iterations: {}", iteration_count, stop_reason);
            }
            RunEventKind::Aborted { stage, error } => match stage {
                Some(stage) => log::error!("run aborted in {}: {}", stage, error),
                None => log::error!("run aborted: {}", error),
            },
        }
    }
}

/// Forwards events to an unbounded channel so a host can stream them
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelObserver {
    pub fn new(sender: mpsc::UnboundedSender<RunEvent>) -> Self {
        Self { sender }
    }

    /// Observer plus the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl RunObserver for ChannelObserver {
    fn on_event(&self, event: &RunEvent) {
        if self.sender.send(event.clone()).is_err() {
            log::debug!("Event receiver dropped; discarding {:?}", event.kind);
        }
    }
}
