//! Human slots, fed by the input gateway.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use super::view::VisibleRoundState;
use super::{AgentKind, Decision, DecisionAgent};
use crate::error::AgentError;
use crate::group::gateway::PhaseInput;
use crate::types::DecisionPhase;

/// Inputs buffered per human slot. One is accepted per phase, so a handful
/// covers any stale stragglers.
const INPUT_BUFFER: usize = 8;

/// A validated input addressed to one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanInput {
    pub round: u32,
    pub input: PhaseInput,
}

pub struct HumanAgent {
    label: String,
    inputs: mpsc::Receiver<HumanInput>,
    round: u32,
}

/// Create a human agent and the sender the gateway feeds it through.
pub fn human_channel(label: impl Into<String>) -> (HumanAgent, mpsc::Sender<HumanInput>) {
    let (tx, rx) = mpsc::channel(INPUT_BUFFER);
    let agent = HumanAgent {
        label: label.into(),
        inputs: rx,
        round: 0,
    };
    (agent, tx)
}

#[async_trait]
impl DecisionAgent for HumanAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Human
    }

    fn label(&self) -> &str {
        &self.label
    }

    async fn observe(&mut self, view: &VisibleRoundState) {
        self.round = view.round;
    }

    /// Wait for the first input matching the current round and phase.
    ///
    /// Inputs left over from phases that already closed are dropped.
    async fn decide(&mut self, phase: DecisionPhase, _deadline: Instant) -> Result<Decision, AgentError> {
        loop {
            let Some(message) = self.inputs.recv().await else {
                return Err(AgentError::InputClosed);
            };
            if message.round == self.round && message.input.phase() == phase {
                return Ok(Decision::primary(message.input.value()));
            }
            self.drop_stale(&message);
        }
    }

    fn take_queued(&mut self, phase: DecisionPhase) -> Option<Decision> {
        while let Ok(message) = self.inputs.try_recv() {
            if message.round == self.round && message.input.phase() == phase {
                return Some(Decision::primary(message.input.value()));
            }
            self.drop_stale(&message);
        }
        None
    }
}

impl HumanAgent {
    fn drop_stale(&self, message: &HumanInput) {
        debug!(
            agent = %self.label,
            round = message.round,
            phase = %message.input.phase(),
            "Dropping stale input"
        );
    }
}
