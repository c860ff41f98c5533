//! One seat of a group: its primary agent, its stand-in policy and what the
//! seat has seen so far.

use tokio::sync::mpsc;

use crate::agent::{human_channel, AgentKind, DecisionAgent, HumanInput, PastRound, PolicyAgent};
use crate::types::SlotId;

/// An agent ready to be seated, plus the gateway sender for human seats.
pub struct Seat {
    pub agent: Box<dyn DecisionAgent>,
    pub input: Option<mpsc::Sender<HumanInput>>,
}

impl Seat {
    pub fn automated(agent: Box<dyn DecisionAgent>) -> Self {
        Self { agent, input: None }
    }

    pub fn human(label: impl Into<String>) -> Self {
        let (agent, tx) = human_channel(label);
        Self {
            agent: Box::new(agent),
            input: Some(tx),
        }
    }
}

pub struct Slot {
    pub(crate) id: SlotId,
    pub(crate) primary: Box<dyn DecisionAgent>,
    /// Answers on timeout and takes over while the slot is disconnected.
    pub(crate) stand_in: PolicyAgent,
    pub(crate) substituted: bool,
    pub(crate) history: Vec<PastRound>,
}

impl Slot {
    pub fn new(id: SlotId, primary: Box<dyn DecisionAgent>, stand_in: PolicyAgent) -> Self {
        Self {
            id,
            primary,
            stand_in,
            substituted: false,
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn is_human(&self) -> bool {
        self.primary.kind() == AgentKind::Human
    }

    pub fn is_substituted(&self) -> bool {
        self.substituted
    }

    pub fn label(&self) -> &str {
        self.primary.label()
    }

    /// The agent in control for the current phase.
    pub(crate) fn controller(&mut self) -> &mut dyn DecisionAgent {
        if self.substituted {
            &mut self.stand_in
        } else {
            self.primary.as_mut()
        }
    }
}
