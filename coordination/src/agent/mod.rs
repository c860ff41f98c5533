//! Decision agents: one interface over human input streams and automated
//! policies.
//!
//! The round state machine never knows what sits behind a slot. It hands the
//! agent a [`VisibleRoundState`] through `observe`, then asks for a value with
//! `decide` under the phase deadline. Whatever comes back late is discarded
//! by the machine and replaced by the slot's stand-in policy.

pub mod automated;
pub mod human;
pub mod provider;
pub mod strategy;
pub mod view;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::AgentError;
use crate::types::{Bet, Choice, DecisionPhase};

pub use automated::PolicyAgent;
pub use human::{human_channel, HumanAgent, HumanInput};
pub use provider::{parse_provider_reply, DecisionProvider, ProviderAgent, ProviderRequest, ProviderResponse};
pub use strategy::{HeuristicPolicy, HeuristicStrategy, StrategyKind};
pub use view::{PastRound, VisibleRoundState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Human,
    Automated,
}

/// A choice or a bet, depending on the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionValue {
    Choice(Choice),
    Bet(Bet),
}

impl DecisionValue {
    pub fn as_choice(self) -> Option<Choice> {
        match self {
            Self::Choice(c) => Some(c),
            Self::Bet(_) => None,
        }
    }

    pub fn as_bet(self) -> Option<Bet> {
        match self {
            Self::Bet(b) => Some(b),
            Self::Choice(_) => None,
        }
    }
}

/// Which policy inside an agent produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Primary,
    /// The agent's own deterministic fallback, e.g. after a provider failure.
    SecondaryPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub value: DecisionValue,
    pub source: DecisionSource,
}

impl Decision {
    pub fn primary(value: DecisionValue) -> Self {
        Self {
            value,
            source: DecisionSource::Primary,
        }
    }

    pub fn secondary(value: DecisionValue) -> Self {
        Self {
            value,
            source: DecisionSource::SecondaryPolicy,
        }
    }
}

/// A participant in one group slot.
///
/// `observe` is called before every decision and at both reveals. Neither
/// it nor `decide` can hold up the group: the caller bounds both by the
/// phase deadline.
#[async_trait]
pub trait DecisionAgent: Send {
    fn kind(&self) -> AgentKind;

    /// Short label for logs.
    fn label(&self) -> &str;

    async fn observe(&mut self, view: &VisibleRoundState);

    async fn decide(&mut self, phase: DecisionPhase, deadline: Instant) -> Result<Decision, AgentError>;

    /// An answer for `phase` that is already queued, taken without waiting.
    ///
    /// Checked once the barrier has closed for slots whose `decide` was cut
    /// off, so input accepted right at the deadline is not lost.
    fn take_queued(&mut self, _phase: DecisionPhase) -> Option<Decision> {
        None
    }
}
