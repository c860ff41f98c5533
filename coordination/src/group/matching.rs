//! Waiting room: seats arriving participants and fills the rest with bots.
//!
//! Human seats of the roster are filled in arrival order. The group forms as
//! soon as every human seat is taken; once the matching timeout passes, any
//! human seat still empty goes to an automated agent with that seat's
//! configured strategy.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::info;

use crate::agent::{AgentKind, DecisionAgent, HeuristicStrategy, PolicyAgent, StrategyKind};
use crate::config::{SessionConfig, SlotConfig};
use crate::error::ConfigurationError;
use crate::types::{GroupId, SlotId};

/// Someone who joined the waiting room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "occupant", rename_all = "snake_case")]
pub enum Occupant {
    Human {
        participant: String,
    },
    Automated {
        strategy: StrategyKind,
        persona: HeuristicStrategy,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatPlan {
    pub slot: SlotId,
    pub occupant: Occupant,
}

/// Builds automated agents for seats.
pub trait SeatFactory {
    fn automated(
        &self,
        group: GroupId,
        slot: SlotId,
        strategy: StrategyKind,
        persona: HeuristicStrategy,
    ) -> Result<Box<dyn DecisionAgent>, ConfigurationError>;
}

/// Factory for heuristic-only rosters. Rejects provider-backed strategies.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicSeats {
    pub seed: u64,
}

impl SeatFactory for HeuristicSeats {
    fn automated(
        &self,
        group: GroupId,
        slot: SlotId,
        strategy: StrategyKind,
        _persona: HeuristicStrategy,
    ) -> Result<Box<dyn DecisionAgent>, ConfigurationError> {
        let heuristic = strategy.heuristic().ok_or_else(|| {
            ConfigurationError::Invalid(format!("slot {slot}: {strategy} needs a provider"))
        })?;
        let seed = self
            .seed
            .wrapping_add(u64::from(group) << 8)
            .wrapping_add(u64::from(slot.get()));
        Ok(Box::new(PolicyAgent::new(
            format!("g{group}-bot-{slot}"),
            heuristic,
            seed,
        )))
    }
}

pub struct WaitingRoom {
    roster: Vec<SlotConfig>,
    timeout: Duration,
}

impl WaitingRoom {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            roster: config.slots.clone(),
            timeout: config.matching_timeout(),
        }
    }

    pub fn human_seats(&self) -> usize {
        self.roster
            .iter()
            .filter(|s| s.kind == AgentKind::Human)
            .count()
    }

    /// Collect arrivals until every human seat is taken, the timeout passes,
    /// or the arrival stream closes.
    pub async fn assemble(&self, arrivals: &mut mpsc::Receiver<Participant>) -> Vec<SeatPlan> {
        let deadline = Instant::now() + self.timeout;
        let wanted = self.human_seats();
        let mut seated = Vec::with_capacity(wanted);
        while seated.len() < wanted {
            match timeout_at(deadline, arrivals.recv()).await {
                Ok(Some(participant)) => seated.push(participant),
                Ok(None) | Err(_) => break,
            }
        }
        if seated.len() < wanted {
            info!(
                seated = seated.len(),
                wanted, "Matching timed out, filling empty seats with bots"
            );
        }
        self.plan(seated)
    }

    /// Seat `participants` in arrival order; leftover seats go to bots.
    pub fn plan(&self, participants: Vec<Participant>) -> Vec<SeatPlan> {
        let mut arrivals = participants.into_iter();
        self.roster
            .iter()
            .enumerate()
            .map(|(i, seat)| {
                let human = match seat.kind {
                    AgentKind::Human => arrivals.next(),
                    AgentKind::Automated => None,
                };
                let occupant = match human {
                    Some(p) => Occupant::Human { participant: p.id },
                    None => Occupant::Automated {
                        strategy: seat.strategy,
                        persona: seat.persona,
                    },
                };
                SeatPlan {
                    slot: SlotId::from_index(i),
                    occupant,
                }
            })
            .collect()
    }
}
