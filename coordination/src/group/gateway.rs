//! Phase input gateway: validates incoming human inputs against the
//! group's current phase and forwards accepted ones to the slot's agent.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use super::connection::ConnectionMonitor;
use crate::agent::{DecisionValue, HumanInput};
use crate::error::ValidationError;
use crate::types::{Bet, Choice, DecisionPhase, GroupId, SlotId, GROUP_SIZE};

/// Raw payload as it arrives on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WirePayload {
    Choice { choice: String },
    Bet { bet: i64 },
}

/// A typed input, one variant per decision phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseInput {
    FirstChoice(Choice),
    FirstBet(Bet),
    SecondChoice(Choice),
    SecondBet(Bet),
}

impl PhaseInput {
    /// Validate `payload` for `phase`.
    pub fn from_wire(phase: DecisionPhase, payload: &WirePayload) -> Result<Self, ValidationError> {
        match (phase, payload) {
            (DecisionPhase::FirstChoice, WirePayload::Choice { choice }) => Ok(Self::FirstChoice(choice.parse()?)),
            (DecisionPhase::SecondChoice, WirePayload::Choice { choice }) => Ok(Self::SecondChoice(choice.parse()?)),
            (DecisionPhase::FirstBet, WirePayload::Bet { bet }) => Ok(Self::FirstBet(Bet::try_from(*bet)?)),
            (DecisionPhase::SecondBet, WirePayload::Bet { bet }) => Ok(Self::SecondBet(Bet::try_from(*bet)?)),
            (phase, _) => Err(ValidationError::PayloadMismatch(phase)),
        }
    }

    pub fn phase(&self) -> DecisionPhase {
        match self {
            Self::FirstChoice(_) => DecisionPhase::FirstChoice,
            Self::FirstBet(_) => DecisionPhase::FirstBet,
            Self::SecondChoice(_) => DecisionPhase::SecondChoice,
            Self::SecondBet(_) => DecisionPhase::SecondBet,
        }
    }

    pub fn value(&self) -> DecisionValue {
        match *self {
            Self::FirstChoice(c) | Self::SecondChoice(c) => DecisionValue::Choice(c),
            Self::FirstBet(b) | Self::SecondBet(b) => DecisionValue::Bet(b),
        }
    }
}

/// Phase input event as submitted by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseInputEvent {
    pub session_id: String,
    pub group_id: GroupId,
    /// Raw slot number; validated by the gateway.
    pub slot_id: u8,
    pub round: u32,
    pub phase: DecisionPhase,
    pub payload: WirePayload,
    pub server_timestamp: DateTime<Utc>,
}

/// What the group is currently waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseStatus {
    pub round: u32,
    /// The decision phase accepting input, `None` between phases.
    pub open: Option<DecisionPhase>,
    /// Slots controlled by their substitute for the open phase.
    pub substituted: [bool; GROUP_SIZE],
    pub finished: bool,
}

impl PhaseStatus {
    fn idle() -> Self {
        Self {
            round: 0,
            open: None,
            substituted: [false; GROUP_SIZE],
            finished: false,
        }
    }

    fn describe(&self) -> String {
        match self.open {
            _ if self.finished => "finished".to_string(),
            Some(phase) => format!("round {} {}", self.round, phase),
            None => format!("round {} between phases", self.round),
        }
    }
}

/// Single-writer board the round state machine publishes phase status to.
#[derive(Debug)]
pub struct PhaseBoard {
    tx: watch::Sender<PhaseStatus>,
}

impl Default for PhaseBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseBoard {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(PhaseStatus::idle());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<PhaseStatus> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> PhaseStatus {
        *self.tx.borrow()
    }

    pub fn open(&self, round: u32, phase: DecisionPhase, substituted: [bool; GROUP_SIZE]) {
        self.tx.send_replace(PhaseStatus {
            round,
            open: Some(phase),
            substituted,
            finished: false,
        });
    }

    pub fn close(&self, round: u32) {
        self.tx.send_replace(PhaseStatus {
            round,
            open: None,
            substituted: [false; GROUP_SIZE],
            finished: false,
        });
    }

    pub fn finish(&self) {
        self.tx.send_modify(|status| {
            status.open = None;
            status.finished = true;
        });
    }
}

/// Validating entry point for human inputs of one group.
pub struct InputGateway {
    session_id: String,
    group: GroupId,
    status: watch::Receiver<PhaseStatus>,
    monitor: Arc<ConnectionMonitor>,
    senders: Vec<Option<mpsc::Sender<HumanInput>>>,
    accepted: Mutex<HashSet<(u32, DecisionPhase, SlotId)>>,
}

impl InputGateway {
    pub fn new(
        session_id: String,
        group: GroupId,
        status: watch::Receiver<PhaseStatus>,
        monitor: Arc<ConnectionMonitor>,
        senders: Vec<Option<mpsc::Sender<HumanInput>>>,
    ) -> Self {
        Self {
            session_id,
            group,
            status,
            monitor,
            senders,
            accepted: Mutex::new(HashSet::new()),
        }
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Watch the group's phase status.
    pub fn status(&self) -> watch::Receiver<PhaseStatus> {
        self.status.clone()
    }

    /// Validate and forward one input. The first accepted input per
    /// `(round, phase, slot)` wins; later ones are refused.
    pub fn submit(&self, event: &PhaseInputEvent) -> Result<(), ValidationError> {
        if event.group_id != self.group {
            return Err(ValidationError::UnknownGroup(event.group_id));
        }
        let slot = SlotId::new(event.slot_id)?;
        let Some(sender) = self.senders.get(slot.index()).and_then(Option::as_ref) else {
            return Err(ValidationError::NotHumanSlot(slot));
        };

        self.monitor.record_activity(slot);

        // Held until the input is queued, so the phase cannot close between
        // the checks below and the send.
        let status = self.status.borrow();
        if status.finished {
            return Err(ValidationError::GroupClosed(self.group));
        }
        if status.open != Some(event.phase) || status.round != event.round {
            return Err(ValidationError::PhaseMismatch {
                got: event.phase,
                current: status.describe(),
            });
        }

        let input = PhaseInput::from_wire(event.phase, &event.payload)?;

        if status.substituted[slot.index()] {
            return Err(ValidationError::SlotSubstituted(slot));
        }

        let key = (event.round, event.phase, slot);
        let mut accepted = self.accepted.lock().unwrap_or_else(PoisonError::into_inner);
        accepted.retain(|(round, _, _)| *round == event.round);
        if accepted.contains(&key) {
            return Err(ValidationError::AlreadyResponded {
                slot,
                round: event.round,
                phase: event.phase,
            });
        }

        sender
            .try_send(HumanInput {
                round: event.round,
                input,
            })
            .map_err(|_| ValidationError::GroupClosed(self.group))?;
        accepted.insert(key);
        drop(accepted);
        drop(status);

        debug!(group = self.group, slot = %slot, round = event.round, phase = %event.phase, "Input accepted");
        Ok(())
    }
}
