//! Reveal views: exactly what each slot is shown after a stage closes.
//!
//! The types carry no field for information that must stay hidden. A first
//! reveal has no bets of peers and nothing from the second stage; a second
//! reveal has no peer deltas.

use serde::{Deserialize, Serialize};

use super::phase::RoundPhase;
use crate::types::{Bet, Choice, GroupId, SlotId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerChoice {
    pub slot: SlotId,
    pub choice: Choice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerOutcome {
    pub slot: SlotId,
    pub choice: Choice,
    pub correct: bool,
}

/// Shown to one slot at Reveal1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstReveal {
    pub slot: SlotId,
    pub own_choice: Choice,
    pub own_bet: Bet,
    pub peers: Vec<PeerChoice>,
}

/// Shown to one slot at Reveal2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondReveal {
    pub slot: SlotId,
    pub own_choice: Choice,
    pub own_bet: Bet,
    pub own_correct: bool,
    pub own_delta: i32,
    pub peers: Vec<PeerOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum SlotView {
    First(FirstReveal),
    Second(SecondReveal),
}

impl SlotView {
    pub fn slot(&self) -> SlotId {
        match self {
            Self::First(v) => v.slot,
            Self::Second(v) => v.slot,
        }
    }
}

/// Reveal broadcast event payload, one view per slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealBroadcast {
    pub group: GroupId,
    pub round: u32,
    pub phase: RoundPhase,
    pub views: Vec<SlotView>,
}

impl RevealBroadcast {
    pub fn view_for(&self, slot: SlotId) -> Option<&SlotView> {
        self.views.iter().find(|v| v.slot() == slot)
    }
}

/// Peers' first choices as seen by `slot`.
pub(crate) fn peer_choices(slot: SlotId, choices: &[Choice]) -> Vec<PeerChoice> {
    choices
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != slot.index())
        .map(|(i, &choice)| PeerChoice {
            slot: SlotId::from_index(i),
            choice,
        })
        .collect()
}

/// Peers' second choices and correctness as seen by `slot`.
pub(crate) fn peer_outcomes(slot: SlotId, choices: &[Choice], rewarded: Choice) -> Vec<PeerOutcome> {
    choices
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != slot.index())
        .map(|(i, &choice)| PeerOutcome {
            slot: SlotId::from_index(i),
            choice,
            correct: choice == rewarded,
        })
        .collect()
}
