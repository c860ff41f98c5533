//! Per-slot round records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::phase::PhaseTransition;
use crate::types::{Bet, Choice, SlotId, Stage};

/// Where a recorded value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOrigin {
    /// Input from the participant's own channel.
    Human,
    /// A seat filled by an automated policy from the start.
    Automated,
    /// Deadline elapsed; the stand-in policy answered for the slot.
    TimeoutFallback,
    /// The slot was disconnected and its substitute held control.
    AgentSubstituted,
    /// The language-model provider failed; the secondary policy answered.
    ProviderFallback,
}

impl ResponseOrigin {
    pub fn is_fallback(self) -> bool {
        matches!(
            self,
            Self::TimeoutFallback | Self::AgentSubstituted | Self::ProviderFallback
        )
    }
}

/// One recorded value with its timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response<T> {
    pub value: T,
    pub at: DateTime<Utc>,
    /// Milliseconds from phase open.
    pub latency_ms: u64,
    pub origin: ResponseOrigin,
}

/// How many peers made the same or a different choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Agreement {
    pub with: u8,
    pub against: u8,
}

impl Agreement {
    pub fn count(own: Choice, peers: impl IntoIterator<Item = Choice>) -> Self {
        let mut agreement = Self::default();
        for peer in peers {
            if peer == own {
                agreement.with += 1;
            } else {
                agreement.against += 1;
            }
        }
        agreement
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRoundRecord {
    pub slot: SlotId,
    pub first_choice: Response<Choice>,
    pub first_bet: Response<Bet>,
    pub second_choice: Response<Choice>,
    pub second_bet: Response<Bet>,
    pub first_correct: bool,
    pub second_correct: bool,
    /// Never shown to the player; only used for bonus selection.
    pub first_delta: i32,
    pub second_delta: i32,
    pub switched: bool,
    pub first_agreement: Agreement,
    pub second_agreement: Agreement,
}

impl PlayerRoundRecord {
    pub fn delta(&self, stage: Stage) -> i32 {
        match stage {
            Stage::First => self.first_delta,
            Stage::Second => self.second_delta,
        }
    }

    /// All four responses' origins in phase order.
    pub fn origins(&self) -> [ResponseOrigin; 4] {
        [
            self.first_choice.origin,
            self.first_bet.origin,
            self.second_choice.origin,
            self.second_bet.origin,
        ]
    }
}

/// A closed round. Immutable once produced by the round state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    pub rewarded: Choice,
    pub favored: Choice,
    pub is_reversal: bool,
    /// Indexed by slot position.
    pub players: Vec<PlayerRoundRecord>,
    pub transitions: Vec<PhaseTransition>,
}

impl RoundRecord {
    pub fn player(&self, slot: SlotId) -> Option<&PlayerRoundRecord> {
        self.players.get(slot.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agreement_counts() {
        let a = Agreement::count(Choice::A, [Choice::A, Choice::B, Choice::A, Choice::A]);
        assert_eq!(a, Agreement { with: 3, against: 1 });
        assert_eq!(Agreement::count(Choice::B, []), Agreement::default());
    }

    #[test]
    fn test_fallback_origins() {
        assert!(!ResponseOrigin::Human.is_fallback());
        assert!(!ResponseOrigin::Automated.is_fallback());
        assert!(ResponseOrigin::TimeoutFallback.is_fallback());
        assert!(ResponseOrigin::AgentSubstituted.is_fallback());
        assert!(ResponseOrigin::ProviderFallback.is_fallback());
    }

    #[test]
    fn test_origin_serialises_snake_case() {
        let json = serde_json::to_string(&ResponseOrigin::TimeoutFallback).unwrap();
        assert_eq!(json, "\"timeout_fallback\"");
    }
}
