//! Session event types
//!
//! Published by group coordinators and round state machines; consumed by
//! transports (to render reveals and phase prompts) and by operators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::round::reveal::RevealBroadcast;
use crate::types::{DecisionPhase, GroupId, SlotId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A group was seated and its schedule frozen
    GroupFormed {
        group: GroupId,
        humans: u8,
        automated: u8,
        total_rounds: u32,
        timestamp: DateTime<Utc>,
    },

    RoundStarted {
        group: GroupId,
        round: u32,
        timestamp: DateTime<Utc>,
    },

    /// A decision phase started accepting input
    PhaseOpened {
        group: GroupId,
        round: u32,
        phase: DecisionPhase,
        deadline_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The phase barrier closed
    PhaseClosed {
        group: GroupId,
        round: u32,
        phase: DecisionPhase,
        /// Slots that needed a timeout fallback
        timed_out: u8,
        timestamp: DateTime<Utc>,
    },

    /// Per-slot reveal views (Reveal1 or Reveal2)
    Reveal(RevealBroadcast),

    /// A slot was handed to its substitute
    SlotSubstituted {
        group: GroupId,
        slot: SlotId,
        round: u32,
        timestamp: DateTime<Utc>,
    },

    /// A slot was handed back to its participant
    SlotRestored {
        group: GroupId,
        slot: SlotId,
        round: u32,
        timestamp: DateTime<Utc>,
    },

    RoundClosed {
        group: GroupId,
        round: u32,
        timestamp: DateTime<Utc>,
    },

    /// All rounds done and bonus outcomes drawn
    GroupCompleted {
        group: GroupId,
        rounds: u32,
        timestamp: DateTime<Utc>,
    },
}

impl SessionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::GroupFormed { .. } => "group_formed",
            Self::RoundStarted { .. } => "round_started",
            Self::PhaseOpened { .. } => "phase_opened",
            Self::PhaseClosed { .. } => "phase_closed",
            Self::Reveal(_) => "reveal",
            Self::SlotSubstituted { .. } => "slot_substituted",
            Self::SlotRestored { .. } => "slot_restored",
            Self::RoundClosed { .. } => "round_closed",
            Self::GroupCompleted { .. } => "group_completed",
        }
    }

    pub fn group(&self) -> GroupId {
        match self {
            Self::GroupFormed { group, .. }
            | Self::RoundStarted { group, .. }
            | Self::PhaseOpened { group, .. }
            | Self::PhaseClosed { group, .. }
            | Self::SlotSubstituted { group, .. }
            | Self::SlotRestored { group, .. }
            | Self::RoundClosed { group, .. }
            | Self::GroupCompleted { group, .. } => *group,
            Self::Reveal(broadcast) => broadcast.group,
        }
    }

    /// Round the event belongs to, if any.
    pub fn round(&self) -> Option<u32> {
        match self {
            Self::RoundStarted { round, .. }
            | Self::PhaseOpened { round, .. }
            | Self::PhaseClosed { round, .. }
            | Self::SlotSubstituted { round, .. }
            | Self::SlotRestored { round, .. }
            | Self::RoundClosed { round, .. } => Some(*round),
            Self::Reveal(broadcast) => Some(broadcast.round),
            Self::GroupFormed { .. } | Self::GroupCompleted { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_tag() {
        let event = SessionEvent::RoundClosed {
            group: 2,
            round: 5,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "round_closed");
        assert_eq!(json["round"], 5);
        assert_eq!(event.event_type(), "round_closed");
        assert_eq!(event.group(), 2);
    }
}
