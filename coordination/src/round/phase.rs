//! Round phases and legal transition guards.
//!
//! Every round walks the same linear path:
//! ```text
//! AwaitFirstChoice → AwaitFirstBet → Reveal1 → AwaitSecondChoice
//!     → AwaitSecondBet → Reveal2 → Closed
//! ```
//! `PhaseMachine::advance` refuses any other edge and keeps a transition log
//! with elapsed time so a round can be audited after the fact.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::types::DecisionPhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    AwaitFirstChoice,
    AwaitFirstBet,
    Reveal1,
    AwaitSecondChoice,
    AwaitSecondBet,
    Reveal2,
    /// Round complete, records frozen. Terminal.
    Closed,
}

impl RoundPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// The successor on the round path, `None` once closed.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::AwaitFirstChoice => Some(Self::AwaitFirstBet),
            Self::AwaitFirstBet => Some(Self::Reveal1),
            Self::Reveal1 => Some(Self::AwaitSecondChoice),
            Self::AwaitSecondChoice => Some(Self::AwaitSecondBet),
            Self::AwaitSecondBet => Some(Self::Reveal2),
            Self::Reveal2 => Some(Self::Closed),
            Self::Closed => None,
        }
    }

    /// The decision this phase waits for, if any.
    pub fn decision(self) -> Option<DecisionPhase> {
        match self {
            Self::AwaitFirstChoice => Some(DecisionPhase::FirstChoice),
            Self::AwaitFirstBet => Some(DecisionPhase::FirstBet),
            Self::AwaitSecondChoice => Some(DecisionPhase::SecondChoice),
            Self::AwaitSecondBet => Some(DecisionPhase::SecondBet),
            Self::Reveal1 | Self::Reveal2 | Self::Closed => None,
        }
    }
}

impl From<DecisionPhase> for RoundPhase {
    fn from(phase: DecisionPhase) -> Self {
        match phase {
            DecisionPhase::FirstChoice => Self::AwaitFirstChoice,
            DecisionPhase::FirstBet => Self::AwaitFirstBet,
            DecisionPhase::SecondChoice => Self::AwaitSecondChoice,
            DecisionPhase::SecondBet => Self::AwaitSecondBet,
        }
    }
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitFirstChoice => write!(f, "AwaitFirstChoice"),
            Self::AwaitFirstBet => write!(f, "AwaitFirstBet"),
            Self::Reveal1 => write!(f, "Reveal1"),
            Self::AwaitSecondChoice => write!(f, "AwaitSecondChoice"),
            Self::AwaitSecondBet => write!(f, "AwaitSecondBet"),
            Self::Reveal2 => write!(f, "Reveal2"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

fn is_legal_transition(from: RoundPhase, to: RoundPhase) -> bool {
    use RoundPhase::*;

    matches!(
        (from, to),
        (AwaitFirstChoice, AwaitFirstBet)
            | (AwaitFirstBet, Reveal1)
            | (Reveal1, AwaitSecondChoice)
            | (AwaitSecondChoice, AwaitSecondBet)
            | (AwaitSecondBet, Reveal2)
            | (Reveal2, Closed)
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: RoundPhase,
    pub to: RoundPhase,
    /// Milliseconds since the round opened.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalTransition {
    pub round: u32,
    pub from: RoundPhase,
    pub to: RoundPhase,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Illegal phase transition in round {}: {} → {}",
            self.round, self.from, self.to
        )
    }
}

impl std::error::Error for IllegalTransition {}

/// Phase tracker for a single round.
#[derive(Debug)]
pub struct PhaseMachine {
    round: u32,
    current: RoundPhase,
    opened_at: Instant,
    transitions: Vec<PhaseTransition>,
}

impl PhaseMachine {
    /// Start a round at `AwaitFirstChoice`.
    pub fn new(round: u32) -> Self {
        Self {
            round,
            current: RoundPhase::AwaitFirstChoice,
            opened_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> RoundPhase {
        self.current
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn advance(&mut self, to: RoundPhase, reason: Option<&str>) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                round: self.round,
                from: self.current,
                to,
            });
        }

        let record = PhaseTransition {
            from: self.current,
            to,
            elapsed_ms: self.opened_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        };

        tracing::debug!(
            round = self.round,
            from = %self.current,
            to = %to,
            elapsed_ms = record.elapsed_ms,
            "Phase transition"
        );

        self.current = to;
        self.transitions.push(record);
        Ok(())
    }

    /// Move to the next phase on the round path.
    pub fn step(&mut self, reason: Option<&str>) -> Result<RoundPhase, IllegalTransition> {
        let to = self.current.next().ok_or(IllegalTransition {
            round: self.round,
            from: self.current,
            to: self.current,
        })?;
        self.advance(to, reason)?;
        Ok(to)
    }

    pub fn transitions(&self) -> &[PhaseTransition] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<PhaseTransition> {
        self.transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_round_path() {
        let mut pm = PhaseMachine::new(1);
        let mut visited = vec![pm.current()];
        while !pm.current().is_terminal() {
            visited.push(pm.step(None).unwrap());
        }
        assert_eq!(
            visited,
            vec![
                RoundPhase::AwaitFirstChoice,
                RoundPhase::AwaitFirstBet,
                RoundPhase::Reveal1,
                RoundPhase::AwaitSecondChoice,
                RoundPhase::AwaitSecondBet,
                RoundPhase::Reveal2,
                RoundPhase::Closed,
            ]
        );
        assert_eq!(pm.transitions().len(), 6);
    }

    #[test]
    fn test_illegal_skip_is_rejected() {
        let mut pm = PhaseMachine::new(4);
        let err = pm.advance(RoundPhase::Reveal1, None).unwrap_err();
        assert_eq!(err.from, RoundPhase::AwaitFirstChoice);
        assert_eq!(err.to, RoundPhase::Reveal1);
        assert_eq!(err.round, 4);
        assert_eq!(pm.current(), RoundPhase::AwaitFirstChoice);
        assert!(pm.transitions().is_empty());
    }

    #[test]
    fn test_no_backwards_edges() {
        let mut pm = PhaseMachine::new(1);
        pm.step(None).unwrap();
        assert!(pm.advance(RoundPhase::AwaitFirstChoice, None).is_err());
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut pm = PhaseMachine::new(1);
        for _ in 0..6 {
            pm.step(Some("test")).unwrap();
        }
        assert!(pm.current().is_terminal());
        assert!(pm.step(None).is_err());
        assert_eq!(pm.transitions()[0].reason.as_deref(), Some("test"));
    }

    #[test]
    fn test_decision_mapping_round_trips() {
        for phase in DecisionPhase::ALL {
            assert_eq!(RoundPhase::from(phase).decision(), Some(phase));
        }
        assert_eq!(RoundPhase::Reveal1.decision(), None);
    }

    #[test]
    fn test_illegal_transition_display() {
        let err = IllegalTransition {
            round: 2,
            from: RoundPhase::Reveal2,
            to: RoundPhase::AwaitFirstBet,
        };
        assert_eq!(
            err.to_string(),
            "Illegal phase transition in round 2: Reveal2 → AwaitFirstBet"
        );
    }
}
