//! The round state a slot is allowed to see.
//!
//! Only the round state machine builds these views, and it fills peer data
//! only after the matching reveal has happened.

use serde::{Deserialize, Serialize};

use crate::round::phase::RoundPhase;
use crate::round::reveal::{PeerChoice, PeerOutcome};
use crate::types::{Bet, Choice, SlotId};

/// Weight decay applied per round of age in the own-history estimate.
const RECENCY_DECAY: f64 = 0.6;

/// Everything a slot learned about one closed round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PastRound {
    pub round: u32,
    pub first_choice: Choice,
    pub first_bet: Bet,
    pub second_choice: Choice,
    pub second_bet: Bet,
    /// Second-stage correctness, the only feedback shown.
    pub correct: bool,
    pub delta: i32,
    pub peer_first: Vec<PeerChoice>,
    pub peer_second: Vec<PeerOutcome>,
}

impl PastRound {
    /// The option that paid, as far as this slot can tell.
    pub fn paying_option(&self) -> Choice {
        if self.correct {
            self.second_choice
        } else {
            self.second_choice.other()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleRoundState {
    pub slot: SlotId,
    pub round: u32,
    pub total_rounds: u32,
    pub phase: RoundPhase,
    pub own_first_choice: Option<Choice>,
    pub own_first_bet: Option<Bet>,
    pub own_second_choice: Option<Choice>,
    /// Empty until Reveal1 of the current round.
    pub peer_first_choices: Vec<PeerChoice>,
    pub history: Vec<PastRound>,
}

impl VisibleRoundState {
    pub fn last_round(&self) -> Option<&PastRound> {
        self.history.last()
    }

    /// Recency-weighted belief that `A` is the paying option, in `[0, 1]`.
    ///
    /// Returns 0.5 with no history.
    pub fn own_estimate_a(&self) -> f64 {
        let mut weight = 1.0;
        let mut total = 0.0;
        let mut evidence = 0.0;
        for past in self.history.iter().rev() {
            let signal = if past.paying_option() == Choice::A { 1.0 } else { -1.0 };
            evidence += weight * signal;
            total += weight;
            weight *= RECENCY_DECAY;
        }
        if total == 0.0 {
            0.5
        } else {
            0.5 + 0.5 * evidence / total
        }
    }

    /// Share of revealed peers whose first choice this round was `A`.
    pub fn peer_share_a(&self) -> Option<f64> {
        if self.peer_first_choices.is_empty() {
            return None;
        }
        let a = self
            .peer_first_choices
            .iter()
            .filter(|p| p.choice == Choice::A)
            .count();
        Some(a as f64 / self.peer_first_choices.len() as f64)
    }

    /// The option every revealed peer picked, if they agree.
    pub fn unanimous_peers(&self) -> Option<Choice> {
        let first = self.peer_first_choices.first()?.choice;
        self.peer_first_choices
            .iter()
            .all(|p| p.choice == first)
            .then_some(first)
    }

    /// Peers whose revealed first choice equals `choice`.
    pub fn peers_agreeing(&self, choice: Choice) -> usize {
        self.peer_first_choices
            .iter()
            .filter(|p| p.choice == choice)
            .count()
    }

    /// Consecutive correct second-stage results ending at the last round.
    pub fn win_streak(&self) -> u32 {
        self.history
            .iter()
            .rev()
            .take_while(|r| r.correct)
            .count() as u32
    }

    /// Majority of the previous round's peer second choices, if any.
    pub fn last_peer_majority(&self) -> Option<Choice> {
        let last = self.last_round()?;
        let a = last.peer_second.iter().filter(|p| p.choice == Choice::A).count();
        let b = last.peer_second.len() - a;
        match a.cmp(&b) {
            std::cmp::Ordering::Greater => Some(Choice::A),
            std::cmp::Ordering::Less => Some(Choice::B),
            std::cmp::Ordering::Equal => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn past(round: u32, choice: Choice, correct: bool) -> PastRound {
        PastRound {
            round,
            first_choice: choice,
            first_bet: Bet::LOW,
            second_choice: choice,
            second_bet: Bet::LOW,
            correct,
            delta: if correct { 20 } else { -20 },
            peer_first: Vec::new(),
            peer_second: Vec::new(),
        }
    }

    pub(crate) fn view(history: Vec<PastRound>, peers: &[Choice]) -> VisibleRoundState {
        VisibleRoundState {
            slot: SlotId::new(1).unwrap(),
            round: history.len() as u32 + 1,
            total_rounds: 64,
            phase: RoundPhase::AwaitFirstChoice,
            own_first_choice: None,
            own_first_bet: None,
            own_second_choice: None,
            peer_first_choices: peers
                .iter()
                .enumerate()
                .map(|(i, &choice)| PeerChoice {
                    slot: SlotId::new(i as u8 + 2).unwrap(),
                    choice,
                })
                .collect(),
            history,
        }
    }

    #[test]
    fn test_estimate_without_history_is_neutral() {
        assert_eq!(view(vec![], &[]).own_estimate_a(), 0.5);
    }

    #[test]
    fn test_estimate_weights_recent_rounds() {
        // Old evidence for A, recent evidence for B.
        let v = view(
            vec![past(1, Choice::A, true), past(2, Choice::A, true), past(3, Choice::B, true)],
            &[],
        );
        assert!(v.own_estimate_a() < 0.5);
        // A loss on B is evidence for A.
        let v = view(vec![past(1, Choice::B, false)], &[]);
        assert_eq!(v.own_estimate_a(), 1.0);
    }

    #[test]
    fn test_peer_helpers() {
        let v = view(vec![], &[Choice::A, Choice::A, Choice::B, Choice::A]);
        assert_eq!(v.peer_share_a(), Some(0.75));
        assert_eq!(v.unanimous_peers(), None);
        assert_eq!(v.peers_agreeing(Choice::A), 3);

        let v = view(vec![], &[Choice::B; 4]);
        assert_eq!(v.unanimous_peers(), Some(Choice::B));
        assert_eq!(view(vec![], &[]).peer_share_a(), None);
    }

    #[test]
    fn test_win_streak() {
        let v = view(
            vec![past(1, Choice::A, false), past(2, Choice::A, true), past(3, Choice::A, true)],
            &[],
        );
        assert_eq!(v.win_streak(), 2);
    }
}
