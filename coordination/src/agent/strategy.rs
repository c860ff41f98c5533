//! Strategy selection and the heuristic policies.
//!
//! A slot's strategy is resolved once from configuration into a
//! [`StrategyKind`]; heuristic kinds become a [`HeuristicPolicy`] that is
//! dispatched by `match`, never by name.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::view::VisibleRoundState;
use super::DecisionValue;
use crate::types::{Bet, Choice, DecisionPhase, Stage};

/// Weight social followers put on peers' revealed choices.
const SOCIAL_WEIGHT: f64 = 0.8;

/// Every strategy a slot can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Standard,
    RiskTaking,
    SocialFollower,
    Random,
    /// Backed by an external text-generation provider.
    LanguageModel,
}

impl StrategyKind {
    /// The local policy for this kind, `None` for provider-backed kinds.
    pub fn heuristic(self) -> Option<HeuristicStrategy> {
        match self {
            Self::Standard => Some(HeuristicStrategy::Standard),
            Self::RiskTaking => Some(HeuristicStrategy::RiskTaking),
            Self::SocialFollower => Some(HeuristicStrategy::SocialFollower),
            Self::Random => Some(HeuristicStrategy::Random),
            Self::LanguageModel => None,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::RiskTaking => write!(f, "risk_taking"),
            Self::SocialFollower => write!(f, "social_follower"),
            Self::Random => write!(f, "random"),
            Self::LanguageModel => write!(f, "language_model"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeuristicStrategy {
    #[default]
    Standard,
    RiskTaking,
    SocialFollower,
    Random,
}

impl fmt::Display for HeuristicStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::RiskTaking => write!(f, "risk_taking"),
            Self::SocialFollower => write!(f, "social_follower"),
            Self::Random => write!(f, "random"),
        }
    }
}

/// A seeded heuristic decision policy.
#[derive(Debug, Clone)]
pub struct HeuristicPolicy {
    strategy: HeuristicStrategy,
    rng: StdRng,
}

impl HeuristicPolicy {
    pub fn new(strategy: HeuristicStrategy, seed: u64) -> Self {
        Self {
            strategy,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn strategy(&self) -> HeuristicStrategy {
        self.strategy
    }

    pub fn decide(&mut self, phase: DecisionPhase, view: Option<&VisibleRoundState>) -> DecisionValue {
        if phase.expects_choice() {
            DecisionValue::Choice(self.choose(phase.stage(), view))
        } else {
            DecisionValue::Bet(self.bet(phase.stage(), view))
        }
    }

    pub fn choose(&mut self, stage: Stage, view: Option<&VisibleRoundState>) -> Choice {
        let Some(view) = view else {
            return self.coin();
        };
        match self.strategy {
            HeuristicStrategy::Random => self.coin(),
            HeuristicStrategy::Standard => {
                let own = view.own_estimate_a();
                let score = match (stage, view.peer_share_a()) {
                    (Stage::Second, Some(peers)) => 0.5 * own + 0.5 * peers,
                    _ => own,
                };
                self.lean(score, view.own_first_choice)
            }
            HeuristicStrategy::RiskTaking => match stage {
                Stage::First => match view.last_round() {
                    Some(last) if last.correct => last.second_choice,
                    Some(last) => last.second_choice.other(),
                    None => self.coin(),
                },
                Stage::Second => {
                    let Some(own) = view.own_first_choice else {
                        return self.coin();
                    };
                    if view.peers_agreeing(own) < view.peer_first_choices.len() {
                        own.other()
                    } else {
                        own
                    }
                }
            },
            HeuristicStrategy::SocialFollower => {
                if stage == Stage::Second {
                    if let Some(choice) = view.unanimous_peers() {
                        return choice;
                    }
                }
                let own = view.own_estimate_a();
                let peers = match stage {
                    Stage::Second => view.peer_share_a(),
                    Stage::First => view.last_peer_majority().map(|c| match c {
                        Choice::A => 1.0,
                        Choice::B => 0.0,
                    }),
                };
                let score = match peers {
                    Some(peers) => SOCIAL_WEIGHT * peers + (1.0 - SOCIAL_WEIGHT) * own,
                    None => own,
                };
                self.lean(score, view.own_first_choice)
            }
        }
    }

    pub fn bet(&mut self, stage: Stage, view: Option<&VisibleRoundState>) -> Bet {
        let Some(view) = view else {
            return match self.strategy {
                HeuristicStrategy::Random => self.uniform_bet(),
                _ => Bet::LOW,
            };
        };
        let streak = view.win_streak();
        let current = match stage {
            Stage::First => view.own_first_choice,
            Stage::Second => view.own_second_choice,
        };
        let agreeing = match (stage, current) {
            (Stage::Second, Some(choice)) if !view.peer_first_choices.is_empty() => {
                Some(view.peers_agreeing(choice))
            }
            _ => None,
        };

        match self.strategy {
            HeuristicStrategy::Random => self.uniform_bet(),
            HeuristicStrategy::Standard => {
                let base: i64 = match streak {
                    0 => 1,
                    1 | 2 => 2,
                    _ => 3,
                };
                let adjust = match agreeing {
                    Some(n) if n >= 3 => 1,
                    Some(n) if n <= 1 => -1,
                    _ => 0,
                };
                Bet::saturating(base + adjust)
            }
            HeuristicStrategy::RiskTaking => {
                let confident = (view.own_estimate_a() - 0.5).abs() >= 0.2;
                if streak >= 1 || confident || agreeing == Some(4) {
                    Bet::HIGH
                } else {
                    Bet::LOW
                }
            }
            HeuristicStrategy::SocialFollower => match agreeing {
                Some(4) => Bet::HIGH,
                Some(n) if n >= 3 => Bet::MEDIUM,
                Some(_) => Bet::LOW,
                None if streak >= 2 => Bet::MEDIUM,
                None => Bet::LOW,
            },
        }
    }

    fn coin(&mut self) -> Choice {
        if self.rng.random_bool(0.5) {
            Choice::A
        } else {
            Choice::B
        }
    }

    fn uniform_bet(&mut self) -> Bet {
        Bet::saturating(self.rng.random_range(1..=3))
    }

    /// `A` above 0.5, `B` below; ties keep `fallback` or flip a coin.
    fn lean(&mut self, score_a: f64, fallback: Option<Choice>) -> Choice {
        const EPSILON: f64 = 1e-9;
        if score_a > 0.5 + EPSILON {
            Choice::A
        } else if score_a < 0.5 - EPSILON {
            Choice::B
        } else {
            fallback.unwrap_or_else(|| self.coin())
        }
    }
}
