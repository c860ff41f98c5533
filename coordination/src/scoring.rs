//! Point deltas and session-end bonus selection.
//!
//! Scoring is pure: a delta depends only on the choice, the bet and the
//! round's rewarded option. The bonus draw happens once per group after the
//! last round closes and is independent of the feedback players saw.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::round::record::RoundRecord;
use crate::types::{Bet, Choice, GroupId, SlotId, Stage, GROUP_SIZE};

/// Points per bet unit.
pub const DEFAULT_REWARD_UNIT: i32 = 20;

/// `bet × unit`, positive when `choice` is the rewarded option.
pub fn score(choice: Choice, bet: Bet, rewarded: Choice, reward_unit: i32) -> i32 {
    let magnitude = i32::from(bet.get()).saturating_mul(reward_unit);
    if choice == rewarded {
        magnitude
    } else {
        -magnitude
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringEngine {
    reward_unit: i32,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self {
            reward_unit: DEFAULT_REWARD_UNIT,
        }
    }
}

impl ScoringEngine {
    pub fn new(reward_unit: i32) -> Self {
        Self { reward_unit }
    }

    pub fn reward_unit(&self) -> i32 {
        self.reward_unit
    }

    pub fn score(&self, choice: Choice, bet: Bet, rewarded: Choice) -> i32 {
        score(choice, bet, rewarded, self.reward_unit)
    }

    /// Draw each player's paying `(round, stage)`.
    ///
    /// Every slot gets its own independent, uniform draw over all recorded
    /// rounds and both stages. Returns no bonus outcomes when `records` is
    /// empty.
    pub fn select_bonus_outcomes<R: Rng>(
        &self,
        group: GroupId,
        records: &[RoundRecord],
        rng: &mut R,
    ) -> SessionOutcome {
        let mut players = Vec::with_capacity(GROUP_SIZE);
        for slot in SlotId::all() {
            let first_total = records.iter().map(|r| r.players[slot.index()].first_delta).sum();
            let second_total = records.iter().map(|r| r.players[slot.index()].second_delta).sum();

            let bonus = if records.is_empty() {
                None
            } else {
                let pick = rng.random_range(0..records.len());
                let stage = if rng.random_bool(0.5) {
                    Stage::First
                } else {
                    Stage::Second
                };
                let record = &records[pick];
                Some(BonusOutcome {
                    round: record.round,
                    stage,
                    bonus_delta: record.players[slot.index()].delta(stage),
                })
            };

            players.push(PlayerOutcome {
                slot,
                bonus,
                first_stage_total: first_total,
                second_stage_total: second_total,
            });
        }

        SessionOutcome {
            group,
            rounds_played: records.len() as u32,
            players,
        }
    }
}

/// The `(round, stage)` that determines a player's bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusOutcome {
    pub round: u32,
    pub stage: Stage,
    pub bonus_delta: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerOutcome {
    pub slot: SlotId,
    pub bonus: Option<BonusOutcome>,
    pub first_stage_total: i32,
    pub second_stage_total: i32,
}

/// Session outcome artifact for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub group: GroupId,
    pub rounds_played: u32,
    pub players: Vec<PlayerOutcome>,
}

impl SessionOutcome {
    pub fn player(&self, slot: SlotId) -> Option<&PlayerOutcome> {
        self.players.iter().find(|p| p.slot == slot)
    }
}
