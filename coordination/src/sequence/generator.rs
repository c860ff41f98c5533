//! Block tiling and per-round reward realisation.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::schedule::{Block, RoundSpec, Schedule};
use crate::error::ConfigurationError;
use crate::types::Choice;

/// Parameters of one schedule draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub total_rounds: u32,
    pub min_block_len: u32,
    pub max_block_len: u32,
    /// Probability that the favoured option is the rewarded one.
    pub favored_prob: f64,
    pub seed: u64,
}

impl ScheduleConfig {
    /// Reject parameters for which no schedule exists.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.total_rounds == 0 {
            return Err(ConfigurationError::NoRounds);
        }
        if self.min_block_len == 0 || self.min_block_len > self.max_block_len {
            return Err(ConfigurationError::InvalidBlockBounds {
                min: self.min_block_len,
                max: self.max_block_len,
            });
        }
        if !(self.favored_prob > 0.0 && self.favored_prob < 1.0) {
            return Err(ConfigurationError::InvalidProbability(self.favored_prob));
        }
        if !is_tileable(self.total_rounds, self.min_block_len, self.max_block_len) {
            return Err(ConfigurationError::Untileable {
                total: self.total_rounds,
                min: self.min_block_len,
                max: self.max_block_len,
            });
        }
        Ok(())
    }
}

/// Whether `rounds` can be written as a sum of lengths in `min..=max`.
///
/// Some block count `k` must satisfy `k * min <= rounds <= k * max`, which
/// holds exactly when `ceil(rounds / max) <= floor(rounds / min)`.
pub fn is_tileable(rounds: u32, min: u32, max: u32) -> bool {
    if rounds == 0 {
        return true;
    }
    if min == 0 || min > max {
        return false;
    }
    rounds.div_ceil(max) <= rounds / min
}

/// Produce the full, frozen schedule for `config`.
///
/// The first favoured option is a fair coin; every following block favours
/// the other option. Block lengths are drawn uniformly from the lengths that
/// leave a tileable remainder, so the last block ends exactly on the final
/// round.
pub fn generate(config: &ScheduleConfig) -> Result<Schedule, ConfigurationError> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut favored = if rng.random_bool(0.5) {
        Choice::A
    } else {
        Choice::B
    };

    let mut blocks = Vec::new();
    let mut start = 1;
    let mut remaining = config.total_rounds;
    while remaining > 0 {
        let upper = config.max_block_len.min(remaining);
        let candidates: Vec<u32> = (config.min_block_len..=upper)
            .filter(|len| is_tileable(remaining - len, config.min_block_len, config.max_block_len))
            .collect();
        let Some(&len) = candidates.choose(&mut rng) else {
            return Err(ConfigurationError::Untileable {
                total: config.total_rounds,
                min: config.min_block_len,
                max: config.max_block_len,
            });
        };

        blocks.push(Block {
            index: blocks.len() as u32,
            favored,
            reward_prob: config.favored_prob,
            start_round: start,
            len,
        });
        start += len;
        remaining -= len;
        favored = favored.other();
    }

    let mut rounds = Vec::with_capacity(config.total_rounds as usize);
    for block in &blocks {
        for offset in 0..block.len {
            let rewarded = if rng.random_bool(block.reward_prob) {
                block.favored
            } else {
                block.favored.other()
            };
            rounds.push(RoundSpec {
                index: block.start_round + offset,
                block: block.index,
                favored: block.favored,
                reward_prob: block.reward_prob,
                rewarded,
                is_reversal: offset == 0 && block.index > 0,
            });
        }
    }

    debug!(
        seed = config.seed,
        rounds = rounds.len(),
        blocks = blocks.len(),
        "Schedule generated"
    );

    Ok(Schedule {
        seed: config.seed,
        blocks,
        rounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(total: u32, min: u32, max: u32, seed: u64) -> ScheduleConfig {
        ScheduleConfig {
            total_rounds: total,
            min_block_len: min,
            max_block_len: max,
            favored_prob: 0.75,
            seed,
        }
    }

    #[test]
    fn test_tileability() {
        assert!(is_tileable(0, 3, 5));
        assert!(is_tileable(8, 3, 5));
        assert!(is_tileable(64, 8, 12));
        assert!(!is_tileable(7, 4, 5));
        assert!(!is_tileable(2, 3, 5));
        assert!(is_tileable(5, 5, 5));
        assert!(!is_tileable(6, 5, 5));
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert_eq!(generate(&config(0, 3, 5, 1)).unwrap_err(), ConfigurationError::NoRounds);
        assert!(matches!(
            generate(&config(8, 0, 5, 1)),
            Err(ConfigurationError::InvalidBlockBounds { .. })
        ));
        assert!(matches!(
            generate(&config(8, 6, 5, 1)),
            Err(ConfigurationError::InvalidBlockBounds { .. })
        ));
        assert!(matches!(
            generate(&config(7, 4, 5, 1)),
            Err(ConfigurationError::Untileable { total: 7, min: 4, max: 5 })
        ));
        let mut bad_p = config(8, 3, 5, 1);
        bad_p.favored_prob = 1.0;
        assert!(matches!(
            generate(&bad_p),
            Err(ConfigurationError::InvalidProbability(_))
        ));
    }

    #[test]
    fn test_single_block_has_no_reversal() {
        let schedule = generate(&config(5, 5, 5, 9)).unwrap();
        assert_eq!(schedule.blocks.len(), 1);
        assert!(schedule.reversal_rounds().is_empty());
    }

    #[test]
    fn test_reversal_flags_mark_block_starts() {
        let schedule = generate(&config(64, 8, 12, 3)).unwrap();
        let starts: Vec<u32> = schedule.blocks.iter().skip(1).map(|b| b.start_round).collect();
        assert_eq!(schedule.reversal_rounds(), starts);
        assert!(!schedule.rounds[0].is_reversal);
    }
}
