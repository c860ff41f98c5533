//! The frozen schedule and its CSV artifact.

use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::Choice;

/// Maximal run of rounds sharing one favoured option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u32,
    pub favored: Choice,
    pub reward_prob: f64,
    /// 1-based index of the block's first round.
    pub start_round: u32,
    pub len: u32,
}

/// One round of the schedule with its realised draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSpec {
    /// 1-based round index.
    pub index: u32,
    pub block: u32,
    pub favored: Choice,
    pub reward_prob: f64,
    /// Option that pays this round, shared by the whole group.
    pub rewarded: Choice,
    /// First round of every block after the first.
    pub is_reversal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub seed: u64,
    pub blocks: Vec<Block>,
    pub rounds: Vec<RoundSpec>,
}

impl Schedule {
    pub fn total_rounds(&self) -> u32 {
        self.rounds.len() as u32
    }

    /// Look up a round by its 1-based index.
    pub fn round(&self, index: u32) -> Option<&RoundSpec> {
        index
            .checked_sub(1)
            .and_then(|i| self.rounds.get(i as usize))
    }

    pub fn reversal_rounds(&self) -> Vec<u32> {
        self.rounds
            .iter()
            .filter(|r| r.is_reversal)
            .map(|r| r.index)
            .collect()
    }

    /// Ordered `(round, rewarded option)` pairs.
    pub fn rewarded_sequence(&self) -> Vec<(u32, Choice)> {
        self.rounds.iter().map(|r| (r.index, r.rewarded)).collect()
    }

    /// Render the reversal schedule artifact.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("round,rewarded_option,favored_option,is_reversal\n");
        for r in &self.rounds {
            // Writing into a String cannot fail.
            let _ = writeln!(out, "{},{},{},{}", r.index, r.rewarded, r.favored, r.is_reversal);
        }
        out
    }

    pub fn write_csv(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_csv())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::{generate, ScheduleConfig};

    fn schedule() -> Schedule {
        generate(&ScheduleConfig {
            total_rounds: 8,
            min_block_len: 3,
            max_block_len: 5,
            favored_prob: 0.75,
            seed: 42,
        })
        .unwrap()
    }

    #[test]
    fn test_round_lookup_is_one_based() {
        let s = schedule();
        assert!(s.round(0).is_none());
        assert_eq!(s.round(1).unwrap().index, 1);
        assert_eq!(s.round(8).unwrap().index, 8);
        assert!(s.round(9).is_none());
    }

    #[test]
    fn test_csv_layout() {
        let s = schedule();
        let csv = s.to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "round,rewarded_option,favored_option,is_reversal");
        assert_eq!(lines.len(), 9);
        assert!(lines[1].starts_with("1,"));
        assert!(lines[1].ends_with(",false"));
    }

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.csv");
        let s = schedule();
        s.write_csv(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), s.to_csv());
    }
}
