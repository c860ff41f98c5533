//! Reversal schedule generation.
//!
//! A session's reward structure is fixed before the first round opens: a run
//! of blocks whose favoured option strictly alternates, and one realised
//! rewarded option per round drawn from the block's probability.

pub mod generator;
pub mod schedule;

pub use generator::{generate, is_tileable, ScheduleConfig};
pub use schedule::{Block, RoundSpec, Schedule};

/// Derive an independent, reproducible seed for one group of a session.
///
/// Mixes the group index into the session seed and runs a few xorshift64*
/// steps so neighbouring groups do not share low-bit structure.
pub fn derive_group_seed(session_seed: u64, group_index: u32) -> u64 {
    let mut state = session_seed ^ u64::from(group_index).wrapping_mul(0x517cc1b727220a95);
    if state == 0 {
        state = 0x9e3779b97f4a7c15;
    }
    let mut out = 0;
    for _ in 0..4 {
        state ^= state >> 12;
        state ^= state << 25;
        state ^= state >> 27;
        out = state.wrapping_mul(0x2545f4914f6cdd1d);
    }
    out
}
