//! Shared domain vocabulary: options, bets, slots, stages and decision phases.
//!
//! These are small `Copy` types used by every other module. Values that have
//! a restricted domain (`Bet`, `SlotId`) can only be built through validating
//! constructors, so a `Bet` in hand is always in `{1, 2, 3}`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Number of decision slots in every group.
pub const GROUP_SIZE: usize = 5;

/// Smallest legal bet.
pub const MIN_BET: u8 = 1;
/// Largest legal bet.
pub const MAX_BET: u8 = 3;

/// Group identifier, unique within a session.
pub type GroupId = u32;

/// One of the two options offered every round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
}

impl Choice {
    /// The option that is not `self`.
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

impl FromStr for Choice {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Self::A),
            "B" | "b" => Ok(Self::B),
            other => Err(ValidationError::UnknownChoice(other.to_string())),
        }
    }
}

/// Confidence bet in `{1, 2, 3}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Bet(u8);

impl Bet {
    pub const LOW: Bet = Bet(1);
    pub const MEDIUM: Bet = Bet(2);
    pub const HIGH: Bet = Bet(3);

    /// Validate a raw bet value.
    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if (MIN_BET..=MAX_BET).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::BetOutOfDomain(i64::from(value)))
        }
    }

    /// Clamp an arbitrary integer into the bet domain.
    pub fn saturating(value: i64) -> Self {
        Self(value.clamp(i64::from(MIN_BET), i64::from(MAX_BET)) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Bet {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i64> for Bet {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| ValidationError::BetOutOfDomain(value))
            .and_then(Self::new)
    }
}

impl From<Bet> for u8 {
    fn from(bet: Bet) -> Self {
        bet.0
    }
}

impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A seat in a group, numbered `1..=5`. Survives agent substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SlotId(u8);

impl SlotId {
    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if (1..=GROUP_SIZE as u8).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::UnknownSlot(value))
        }
    }

    /// Zero-based position of this slot in per-group arrays.
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// All slots of a group, in seat order.
    pub fn all() -> impl Iterator<Item = SlotId> {
        (1..=GROUP_SIZE as u8).map(SlotId)
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u8 + 1)
    }
}

impl TryFrom<u8> for SlotId {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SlotId> for u8 {
    fn from(slot: SlotId) -> Self {
        slot.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two decision stages of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    First,
    Second,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::Second => write!(f, "second"),
        }
    }
}

/// The four phases in which a slot must produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionPhase {
    FirstChoice,
    FirstBet,
    SecondChoice,
    SecondBet,
}

impl DecisionPhase {
    pub const ALL: [DecisionPhase; 4] = [
        Self::FirstChoice,
        Self::FirstBet,
        Self::SecondChoice,
        Self::SecondBet,
    ];

    pub fn stage(self) -> Stage {
        match self {
            Self::FirstChoice | Self::FirstBet => Stage::First,
            Self::SecondChoice | Self::SecondBet => Stage::Second,
        }
    }

    /// Whether this phase expects a choice (as opposed to a bet).
    pub fn expects_choice(self) -> bool {
        matches!(self, Self::FirstChoice | Self::SecondChoice)
    }
}

impl fmt::Display for DecisionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstChoice => write!(f, "first_choice"),
            Self::FirstBet => write!(f, "first_bet"),
            Self::SecondChoice => write!(f, "second_choice"),
            Self::SecondBet => write!(f, "second_bet"),
        }
    }
}
