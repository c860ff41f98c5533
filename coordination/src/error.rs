//! Error taxonomy for session coordination.
//!
//! Only configuration errors abort a session. Everything else is absorbed
//! where it occurs and surfaces through response origin tags and logs.
//!
//! | Kind                 | Raised by                      | Effect                                   |
//! |----------------------|--------------------------------|------------------------------------------|
//! | `ConfigurationError` | schedule / session validation  | fatal at session start                   |
//! | `ValidationError`    | input gateway                  | rejects one input, slot stays pending    |
//! | timeout fallback     | round state machine            | not an error, origin `timeout_fallback`  |
//! | disconnection        | connection monitor             | not an error, origin `agent_substituted` |
//! | `ProviderError`      | language-model provider        | absorbed by the secondary policy         |
//! | `SessionError`       | session runner                 | group task failed to complete            |

use thiserror::Error;

use crate::round::phase::IllegalTransition;
use crate::types::{DecisionPhase, GroupId, SlotId};

/// Impossible schedule or session parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("total rounds must be at least 1")]
    NoRounds,

    #[error("invalid block length bounds [{min}, {max}]")]
    InvalidBlockBounds { min: u32, max: u32 },

    #[error("favoured probability {0} is outside (0, 1)")]
    InvalidProbability(f64),

    #[error("{total} rounds cannot be tiled with blocks of length {min}..={max}")]
    Untileable { total: u32, min: u32, max: u32 },

    #[error("reward unit must be positive")]
    InvalidRewardUnit,

    #[error("reward unit {unit} overflows point totals over {rounds} rounds")]
    RewardUnitTooLarge { unit: i32, rounds: u32 },

    #[error("phase deadline must be positive")]
    InvalidDeadline,

    #[error("provider margin {margin_ms}ms must be shorter than the phase deadline {deadline_ms}ms")]
    ProviderMarginTooLarge { margin_ms: u64, deadline_ms: u64 },

    #[error("a group needs exactly 5 slots, got {0}")]
    SlotCount(usize),

    #[error("fallback strategy must be a heuristic, not {0}")]
    FallbackNotHeuristic(String),

    #[error("{0}")]
    Invalid(String),
}

/// A phase input that was refused. The slot remains pending.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown group {0}")]
    UnknownGroup(GroupId),

    #[error("unknown slot {0}")]
    UnknownSlot(u8),

    #[error("slot {0} is not driven by a human input stream")]
    NotHumanSlot(SlotId),

    #[error("group is not accepting {got} (current: {current})")]
    PhaseMismatch { got: DecisionPhase, current: String },

    #[error("payload does not match phase {0}")]
    PayloadMismatch(DecisionPhase),

    #[error("bet {0} is outside 1..=3")]
    BetOutOfDomain(i64),

    #[error("unknown choice {0:?}")]
    UnknownChoice(String),

    #[error("slot {slot} already responded to {phase} in round {round}")]
    AlreadyResponded {
        slot: SlotId,
        round: u32,
        phase: DecisionPhase,
    },

    #[error("slot {0} is controlled by its substitute this phase")]
    SlotSubstituted(SlotId),

    #[error("group {0} has closed")]
    GroupClosed(GroupId),
}

/// Failure of the external text-generation provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("provider did not answer within {0}ms")]
    Timeout(u64),

    #[error("provider transport error: {0}")]
    Transport(String),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider reply could not be parsed: {0}")]
    Malformed(String),

    #[error("provider returned no content")]
    Empty,
}

/// Why an agent could not produce a decision itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("input stream closed")]
    InputClosed,
}

/// A group task did not run to completion.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("round machine fault: {0}")]
    Transition(#[from] IllegalTransition),

    #[error("group task failed: {0}")]
    Join(String),
}
