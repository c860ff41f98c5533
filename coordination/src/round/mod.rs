//! One round of one group: phases, records, reveals and the state machine
//! that drives them.

pub mod machine;
pub mod phase;
pub mod record;
pub mod reveal;

pub use machine::{RoundEnv, RoundStateMachine};
pub use phase::{IllegalTransition, PhaseMachine, PhaseTransition, RoundPhase};
pub use record::{Agreement, PlayerRoundRecord, Response, ResponseOrigin, RoundRecord};
pub use reveal::{FirstReveal, PeerChoice, PeerOutcome, RevealBroadcast, SecondReveal, SlotView};
