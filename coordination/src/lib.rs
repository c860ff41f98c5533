//! Coordination core for five-player social reversal-learning sessions.
//!
//! - [`sequence`]: reversal schedule generation and the CSV artifact
//! - [`scoring`]: point deltas and the session-end bonus draw
//! - [`agent`]: the decision-agent interface, heuristic strategies, human
//!   input streams and the language-model provider contract
//! - [`round`]: the phase-barrier round state machine, records and reveals
//! - [`group`]: waiting room, input gateway, connection monitor, group
//!   coordinator and session runner
//! - [`events`]: broadcast bus for phase and reveal events
//! - [`config`]: session configuration and validation
//!
//! # Usage
//!
//! ```ignore
//! use coordination::{EventBus, HeuristicSeats, SessionConfig, SessionRunner};
//!
//! let config = SessionConfig::from_toml_str(&text)?;
//! let runner = SessionRunner::new(config, EventBus::new().shared())?;
//! let reports = runner.run_unattended(4, &HeuristicSeats { seed: 7 }).await?;
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod events;
pub mod group;
pub mod round;
pub mod scoring;
pub mod sequence;
pub mod types;

pub use agent::{
    AgentKind, Decision, DecisionAgent, DecisionProvider, DecisionSource, DecisionValue,
    HeuristicStrategy, ProviderAgent, ProviderRequest, ProviderResponse, StrategyKind,
    VisibleRoundState,
};
pub use config::{SessionConfig, SlotConfig, TaskMode};
pub use error::{AgentError, ConfigurationError, ProviderError, SessionError, ValidationError};
pub use events::{EventBus, SessionEvent, SharedEventBus};
pub use group::{
    GroupCoordinator, GroupReport, HeuristicSeats, InputGateway, Participant, Seat, SeatFactory,
    SessionRunner, WaitingRoom,
};
pub use round::{ResponseOrigin, RoundPhase, RoundRecord};
pub use scoring::{ScoringEngine, SessionOutcome};
pub use sequence::{generate, Schedule, ScheduleConfig};
pub use types::{Bet, Choice, DecisionPhase, GroupId, SlotId, Stage, GROUP_SIZE};
