//! Group formation, coordination and the session runner.

pub mod connection;
pub mod coordinator;
pub mod gateway;
pub mod matching;
pub mod session;
pub mod slot;

pub use connection::ConnectionMonitor;
pub use coordinator::{GroupAggregates, GroupCoordinator, GroupReport};
pub use gateway::{InputGateway, PhaseBoard, PhaseInput, PhaseInputEvent, PhaseStatus, WirePayload};
pub use matching::{HeuristicSeats, Occupant, Participant, SeatFactory, SeatPlan, WaitingRoom};
pub use session::SessionRunner;
pub use slot::{Seat, Slot};
