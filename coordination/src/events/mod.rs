//! Session event publication
//!
//! # Event Flow
//!
//! ```text
//! ┌───────────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ GroupCoordinator  │────▶│  Event Bus   │────▶│  Subscribers │
//! │ RoundStateMachine │     │  (broadcast) │     │   (recv)     │
//! └───────────────────┘     └──────┬───────┘     └──────────────┘
//!                                  │
//!                                  ▼
//!                           ┌──────────────┐
//!                           │   history    │
//!                           │  (optional)  │
//!                           └──────────────┘
//! ```

pub mod bus;
pub mod types;

pub use bus::{EventBus, EventFilter, SharedEventBus};
pub use types::SessionEvent;
