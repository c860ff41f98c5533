//! Connection state of human slots.
//!
//! Transports report disconnects and activity; the round state machine
//! reports missed deadlines. A slot marked disconnected is handed to its
//! substitute at the next phase boundary and handed back at the first
//! boundary after activity is seen again.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::types::{SlotId, GROUP_SIZE};

#[derive(Debug, Clone, Copy)]
struct SlotConnection {
    connected: bool,
    missed_streak: u32,
}

impl Default for SlotConnection {
    fn default() -> Self {
        Self {
            connected: true,
            missed_streak: 0,
        }
    }
}

#[derive(Debug)]
pub struct ConnectionMonitor {
    /// Consecutive missed deadlines that mark a slot disconnected.
    missed_limit: Option<u32>,
    slots: Mutex<[SlotConnection; GROUP_SIZE]>,
}

impl ConnectionMonitor {
    pub fn new(missed_limit: Option<u32>) -> Self {
        Self {
            missed_limit,
            slots: Mutex::new([SlotConnection::default(); GROUP_SIZE]),
        }
    }

    fn lock(&self) -> MutexGuard<'_, [SlotConnection; GROUP_SIZE]> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self, slot: SlotId) -> bool {
        self.lock()[slot.index()].connected
    }

    pub fn missed_streak(&self, slot: SlotId) -> u32 {
        self.lock()[slot.index()].missed_streak
    }

    /// The transport for `slot` is gone.
    pub fn mark_disconnected(&self, slot: SlotId) {
        let mut slots = self.lock();
        if slots[slot.index()].connected {
            info!(slot = %slot, "Slot disconnected");
        }
        slots[slot.index()].connected = false;
    }

    /// The transport for `slot` is back.
    pub fn mark_connected(&self, slot: SlotId) {
        let mut slots = self.lock();
        let state = &mut slots[slot.index()];
        if !state.connected {
            info!(slot = %slot, "Slot reconnected");
        }
        state.connected = true;
        state.missed_streak = 0;
    }

    /// Any input from the participant counts as reconnection.
    pub fn record_activity(&self, slot: SlotId) {
        self.mark_connected(slot);
    }

    /// Returns `true` if this miss crossed the limit and disconnected the slot.
    pub fn record_missed(&self, slot: SlotId) -> bool {
        let mut slots = self.lock();
        let state = &mut slots[slot.index()];
        state.missed_streak += 1;
        match self.missed_limit {
            Some(limit) if state.connected && state.missed_streak >= limit => {
                state.connected = false;
                info!(slot = %slot, missed = state.missed_streak, "Slot disconnected after missed deadlines");
                true
            }
            _ => false,
        }
    }

    pub fn record_response(&self, slot: SlotId) {
        self.lock()[slot.index()].missed_streak = 0;
    }
}
