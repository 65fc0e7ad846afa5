// BayunGraph Availability Guard
//
// Shared start/stop state of a database. Recovery polls it between
// transactions and between phases; anyone holding the guard can shut the
// database down while it is still starting.

use parking_lot::RwLock;
use log::info;

use super::error::DatabaseStartAborted;

/// Lifecycle state tracked by the guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityState {
    Starting,
    Available,
    Shutdown { reason: String },
}

/// Shared database availability
#[derive(Debug)]
pub struct AvailabilityGuard {
    state: RwLock<AvailabilityState>,
}

impl Default for AvailabilityGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl AvailabilityGuard {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(AvailabilityState::Starting),
        }
    }

    pub fn state(&self) -> AvailabilityState {
        self.state.read().clone()
    }

    /// Mark the database as available. A guard that was shut down stays
    /// shut down.
    pub fn make_available(&self) -> bool {
        let mut state = self.state.write();
        match *state {
            AvailabilityState::Shutdown { .. } => false,
            _ => {
                *state = AvailabilityState::Available;
                true
            }
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(*self.state.read(), AvailabilityState::Available)
    }

    /// Stop the database. Safe to call from any thread, at any time.
    pub fn shutdown(&self, reason: impl Into<String>) {
        let mut state = self.state.write();
        if matches!(*state, AvailabilityState::Shutdown { .. }) {
            return;
        }
        let reason = reason.into();
        info!("Availability guard shut down: {}", reason);
        *state = AvailabilityState::Shutdown { reason };
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(*self.state.read(), AvailabilityState::Shutdown { .. })
    }

    /// Fail with `DatabaseStartAborted` if the guard was shut down
    pub fn check_not_shutdown(&self) -> Result<(), DatabaseStartAborted> {
        match &*self.state.read() {
            AvailabilityState::Shutdown { reason } => Err(DatabaseStartAborted {
                reason: reason.clone(),
            }),
            _ => Ok(()),
        }
    }
}
