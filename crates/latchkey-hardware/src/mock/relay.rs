//! Mock lock relay implementation for testing and development.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::{HardwareError, Result, traits::LockRelay, types::RelayState};

#[derive(Debug)]
struct RelayLog {
    state: RelayState,
    transitions: Vec<RelayState>,
    fail_activation: bool,
}

fn lock(log: &Mutex<RelayLog>) -> MutexGuard<'_, RelayLog> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock relay that records every switch.
///
/// # Examples
///
/// ```
/// use latchkey_hardware::mock::MockRelay;
/// use latchkey_hardware::traits::LockRelay;
/// use latchkey_hardware::RelayState;
///
/// #[tokio::main]
/// async fn main() -> latchkey_hardware::Result<()> {
///     let (mut relay, handle) = MockRelay::new();
///     relay.activate().await?;
///     relay.deactivate().await?;
///     assert_eq!(handle.transitions(), vec![RelayState::Activated, RelayState::Deactivated]);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockRelay {
    log: Arc<Mutex<RelayLog>>,
}

impl MockRelay {
    /// Create a released relay together with its observation handle.
    pub fn new() -> (Self, MockRelayHandle) {
        let log = Arc::new(Mutex::new(RelayLog {
            state: RelayState::Deactivated,
            transitions: Vec::new(),
            fail_activation: false,
        }));
        let relay = Self {
            log: Arc::clone(&log),
        };
        (relay, MockRelayHandle { log })
    }

    fn switch(&mut self, next: RelayState) -> Result<()> {
        let mut log = lock(&self.log);
        if log.state == RelayState::ShutDown {
            return Err(HardwareError::disconnected("relay line released"));
        }
        debug!(from = ?log.state, to = ?next, "Mock relay switched");
        log.state = next;
        log.transitions.push(next);
        Ok(())
    }
}

impl LockRelay for MockRelay {
    async fn activate(&mut self) -> Result<()> {
        if lock(&self.log).fail_activation {
            return Err(HardwareError::relay("coil did not energize"));
        }
        self.switch(RelayState::Activated)
    }

    async fn deactivate(&mut self) -> Result<()> {
        self.switch(RelayState::Deactivated)
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.switch(RelayState::ShutDown)
    }

    fn state(&self) -> RelayState {
        lock(&self.log).state
    }
}

/// Observation handle for a [`MockRelay`].
#[derive(Debug, Clone)]
pub struct MockRelayHandle {
    log: Arc<Mutex<RelayLog>>,
}

impl MockRelayHandle {
    /// Current relay state.
    pub fn state(&self) -> RelayState {
        lock(&self.log).state
    }

    /// Every state the relay was switched to, oldest first.
    pub fn transitions(&self) -> Vec<RelayState> {
        lock(&self.log).transitions.clone()
    }

    /// Make activation fail, simulating a broken coil.
    pub fn fail_activation(&self, fail: bool) {
        lock(&self.log).fail_activation = fail;
    }
}
