//! Composite control state and its transition history.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Maximum number of state transitions to keep in history.
pub const MAX_HISTORY_SIZE: usize = 100;

/// `{Locked, Unlocked} x {DoorIdle, DoorOpening} x {ManualUnlocksEnabled, ManualUnlocksDisabled}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlState {
    pub locked: bool,
    pub door_opening: bool,
    pub manual_unlocks_enabled: bool,
}

impl Default for ControlState {
    /// System unlocked, door idle, manual unlocks enabled.
    fn default() -> Self {
        Self {
            locked: false,
            door_opening: false,
            manual_unlocks_enabled: true,
        }
    }
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            if self.locked { "Locked" } else { "Unlocked" },
            if self.door_opening { "DoorOpening" } else { "DoorIdle" },
            if self.manual_unlocks_enabled {
                "ManualUnlocksEnabled"
            } else {
                "ManualUnlocksDisabled"
            },
        )
    }
}

/// A recorded change of [`ControlState`].
///
/// The timestamp is process-local and is not serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: ControlState,
    pub to: ControlState,
    #[serde(skip, default = "Instant::now")]
    pub timestamp: Instant,
}

impl StateTransition {
    pub fn new(from: ControlState, to: ControlState) -> Self {
        Self {
            from,
            to,
            timestamp: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// Current [`ControlState`] plus a bounded history of changes.
#[derive(Debug)]
pub struct StateTracker {
    current: ControlState,
    history: VecDeque<StateTransition>,
}

impl StateTracker {
    pub fn new(initial: ControlState) -> Self {
        Self {
            current: initial,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn current(&self) -> ControlState {
        self.current
    }

    /// Apply `change` to the current state and record the result if
    /// anything differs. Returns whether the state changed.
    pub fn update(&mut self, change: impl FnOnce(&mut ControlState)) -> bool {
        let from = self.current;
        change(&mut self.current);
        if from == self.current {
            return false;
        }
        if self.history.len() >= MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(StateTransition::new(from, self.current));
        true
    }

    /// Recorded transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new(ControlState::default())
    }
}
