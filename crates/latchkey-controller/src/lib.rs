//! Policy core of the Latchkey access point.
//!
//! - [`countdown`]: a single cancellable countdown run
//! - [`orchestrator`]: one countdown per kind, status text precedence and
//!   completion effects
//! - [`display`]: the display collaborator and an in-memory implementation
//! - [`state`]: the composite lock/door/manual-unlock state and its history
//! - [`controller`]: the actor that owns all of the above and serializes
//!   local requests, remote commands and countdown completions
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use latchkey_biometric::{AuthenticationGate, GateConfig};
//! use latchkey_controller::{Controller, ControllerConfig, VirtualDisplay};
//! use latchkey_hardware::mock::{MockRelay, MockSensor};
//! use latchkey_storage::{Database, SettingsStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (sensor, _finger) = MockSensor::new();
//! let (relay, _strike) = MockRelay::new();
//! let settings = SettingsStore::load(Database::in_memory().await?).await?;
//!
//! let gate = Arc::new(AuthenticationGate::new(sensor.into(), GateConfig::default()));
//! let (controller, handle) = Controller::new(
//!     ControllerConfig::default(),
//!     gate,
//!     relay.into(),
//!     settings,
//!     Arc::new(VirtualDisplay::new()),
//! );
//! tokio::spawn(controller.run());
//!
//! handle.open_door().await?;
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod controller;
pub mod countdown;
pub mod display;
pub mod orchestrator;
pub mod state;

pub use controller::{ControlEvent, ControlHandle, Controller, ControllerConfig, ControllerSnapshot};
pub use countdown::{CountdownEngine, CountdownSignal, RunId};
pub use display::{Display, VirtualDisplay, truncate_text};
pub use orchestrator::{
    CountdownEffect, CountdownOrchestrator, CountdownTiming, TEXT_PRECEDENCE, compose_text,
};
pub use state::{ControlState, StateTracker, StateTransition};
