//! Shared building blocks for the Latchkey access-point controller.
//!
//! This crate holds the pieces every other crate agrees on: the common
//! [`Error`] type, the fixed policy constants (lockout threshold, countdown
//! durations, remote timers) and the small domain types that flow between
//! the sensor, the persistence layer and the control state machine.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
