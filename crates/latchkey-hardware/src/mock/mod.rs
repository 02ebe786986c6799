//! Mock device implementations for testing and development.
//!
//! This module provides simulated device implementations that can be controlled
//! programmatically without requiring physical hardware.

pub mod relay;
pub mod sensor;

// Re-export commonly used types
pub use relay::{MockRelay, MockRelayHandle};
pub use sensor::{MockSensor, MockSensorHandle};
