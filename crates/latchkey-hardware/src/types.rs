//! Types reported by the sensor and the relay.

use serde::{Deserialize, Serialize};

/// What a fingerprint sensor reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorInfo {
    /// Device name (e.g. "R307", "MockSensor").
    pub name: String,

    pub model: String,

    /// Number of template slots, numbered from 0.
    pub library_capacity: u16,

    pub firmware_version: Option<String>,
}

impl SensorInfo {
    pub fn new(name: impl Into<String>, model: impl Into<String>, library_capacity: u16) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            library_capacity,
            firmware_version: None,
        }
    }

    pub fn with_firmware_version(mut self, firmware_version: impl Into<String>) -> Self {
        self.firmware_version = Some(firmware_version.into());
        self
    }
}

/// Energized state of the lock relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayState {
    /// Relay released, door held shut.
    Deactivated,
    /// Relay energized, door released.
    Activated,
    /// Relay released for good and its line freed.
    ShutDown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_info_builder() {
        let info = SensorInfo::new("R307", "Optical Fingerprint Sensor", 1000)
            .with_firmware_version("1.2.0");

        assert_eq!(info.library_capacity, 1000);
        assert_eq!(info.firmware_version.as_deref(), Some("1.2.0"));
    }

    #[test]
    fn test_relay_state_serialization() {
        let json = serde_json::to_string(&RelayState::ShutDown).unwrap();
        assert_eq!(json, "\"shut_down\"");
    }
}
