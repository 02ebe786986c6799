//! Error types for the sensor and the relay.

use latchkey_core::CredentialId;

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// The device is gone, or was shut down and may not be driven again.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// The sensor did not answer, or answered with something unusable.
    #[error("Sensor communication failed: {message}")]
    Communication { message: String },

    /// The sensor refused to write a template into a slot.
    #[error("Could not store template in slot {slot}: {reason}")]
    TemplateStorage { slot: CredentialId, reason: String },

    /// The strike relay did not switch.
    #[error("Relay did not switch: {message}")]
    Relay { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    pub fn communication(message: impl Into<String>) -> Self {
        Self::Communication {
            message: message.into(),
        }
    }

    pub fn template_storage(slot: CredentialId, reason: impl Into<String>) -> Self {
        Self::TemplateStorage {
            slot,
            reason: reason.into(),
        }
    }

    pub fn relay(message: impl Into<String>) -> Self {
        Self::Relay {
            message: message.into(),
        }
    }

    /// Whether retrying the same call could succeed.
    ///
    /// A disconnected device stays disconnected; a noisy bus or a relay
    /// that missed one switch may recover.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Communication { .. } | Self::Relay { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            HardwareError::disconnected("R307").to_string(),
            "Device disconnected: R307"
        );
        assert_eq!(
            HardwareError::template_storage(CredentialId::new(4), "write protected").to_string(),
            "Could not store template in slot 4: write protected"
        );
        assert_eq!(
            HardwareError::relay("coil open").to_string(),
            "Relay did not switch: coil open"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(HardwareError::communication("checksum mismatch").is_transient());
        assert!(HardwareError::relay("contact bounce").is_transient());
        assert!(!HardwareError::disconnected("relay").is_transient());
    }
}
