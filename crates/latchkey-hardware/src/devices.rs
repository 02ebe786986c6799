//! Enum wrappers for hardware device dispatch.
//!
//! Native `async fn` in traits (RPITIT) are not object-safe, so the
//! controller cannot hold a `Box<dyn FingerprintSensor>`. These enums give
//! it a single concrete type per device family instead, dispatching to the
//! variant at compile time. A concrete type also keeps the futures `Send`,
//! which is what lets a scan run on its own Tokio task.
//!
//! # Examples
//!
//! ```
//! use latchkey_hardware::devices::AnyFingerprintSensor;
//! use latchkey_hardware::mock::MockSensor;
//!
//! let (sensor, _handle) = MockSensor::new();
//! let any_sensor = AnyFingerprintSensor::Mock(sensor);
//! ```

use latchkey_core::CredentialId;

use crate::mock::{MockRelay, MockSensor};
use crate::traits::{FingerprintSensor, LockRelay};
use crate::{SensorInfo, RelayState, Result};

/// Enum wrapper for fingerprint sensor dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyFingerprintSensor {
    /// Mock sensor for development and testing.
    Mock(MockSensor),
}

impl FingerprintSensor for AnyFingerprintSensor {
    async fn has_finger(&mut self) -> Result<bool> {
        match self {
            Self::Mock(device) => device.has_finger().await,
        }
    }

    async fn search(&mut self) -> Result<Option<CredentialId>> {
        match self {
            Self::Mock(device) => device.search().await,
        }
    }

    async fn create_model(&mut self) -> Result<Option<Vec<u8>>> {
        match self {
            Self::Mock(device) => device.create_model().await,
        }
    }

    async fn store_model(&mut self, id: CredentialId, template: &[u8]) -> Result<()> {
        match self {
            Self::Mock(device) => device.store_model(id, template).await,
        }
    }

    async fn clear_all(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.clear_all().await,
        }
    }

    async fn sensor_info(&self) -> Result<SensorInfo> {
        match self {
            Self::Mock(device) => device.sensor_info().await,
        }
    }
}

impl From<MockSensor> for AnyFingerprintSensor {
    fn from(device: MockSensor) -> Self {
        Self::Mock(device)
    }
}

/// Enum wrapper for lock relay dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyLockRelay {
    /// Mock relay for development and testing.
    Mock(MockRelay),
}

impl LockRelay for AnyLockRelay {
    async fn activate(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.activate().await,
        }
    }

    async fn deactivate(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.deactivate().await,
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.shutdown().await,
        }
    }

    fn state(&self) -> RelayState {
        match self {
            Self::Mock(device) => device.state(),
        }
    }
}

impl From<MockRelay> for AnyLockRelay {
    fn from(device: MockRelay) -> Self {
        Self::Mock(device)
    }
}
