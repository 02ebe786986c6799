//! Mock fingerprint sensor implementation for testing and development.
//!
//! The sensor is driven from a [`MockSensorHandle`]: tests place a finger
//! carrying a template on the glass, lift it again, and inspect the
//! template library the controller wrote.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use latchkey_core::CredentialId;
use latchkey_core::constants::MAX_CREDENTIAL_ID;
use tracing::trace;

use crate::{HardwareError, Result, traits::FingerprintSensor, types::SensorInfo};

#[derive(Debug, Default)]
struct SensorState {
    /// Template of the finger currently on the glass.
    finger: Option<Vec<u8>>,

    /// On-device template library.
    library: BTreeMap<CredentialId, Vec<u8>>,

    /// When set, every operation fails with this message.
    fault: Option<String>,

    searches: usize,
}

fn lock(state: &Mutex<SensorState>) -> MutexGuard<'_, SensorState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock fingerprint sensor for testing and development.
///
/// # Examples
///
/// ```
/// use latchkey_core::CredentialId;
/// use latchkey_hardware::mock::MockSensor;
/// use latchkey_hardware::traits::FingerprintSensor;
///
/// #[tokio::main]
/// async fn main() -> latchkey_hardware::Result<()> {
///     let (mut sensor, handle) = MockSensor::new();
///
///     sensor.store_model(CredentialId::new(0), &[1, 2, 3]).await?;
///     handle.place_finger(vec![1, 2, 3]);
///
///     assert!(sensor.has_finger().await?);
///     assert_eq!(sensor.search().await?, Some(CredentialId::new(0)));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockSensor {
    state: Arc<Mutex<SensorState>>,

    /// Device name
    name: String,
}

impl MockSensor {
    /// Create a new mock sensor with the default name.
    ///
    /// Returns the sensor together with a handle that simulates the person
    /// standing in front of it.
    pub fn new() -> (Self, MockSensorHandle) {
        Self::with_name("Mock Fingerprint Sensor")
    }

    /// Create a new mock sensor with a custom name.
    pub fn with_name(name: impl Into<String>) -> (Self, MockSensorHandle) {
        let state = Arc::new(Mutex::new(SensorState::default()));
        let sensor = Self {
            state: Arc::clone(&state),
            name: name.into(),
        };
        (sensor, MockSensorHandle { state })
    }

    fn check_fault(&self) -> Result<()> {
        match &lock(&self.state).fault {
            Some(message) => Err(HardwareError::communication(message.clone())),
            None => Ok(()),
        }
    }
}

impl FingerprintSensor for MockSensor {
    async fn has_finger(&mut self) -> Result<bool> {
        self.check_fault()?;
        Ok(lock(&self.state).finger.is_some())
    }

    async fn search(&mut self) -> Result<Option<CredentialId>> {
        self.check_fault()?;
        let mut state = lock(&self.state);
        state.searches += 1;
        let Some(finger) = state.finger.as_ref() else {
            return Ok(None);
        };
        let found = state
            .library
            .iter()
            .find(|(_, template)| *template == finger)
            .map(|(id, _)| *id);
        trace!(found = ?found, "Mock sensor search");
        Ok(found)
    }

    async fn create_model(&mut self) -> Result<Option<Vec<u8>>> {
        self.check_fault()?;
        Ok(lock(&self.state).finger.clone())
    }

    async fn store_model(&mut self, id: CredentialId, template: &[u8]) -> Result<()> {
        self.check_fault()?;
        if template.is_empty() {
            return Err(HardwareError::template_storage(id, "empty template"));
        }
        lock(&self.state).library.insert(id, template.to_vec());
        Ok(())
    }

    async fn clear_all(&mut self) -> Result<()> {
        self.check_fault()?;
        lock(&self.state).library.clear();
        Ok(())
    }

    async fn sensor_info(&self) -> Result<SensorInfo> {
        Ok(
            SensorInfo::new(self.name.clone(), "Mock Fingerprint Sensor", MAX_CREDENTIAL_ID + 1)
                .with_firmware_version("1.0.0"),
        )
    }
}

/// Handle for controlling a mock fingerprint sensor.
///
/// Cloning the handle shares the same simulated sensor.
#[derive(Debug, Clone)]
pub struct MockSensorHandle {
    state: Arc<Mutex<SensorState>>,
}

impl MockSensorHandle {
    /// Put a finger carrying `template` on the sensor.
    pub fn place_finger(&self, template: Vec<u8>) {
        lock(&self.state).finger = Some(template);
    }

    /// Lift the finger off the sensor.
    pub fn lift_finger(&self) {
        lock(&self.state).finger = None;
    }

    /// Whether a finger is on the sensor right now.
    pub fn finger_present(&self) -> bool {
        lock(&self.state).finger.is_some()
    }

    /// Seed the on-device library directly, bypassing the controller.
    pub fn enroll(&self, id: CredentialId, template: Vec<u8>) {
        lock(&self.state).library.insert(id, template);
    }

    /// Snapshot of the on-device template library.
    pub fn library(&self) -> BTreeMap<CredentialId, Vec<u8>> {
        lock(&self.state).library.clone()
    }

    /// Make every subsequent operation fail until cleared with `None`.
    pub fn set_fault(&self, message: Option<&str>) {
        lock(&self.state).fault = message.map(str::to_string);
    }

    /// Number of searches the sensor has run.
    pub fn search_count(&self) -> usize {
        lock(&self.state).searches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_finger_by_default() {
        let (mut sensor, _handle) = MockSensor::new();
        assert!(!sensor.has_finger().await.unwrap());
        assert_eq!(sensor.create_model().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_search_matches_stored_template() {
        let (mut sensor, handle) = MockSensor::new();
        sensor
            .store_model(CredentialId::new(4), &[9, 9, 9])
            .await
            .unwrap();

        handle.place_finger(vec![9, 9, 9]);
        assert_eq!(sensor.search().await.unwrap(), Some(CredentialId::new(4)));

        handle.place_finger(vec![1]);
        assert_eq!(sensor.search().await.unwrap(), None);
        assert_eq!(handle.search_count(), 2);
    }

    #[tokio::test]
    async fn test_clear_all_empties_library() {
        let (mut sensor, handle) = MockSensor::new();
        handle.enroll(CredentialId::new(1), vec![1]);
        sensor.clear_all().await.unwrap();
        assert!(handle.library().is_empty());
    }

    #[tokio::test]
    async fn test_store_rejects_empty_template() {
        let (mut sensor, _handle) = MockSensor::new();
        let result = sensor.store_model(CredentialId::new(0), &[]).await;
        assert!(matches!(result, Err(HardwareError::TemplateStorage { .. })));
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let (mut sensor, handle) = MockSensor::new();
        handle.set_fault(Some("UART framing error"));
        assert!(sensor.has_finger().await.is_err());

        handle.set_fault(None);
        assert!(sensor.has_finger().await.is_ok());
    }

    #[tokio::test]
    async fn test_sensor_info() {
        let (sensor, _handle) = MockSensor::with_name("Bench Sensor");
        let info = sensor.sensor_info().await.unwrap();
        assert_eq!(info.name, "Bench Sensor");
        assert_eq!(info.library_capacity, MAX_CREDENTIAL_ID + 1);
    }
}
