//! Hardware device trait definitions.
//!
//! This module defines the contract between the controller and the two
//! peripherals an access point needs: a fingerprint sensor that stores
//! templates and searches against them, and a relay that holds the lock.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use latchkey_core::CredentialId;

use crate::error::Result;
use crate::types::{SensorInfo, RelayState};

/// Fingerprint sensor with on-device template storage.
///
/// The sensor keeps its own template library indexed by [`CredentialId`].
/// Matching happens on the device: [`search`](FingerprintSensor::search)
/// captures whatever finger is currently on the glass and reports which
/// stored slot, if any, it matches.
///
/// # Polling Model
///
/// Sensors of this class do not push events. Callers poll
/// [`has_finger`](FingerprintSensor::has_finger) at a fixed interval and
/// only then ask for a search or a model.
///
/// # Examples
///
/// ```no_run
/// use latchkey_hardware::traits::FingerprintSensor;
/// use latchkey_hardware::error::Result;
/// use latchkey_core::CredentialId;
///
/// async fn identify<S: FingerprintSensor>(sensor: &mut S) -> Result<Option<CredentialId>> {
///     while !sensor.has_finger().await? {
///         tokio::time::sleep(std::time::Duration::from_millis(100)).await;
///     }
///     sensor.search().await
/// }
/// ```
pub trait FingerprintSensor: Send + Sync {
    /// Report whether a finger is currently on the sensor.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be queried.
    async fn has_finger(&mut self) -> Result<bool>;

    /// Capture the current finger and search the stored template library.
    ///
    /// Returns `Ok(None)` when the finger matches no stored template.
    ///
    /// # Errors
    ///
    /// Returns an error if the capture or the search fails on the device.
    async fn search(&mut self) -> Result<Option<CredentialId>>;

    /// Capture the current finger and build a template from it.
    ///
    /// Returns `Ok(None)` when no usable image could be taken (no finger,
    /// or a smudged capture); callers retry.
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure.
    async fn create_model(&mut self) -> Result<Option<Vec<u8>>>;

    /// Write a template into the given slot, replacing whatever was there.
    ///
    /// # Errors
    ///
    /// Returns an error if the device rejects the template or the slot.
    async fn store_model(&mut self, id: CredentialId, template: &[u8]) -> Result<()>;

    /// Erase every stored template.
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure.
    async fn clear_all(&mut self) -> Result<()>;

    /// Model, firmware and template library size.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be queried.
    async fn sensor_info(&self) -> Result<SensorInfo>;
}

/// Lock relay driving the door strike.
///
/// An energized relay releases the door. [`shutdown`](LockRelay::shutdown)
/// releases the relay and frees the underlying line; the relay must not be
/// used afterwards.
pub trait LockRelay: Send + Sync {
    /// Energize the relay, releasing the door.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay could not be switched.
    async fn activate(&mut self) -> Result<()>;

    /// Release the relay, locking the door.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay could not be switched.
    async fn deactivate(&mut self) -> Result<()>;

    /// Release the relay and free the underlying hardware line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line could not be released cleanly.
    async fn shutdown(&mut self) -> Result<()>;

    /// Last state the relay was switched to.
    fn state(&self) -> RelayState;
}
