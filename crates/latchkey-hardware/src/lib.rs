//! Hardware device abstraction layer for the Latchkey access point.
//!
//! This crate provides trait-based abstractions for the two peripherals an
//! access point drives: a fingerprint sensor with on-device template
//! storage, and the relay holding the door strike. The traits allow mock
//! implementations (for development and testing) and real drivers to be
//! swapped without touching the controller.
//!
//! # Design Philosophy
//!
//! - **Async-first**: All I/O operations are asynchronous using native `async fn`
//!   in traits (Rust 1.90 + Edition 2024 RPITIT).
//! - **Enum dispatch**: [`devices`] wraps implementations in concrete enums so
//!   callers avoid trait objects and keep `Send` futures.
//! - **Error-aware**: All operations return `Result<T>` with [`HardwareError`].
//!
//! # Device Traits
//!
//! ## Fingerprint Sensors
//!
//! ```no_run
//! use latchkey_hardware::traits::FingerprintSensor;
//! use latchkey_hardware::error::Result;
//!
//! async fn enrolled_finger_present<S: FingerprintSensor>(sensor: &mut S) -> Result<bool> {
//!     Ok(sensor.has_finger().await? && sensor.search().await?.is_some())
//! }
//! ```
//!
//! ## Lock Relays
//!
//! ```no_run
//! use latchkey_hardware::traits::LockRelay;
//! use latchkey_hardware::error::Result;
//!
//! async fn pulse<R: LockRelay>(relay: &mut R) -> Result<()> {
//!     relay.activate().await?;
//!     tokio::time::sleep(std::time::Duration::from_secs(3)).await;
//!     relay.deactivate().await
//! }
//! ```
//!
//! # Mock Implementations
//!
//! [`mock::MockSensor`] and [`mock::MockRelay`] come paired with handles
//! that let tests place fingers, inject faults and inspect relay switching.

pub mod devices;
pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use devices::{AnyFingerprintSensor, AnyLockRelay};
pub use error::{HardwareError, Result};
pub use traits::{FingerprintSensor, LockRelay};
pub use types::{SensorInfo, RelayState};
