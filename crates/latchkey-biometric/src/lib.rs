//! Fingerprint authentication for the Latchkey access point.
//!
//! [`AuthenticationGate`] sits between the controller and the sensor. It
//! owns the admin cache, serializes scans, and maps raw sensor results onto
//! [`ScanOutcome`] and [`RegistrationOutcome`].

pub mod gate;
pub mod outcome;

pub use gate::{AuthenticationGate, GateConfig, ScanSession};
pub use outcome::{Enrollment, RegistrationOutcome, ScanOutcome};
