//! Authentication gate in front of the fingerprint sensor.
//!
//! The gate turns the sensor's polling primitives into three decisions the
//! controller cares about: who is at the door ([`AuthenticationGate::scan`]),
//! whether they are an administrator ([`AuthenticationGate::scan_admin`]),
//! and enrollment of a new finger ([`AuthenticationGate::register`]).
//!
//! # Concurrency
//!
//! A gate is shared behind an `Arc` between the controller and the task a
//! scan runs on. Only one scan or registration may be in flight at a time;
//! a second caller gets [`Error::ScanInProgress`]. [`AuthenticationGate::cancel`]
//! records a one-shot intent that the running scan consumes on its next
//! poll.
//!
//! A caller that hands the scan to another task should claim it first with
//! [`AuthenticationGate::reserve`]. The gate counts as scanning from that
//! moment, so a cancel sent before the task gets to run is not lost.
//!
//! # Examples
//!
//! ```
//! use latchkey_biometric::{AuthenticationGate, GateConfig, ScanOutcome};
//! use latchkey_core::CredentialId;
//! use latchkey_hardware::mock::MockSensor;
//!
//! #[tokio::main]
//! async fn main() -> latchkey_core::Result<()> {
//!     let (sensor, handle) = MockSensor::new();
//!     handle.enroll(CredentialId::new(0), vec![7, 7, 7]);
//!     let gate = AuthenticationGate::new(sensor.into(), GateConfig::default());
//!
//!     handle.place_finger(vec![7, 7, 7]);
//!     assert_eq!(gate.scan().await?, ScanOutcome::Authorized(CredentialId::new(0)));
//!     Ok(())
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use latchkey_core::constants::{LIFT_POLL, MAX_CREDENTIAL_ID, SCAN_POLL};
use latchkey_core::{CredentialId, Error, Result};
use latchkey_hardware::{AnyFingerprintSensor, FingerprintSensor};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::outcome::{Enrollment, RegistrationOutcome, ScanOutcome};

/// Polling configuration for the gate.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Interval between finger-presence polls during a scan.
    pub scan_poll: Duration,

    /// Interval between polls while waiting for the finger to lift.
    pub lift_poll: Duration,

    /// Interval between model-capture attempts during enrollment.
    pub model_poll: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            scan_poll: SCAN_POLL,
            lift_poll: LIFT_POLL,
            model_poll: SCAN_POLL,
        }
    }
}

impl GateConfig {
    /// Set the finger-presence poll interval
    pub fn scan_poll(mut self, interval: Duration) -> Self {
        self.scan_poll = interval;
        self
    }

    /// Set the finger-lift poll interval
    pub fn lift_poll(mut self, interval: Duration) -> Self {
        self.lift_poll = interval;
        self
    }
}

/// Resets the in-flight flag when a scan ends, however it ends.
struct ScanGuard<'a> {
    scanning: &'a AtomicBool,
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.scanning.store(false, Ordering::Release);
    }
}

/// A scan claimed ahead of time, to be run on another task.
///
/// Holding a session keeps the gate busy. Dropping it without running a
/// scan releases the gate.
#[must_use = "the gate stays busy until the session is run or dropped"]
pub struct ScanSession {
    gate: Arc<AuthenticationGate>,
}

impl ScanSession {
    /// Run a general scan. See [`AuthenticationGate::scan`].
    pub async fn scan(self) -> ScanOutcome {
        self.gate.identify_any().await
    }

    /// Run an admin-only scan. See [`AuthenticationGate::scan_admin`].
    pub async fn scan_admin(self) -> ScanOutcome {
        self.gate.identify_admin().await
    }

    /// Run an enrollment. See [`AuthenticationGate::register`].
    pub async fn register(self) -> RegistrationOutcome {
        self.gate.enroll().await
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.gate.scanning.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSession").finish_non_exhaustive()
    }
}

enum Wait {
    Ready,
    Cancelled,
    Failed,
}

/// Fingerprint authentication gate.
pub struct AuthenticationGate {
    sensor: Mutex<AnyFingerprintSensor>,
    scanning: AtomicBool,
    cancel_requested: AtomicBool,
    admins: RwLock<BTreeSet<CredentialId>>,
    enrolled: RwLock<BTreeSet<CredentialId>>,
    config: GateConfig,
}

impl AuthenticationGate {
    /// Wrap a sensor. The admin cache and enrolled set start empty; the
    /// controller fills them from persistence at startup.
    pub fn new(sensor: AnyFingerprintSensor, config: GateConfig) -> Self {
        Self {
            sensor: Mutex::new(sensor),
            scanning: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
            admins: RwLock::new(BTreeSet::new()),
            enrolled: RwLock::new(BTreeSet::new()),
            config,
        }
    }

    /// Wait for a finger and identify it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScanInProgress`] if another scan or registration is
    /// already running. Sensor failures, including a failed presence poll,
    /// are logged and reported as [`ScanOutcome::Denied`].
    pub async fn scan(&self) -> Result<ScanOutcome> {
        let _guard = self.begin()?;
        Ok(self.identify_any().await)
    }

    /// Like [`scan`](Self::scan), but only an administrator credential is
    /// authorized. A recognized non-admin finger is [`ScanOutcome::Denied`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScanInProgress`] if another scan is already running.
    pub async fn scan_admin(&self) -> Result<ScanOutcome> {
        let _guard = self.begin()?;
        Ok(self.identify_admin().await)
    }

    /// Enroll a new finger.
    ///
    /// Waits for a finger, rejects it if it is already enrolled, waits for
    /// it to lift, then captures a model from the next placement and stores
    /// it in the lowest free slot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScanInProgress`] if a scan is already running.
    pub async fn register(&self) -> Result<RegistrationOutcome> {
        let _guard = self.begin()?;
        Ok(self.enroll().await)
    }

    /// Claim the gate for a scan that will run on another task.
    ///
    /// The gate is busy as soon as this returns, and a [`cancel`](Self::cancel)
    /// from then on is observed by whichever scan the session runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScanInProgress`] if a scan is already running or
    /// reserved.
    pub fn reserve(self: &Arc<Self>) -> Result<ScanSession> {
        self.claim()?;
        Ok(ScanSession {
            gate: Arc::clone(self),
        })
    }

    /// Request cancellation of the in-flight scan.
    ///
    /// Returns `false`, recording nothing, when no scan is running.
    pub fn cancel(&self) -> bool {
        if self.scanning.load(Ordering::Acquire) {
            self.cancel_requested.store(true, Ordering::Release);
            true
        } else {
            false
        }
    }

    /// Take the pending cancellation intent, if any.
    pub fn consume_cancellation(&self) -> bool {
        self.cancel_requested.swap(false, Ordering::AcqRel)
    }

    /// Whether a scan or registration is running.
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    pub fn add_admin(&self, id: CredentialId) {
        self.admins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
    }

    pub fn remove_admin(&self, id: CredentialId) {
        self.admins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    pub fn is_admin(&self, id: CredentialId) -> bool {
        self.admins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    /// Replace the admin cache with the ids persistence holds.
    pub fn replace_admins(&self, ids: impl IntoIterator<Item = CredentialId>) {
        let mut admins = self.admins.write().unwrap_or_else(PoisonError::into_inner);
        admins.clear();
        admins.extend(ids);
    }

    /// Ids currently known to be enrolled on the sensor.
    pub fn enrolled(&self) -> BTreeSet<CredentialId> {
        self.enrolled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Push stored templates to the sensor.
    ///
    /// With `overwrite` the sensor library is erased first, so afterwards it
    /// holds exactly `templates`.
    ///
    /// # Errors
    ///
    /// Returns the first sensor error. The enrolled set is only updated
    /// for templates that were written.
    pub async fn upload_templates(
        &self,
        templates: &BTreeMap<CredentialId, Vec<u8>>,
        overwrite: bool,
    ) -> latchkey_hardware::Result<()> {
        let mut sensor = self.sensor.lock().await;

        if overwrite {
            sensor.clear_all().await?;
            self.enrolled
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }

        for (id, template) in templates {
            sensor.store_model(*id, template).await?;
            self.enrolled
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(*id);
        }

        info!(count = templates.len(), overwrite, "Templates uploaded to sensor");
        Ok(())
    }

    fn claim(&self) -> Result<()> {
        if self
            .scanning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::ScanInProgress);
        }
        // A cancel aimed at a previous scan must not abort this one.
        self.cancel_requested.store(false, Ordering::Release);
        Ok(())
    }

    fn begin(&self) -> Result<ScanGuard<'_>> {
        self.claim()?;
        Ok(ScanGuard {
            scanning: &self.scanning,
        })
    }

    async fn identify_any(&self) -> ScanOutcome {
        let outcome = self.identify().await;
        debug!(outcome = ?outcome, "Scan finished");
        outcome
    }

    async fn identify_admin(&self) -> ScanOutcome {
        let outcome = match self.identify().await {
            ScanOutcome::Authorized(id) if self.is_admin(id) => ScanOutcome::Authorized(id),
            ScanOutcome::Authorized(id) => {
                warn!(credential_id = %id, "Non-administrator presented for admin scan");
                ScanOutcome::Denied
            }
            other => other,
        };
        debug!(outcome = ?outcome, "Admin scan finished");
        outcome
    }

    async fn identify(&self) -> ScanOutcome {
        let mut sensor = self.sensor.lock().await;

        match self.wait_for_finger(&mut sensor).await {
            Wait::Ready => {}
            Wait::Cancelled => return ScanOutcome::Cancelled,
            Wait::Failed => return ScanOutcome::Denied,
        }

        match sensor.search().await {
            Ok(Some(id)) => ScanOutcome::Authorized(id),
            Ok(None) => ScanOutcome::Denied,
            Err(e) => {
                error!("Sensor search failed: {}", e);
                ScanOutcome::Denied
            }
        }
    }

    async fn enroll(&self) -> RegistrationOutcome {
        let mut sensor = self.sensor.lock().await;

        match self.wait_for_finger(&mut sensor).await {
            Wait::Ready => {}
            Wait::Cancelled => return RegistrationOutcome::Cancelled,
            Wait::Failed => return RegistrationOutcome::Failed,
        }

        match sensor.search().await {
            Ok(Some(id)) => {
                info!(credential_id = %id, "Finger already enrolled");
                return RegistrationOutcome::AlreadyRegistered(id);
            }
            Ok(None) => {}
            Err(e) => {
                error!("Sensor search failed during registration: {}", e);
                return RegistrationOutcome::Failed;
            }
        }

        loop {
            if self.consume_cancellation() {
                return RegistrationOutcome::Cancelled;
            }
            match sensor.has_finger().await {
                Ok(false) => break,
                Ok(true) => tokio::time::sleep(self.config.lift_poll).await,
                Err(e) => {
                    error!("Sensor failed while waiting for lift: {}", e);
                    return RegistrationOutcome::Failed;
                }
            }
        }

        let template = loop {
            if self.consume_cancellation() {
                return RegistrationOutcome::Cancelled;
            }
            match sensor.create_model().await {
                Ok(Some(template)) => break template,
                Ok(None) => tokio::time::sleep(self.config.model_poll).await,
                Err(e) => {
                    error!("Model capture failed: {}", e);
                    return RegistrationOutcome::Failed;
                }
            }
        };

        let capacity = match sensor.sensor_info().await {
            Ok(info) => info.library_capacity,
            Err(e) => {
                warn!("Could not read sensor capacity: {}", e);
                MAX_CREDENTIAL_ID + 1
            }
        };
        let Some(id) = self.lowest_free_id(capacity) else {
            warn!("Every sensor slot is taken");
            return RegistrationOutcome::Failed;
        };

        if let Err(e) = sensor.store_model(id, &template).await {
            error!(credential_id = %id, "Storing template failed: {}", e);
            return RegistrationOutcome::Failed;
        }

        self.enrolled
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        info!(credential_id = %id, "Finger enrolled");
        RegistrationOutcome::Registered(Enrollment { id, template })
    }

    /// Poll until a finger is present. A poll error ends the wait: the
    /// attempt fails rather than hanging on a dead sensor.
    async fn wait_for_finger(&self, sensor: &mut AnyFingerprintSensor) -> Wait {
        loop {
            if self.consume_cancellation() {
                debug!("Scan cancelled");
                return Wait::Cancelled;
            }
            match sensor.has_finger().await {
                Ok(true) => return Wait::Ready,
                Ok(false) => {}
                Err(e) => {
                    if e.is_transient() {
                        warn!("Finger poll failed: {}", e);
                    } else {
                        error!("Sensor unavailable while waiting for a finger: {}", e);
                    }
                    return Wait::Failed;
                }
            }
            tokio::time::sleep(self.config.scan_poll).await;
        }
    }

    fn lowest_free_id(&self, capacity: u16) -> Option<CredentialId> {
        let enrolled = self.enrolled.read().unwrap_or_else(PoisonError::into_inner);
        (0..capacity.min(MAX_CREDENTIAL_ID + 1))
            .map(CredentialId::new)
            .find(|id| !enrolled.contains(id))
    }
}

impl std::fmt::Debug for AuthenticationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationGate")
            .field("scanning", &self.is_scanning())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
