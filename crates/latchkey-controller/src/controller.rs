//! The control state machine.
//!
//! A single [`Controller`] task owns every piece of mutable policy state:
//! system lock, door cycle, manual unlocks and the failure counter. Local
//! requests and remote commands reach it as [`ControlEvent`]s through a
//! [`ControlHandle`]; scan results, confirmation answers and countdown
//! signals come back to it on internal channels. Nothing else mutates that
//! state, so a lockout increment can never interleave with a re-enable.
//!
//! Fingerprint scans and confirmation prompts run on spawned tasks and may
//! take arbitrarily long. While one is outstanding the controller keeps
//! serving events; a second scan request is ignored.

use std::sync::Arc;
use std::time::Duration;

use latchkey_biometric::{AuthenticationGate, RegistrationOutcome, ScanOutcome};
use latchkey_core::constants::{
    DEFAULT_EMERGENCY_USES, DEFAULT_OPEN_SECONDS, IDLE_TEXT, LEADING_LOCKED,
    LEADING_SYSTEM_DISABLED, LEADING_UNLOCKED, LOCKED_NOTICE_SECONDS, LOCKOUT_SECONDS,
    LOCKOUT_THRESHOLD, MSG_ADMIN_ONLY, MSG_ADMIN_REMOVAL, MSG_ADMIN_SCAN_PROMPT,
    MSG_ALREADY_REGISTERED, MSG_EMERGENCY_PROMPT, MSG_LOCK_FAULT, MSG_NOT_AUTHORIZED,
    MSG_NOT_RECOGNIZED, MSG_OUT_OF_EMERGENCY_USES, MSG_REGISTER_PROMPT, MSG_REGISTRATION_FAILED,
    MSG_SCAN_PROMPT, SYSTEM_DISABLED_TEXT, clamp_open_seconds,
};
use latchkey_core::{Credential, CredentialId, CountdownKind, Error, Result};
use latchkey_hardware::{AnyLockRelay, LockRelay, RelayState};
use latchkey_protocol::{RemoteCommand, RemoteCommandKind};
use latchkey_storage::SettingsStore;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::countdown::CountdownSignal;
use crate::display::Display;
use crate::orchestrator::{CountdownEffect, CountdownOrchestrator, CountdownTiming};
use crate::state::{ControlState, StateTracker, StateTransition};

/// Configuration for [`Controller`]
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Length of a locally started open cycle, clamped to 1..=9 seconds
    pub open_cycle_seconds: i64,

    /// How long an emergency-use question waits before counting as declined
    pub confirmation_timeout: Duration,

    /// Countdown tick and inactivity settings
    pub timing: CountdownTiming,

    /// Capacity of the event queue behind [`ControlHandle`]
    pub queue_capacity: usize,

    /// How long manual unlocks stay disabled after too many failed scans
    pub lockout_seconds: i64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            open_cycle_seconds: DEFAULT_OPEN_SECONDS,
            confirmation_timeout: Duration::from_secs(15),
            timing: CountdownTiming::default(),
            queue_capacity: 64,
            lockout_seconds: LOCKOUT_SECONDS,
        }
    }
}

impl ControllerConfig {
    /// Set the local open-cycle length. Out-of-range values are clamped.
    pub fn open_cycle_seconds(mut self, seconds: i64) -> Self {
        self.open_cycle_seconds = clamp_open_seconds(seconds);
        self
    }

    pub fn confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn timing(mut self, timing: CountdownTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Set the lockout length. Values below one second become one second.
    pub fn lockout_seconds(mut self, seconds: i64) -> Self {
        self.lockout_seconds = seconds.max(1);
        self
    }
}

/// Requests accepted by the controller.
#[derive(Debug)]
pub enum ControlEvent {
    /// The open button.
    OpenDoor,
    /// The lock/unlock-system button.
    ToggleSystemLock,
    /// Abort the scan in progress.
    CancelScan,
    /// Open the settings session. Answers whether access was granted.
    RequestSettingsAccess { reply: oneshot::Sender<bool> },
    CloseSettings,
    /// Settings: flip manual unlocks.
    ToggleManualUnlocks,
    /// Settings: enroll a new finger.
    RegisterCredential,
    /// Settings: promote or demote a credential.
    SetAdmin { id: CredentialId, admin: bool },
    /// Settings: change a credential's nickname.
    Rename { id: CredentialId, nickname: String },
    /// Settings: restore a credential's emergency allowance.
    ResetEmergencyUses { id: CredentialId },
    /// Settings: delete a non-admin credential.
    RemoveCredential { id: CredentialId },
    /// A command from the remote peer.
    Remote(RemoteCommand),
    Snapshot {
        reply: oneshot::Sender<ControllerSnapshot>,
    },
    /// Put the access point into its safe state and stop the controller.
    Shutdown { reply: oneshot::Sender<()> },
}

/// Point-in-time view of the controller.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerSnapshot {
    pub state: ControlState,
    pub consecutive_failures: u32,
    pub settings_open: bool,
    pub scan_in_flight: bool,
    pub relay: RelayState,
    pub transitions: Vec<StateTransition>,
}

/// Cloneable sender side of the controller's event queue.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    events: mpsc::Sender<ControlEvent>,
}

impl ControlHandle {
    /// Queue an event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ControllerStopped`] if the controller has exited.
    pub async fn send(&self, event: ControlEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| Error::ControllerStopped)
    }

    pub async fn open_door(&self) -> Result<()> {
        self.send(ControlEvent::OpenDoor).await
    }

    pub async fn toggle_system_lock(&self) -> Result<()> {
        self.send(ControlEvent::ToggleSystemLock).await
    }

    pub async fn cancel_scan(&self) -> Result<()> {
        self.send(ControlEvent::CancelScan).await
    }

    pub async fn remote(&self, command: RemoteCommand) -> Result<()> {
        self.send(ControlEvent::Remote(command)).await
    }

    /// Ask for the settings session and wait for the verdict, which may
    /// involve an administrator scan.
    pub async fn request_settings_access(&self) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlEvent::RequestSettingsAccess { reply }).await?;
        rx.await.map_err(|_| Error::ControllerStopped)
    }

    pub async fn snapshot(&self) -> Result<ControllerSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlEvent::Snapshot { reply }).await?;
        rx.await.map_err(|_| Error::ControllerStopped)
    }

    /// Shut the controller down and wait until the relay is released and
    /// settings are flushed.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlEvent::Shutdown { reply }).await?;
        rx.await.map_err(|_| Error::ControllerStopped)
    }
}

#[derive(Debug)]
enum ScanPurpose {
    OpenDoor,
    SystemToggle,
    Settings(oneshot::Sender<bool>),
}

impl ScanPurpose {
    fn admin_only(&self) -> bool {
        !matches!(self, Self::OpenDoor)
    }
}

/// Results of work the controller handed off to spawned tasks.
#[derive(Debug)]
enum Feedback {
    ScanFinished {
        purpose: ScanPurpose,
        outcome: Result<ScanOutcome>,
    },
    EmergencyConfirmation {
        id: CredentialId,
        ticket: u64,
        confirmed: bool,
    },
    RegistrationFinished(Result<RegistrationOutcome>),
}

enum Flow {
    Continue,
    Stop,
}

/// The access point's policy core. See the module docs.
pub struct Controller {
    config: ControllerConfig,
    gate: Arc<AuthenticationGate>,
    relay: AnyLockRelay,
    settings: SettingsStore,
    display: Arc<dyn Display>,
    countdowns: CountdownOrchestrator,
    countdown_signals: mpsc::UnboundedReceiver<CountdownSignal>,
    events: mpsc::Receiver<ControlEvent>,
    feedback_tx: mpsc::UnboundedSender<Feedback>,
    feedback_rx: mpsc::UnboundedReceiver<Feedback>,
    state: StateTracker,
    consecutive_failures: u32,
    default_text: &'static str,
    scan_in_flight: bool,
    settings_open: bool,
    /// Ticket of the emergency question awaiting an answer. Answers carrying
    /// any other ticket are stale.
    pending_confirmation: Option<u64>,
    confirmation_tickets: u64,
}

impl Controller {
    /// Assemble a controller. Nothing happens until [`run`](Self::run) is
    /// awaited.
    pub fn new(
        config: ControllerConfig,
        gate: Arc<AuthenticationGate>,
        relay: AnyLockRelay,
        settings: SettingsStore,
        display: Arc<dyn Display>,
    ) -> (Self, ControlHandle) {
        let (events_tx, events) = mpsc::channel(config.queue_capacity.max(1));
        let (feedback_tx, feedback_rx) = mpsc::unbounded_channel();
        let (countdowns, countdown_signals) = CountdownOrchestrator::new(config.timing.clone());

        let controller = Self {
            config,
            gate,
            relay,
            settings,
            display,
            countdowns,
            countdown_signals,
            events,
            feedback_tx,
            feedback_rx,
            state: StateTracker::default(),
            consecutive_failures: 0,
            default_text: IDLE_TEXT,
            scan_in_flight: false,
            settings_open: false,
            pending_confirmation: None,
            confirmation_tickets: 0,
        };
        (controller, ControlHandle { events: events_tx })
    }

    /// Sync the sensor with persistence, then serve events until shutdown
    /// or until every [`ControlHandle`] is dropped.
    pub async fn run(mut self) {
        self.startup().await;

        loop {
            tokio::select! {
                biased;

                event = self.events.recv() => match event {
                    Some(event) => {
                        if let Flow::Stop = self.handle_event(event).await {
                            break;
                        }
                    }
                    None => {
                        info!("All control handles dropped");
                        self.shut_down().await;
                        break;
                    }
                },

                Some(feedback) = self.feedback_rx.recv() => self.handle_feedback(feedback).await,

                Some(signal) = self.countdown_signals.recv() => {
                    let effects = self.countdowns.handle_signal(signal).await;
                    for effect in effects {
                        match effect {
                            CountdownEffect::StatusText(text) => self.show_status(text.as_deref()),
                            CountdownEffect::Completed(kind) => self.countdown_completed(kind).await,
                        }
                    }
                }
            }
        }

        info!("Controller stopped");
    }

    async fn startup(&mut self) {
        self.gate.replace_admins(self.settings.admin_ids());

        match self.settings.load_templates().await {
            Ok(templates) => match self.gate.upload_templates(&templates, true).await {
                Ok(()) => info!(count = templates.len(), "Templates synced to sensor"),
                Err(e) => error!("Failed to upload templates to sensor: {}", e),
            },
            Err(e) => error!("Failed to load stored templates: {}", e),
        }

        let state = self.state.current();
        self.display.set_system_locked(state.locked);
        self.display.set_manual_unlocks(state.manual_unlocks_enabled);
        self.enable_manual_unlocks().await;
        self.refresh_listing();
        info!(state = %self.state.current(), "Controller started");
    }

    async fn handle_event(&mut self, event: ControlEvent) -> Flow {
        debug!(event = ?event, "Control event");
        match event {
            ControlEvent::OpenDoor => self.open_door().await,
            ControlEvent::ToggleSystemLock => self.request_system_toggle(),
            ControlEvent::CancelScan => {
                if !self.gate.cancel() {
                    debug!("No scan to cancel");
                }
            }
            ControlEvent::RequestSettingsAccess { reply } => self.request_settings_access(reply),
            ControlEvent::CloseSettings => {
                if std::mem::take(&mut self.settings_open) {
                    info!("Settings closed");
                }
            }
            ControlEvent::ToggleManualUnlocks => {
                if self.require_settings("toggle manual unlocks") {
                    if self.state.current().manual_unlocks_enabled {
                        self.disable_manual_unlocks(false).await;
                    } else {
                        self.enable_manual_unlocks().await;
                    }
                }
            }
            ControlEvent::RegisterCredential => self.register_credential(),
            ControlEvent::SetAdmin { id, admin } => {
                if self.require_settings("change administrators") {
                    self.edit_credential(id, |c| c.admin = admin).await;
                }
            }
            ControlEvent::Rename { id, nickname } => {
                if self.require_settings("rename credentials") {
                    self.edit_credential(id, |c| c.nickname = nickname.trim().to_string())
                        .await;
                }
            }
            ControlEvent::ResetEmergencyUses { id } => {
                if self.require_settings("reset emergency uses") {
                    self.edit_credential(id, |c| c.emergency_uses = DEFAULT_EMERGENCY_USES)
                        .await;
                }
            }
            ControlEvent::RemoveCredential { id } => self.remove_credential(id).await,
            ControlEvent::Remote(command) => self.handle_remote(command).await,
            ControlEvent::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            ControlEvent::Shutdown { reply } => {
                self.shut_down().await;
                let _ = reply.send(());
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            state: self.state.current(),
            consecutive_failures: self.consecutive_failures,
            settings_open: self.settings_open,
            scan_in_flight: self.scan_in_flight,
            relay: self.relay.state(),
            transitions: self.state.history().iter().cloned().collect(),
        }
    }

    // Door

    async fn open_door(&mut self) {
        let state = self.state.current();
        if state.door_opening {
            debug!("Open request ignored: door cycle already in progress");
            return;
        }

        if !state.locked {
            self.update_state(|s| s.door_opening = true);
            self.unlock_door(self.config.open_cycle_seconds, true).await;
            return;
        }

        if !state.manual_unlocks_enabled {
            info!("Open request ignored: system locked and manual unlocks disabled");
            return;
        }

        if self.scan_in_flight {
            debug!("Open request ignored: scan already in progress");
            return;
        }

        self.update_state(|s| s.door_opening = true);
        self.display.show_notification(MSG_SCAN_PROMPT);
        self.spawn_scan(ScanPurpose::OpenDoor);
    }

    /// Energize the relay and start the open cycle. Returns whether the
    /// door was released.
    async fn unlock_door(&mut self, seconds: i64, manual: bool) -> bool {
        let seconds = clamp_open_seconds(seconds);

        if let Err(e) = self.relay.activate().await {
            error!("Relay activation failed: {}", e);
            self.display.show_notification(MSG_LOCK_FAULT);
            self.update_state(|s| s.door_opening = false);
            return false;
        }

        info!(seconds, manual, "Door unlocked");
        self.countdowns
            .start_countdown(CountdownKind::OpenCycle, seconds, LEADING_UNLOCKED)
            .await;

        if manual {
            self.consecutive_failures = 0;
        }
        true
    }

    async fn lock_door(&mut self) {
        // Locking withdraws an unanswered emergency question.
        if self.pending_confirmation.take().is_some() {
            info!("Emergency question withdrawn by lock");
            self.display.close_notification();
        }
        self.countdowns.stop_countdown(CountdownKind::OpenCycle).await;

        if let Err(e) = self.relay.deactivate().await {
            error!("Relay deactivation failed: {}", e);
        }
        info!("Door locked");

        self.countdowns
            .start_countdown(CountdownKind::Standard, LOCKED_NOTICE_SECONDS, LEADING_LOCKED)
            .await;
        self.update_state(|s| s.door_opening = false);
    }

    // System lock

    fn request_system_toggle(&mut self) {
        if !self.state.current().manual_unlocks_enabled {
            info!("System toggle ignored: manual unlocks disabled");
            return;
        }
        if self.scan_in_flight {
            debug!("System toggle ignored: scan already in progress");
            return;
        }
        self.display.show_notification(MSG_ADMIN_SCAN_PROMPT);
        self.spawn_scan(ScanPurpose::SystemToggle);
    }

    fn set_system_locked(&mut self, locked: bool) {
        if self.update_state(|s| s.locked = locked) {
            info!(locked, "System {}", if locked { "locked" } else { "unlocked" });
        }
    }

    // Manual unlocks and lockout

    async fn enable_manual_unlocks(&mut self) {
        self.consecutive_failures = 0;
        self.default_text = IDLE_TEXT;

        self.countdowns
            .stop_countdown(CountdownKind::FailedUnlocks)
            .await;
        for effect in self
            .countdowns
            .stop_countdown(CountdownKind::ManualUnlocks)
            .await
        {
            if let CountdownEffect::StatusText(text) = effect {
                self.show_status(text.as_deref());
            }
        }

        if self.update_state(|s| s.manual_unlocks_enabled = true) {
            info!("Manual unlocks enabled");
        }
    }

    async fn disable_manual_unlocks(&mut self, auto_enable: bool) {
        if self.update_state(|s| s.manual_unlocks_enabled = false) {
            warn!(auto_enable, "Manual unlocks disabled");
        }

        if auto_enable {
            self.countdowns
                .start_countdown(
                    CountdownKind::ManualUnlocks,
                    self.config.lockout_seconds,
                    LEADING_SYSTEM_DISABLED,
                )
                .await;
        } else {
            self.default_text = SYSTEM_DISABLED_TEXT;
            self.show_status(None);
        }
    }

    async fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        warn!(
            failures = self.consecutive_failures,
            "Fingerprint not recognized"
        );

        if self.consecutive_failures >= LOCKOUT_THRESHOLD
            && self.state.current().manual_unlocks_enabled
        {
            warn!(
                seconds = self.config.lockout_seconds,
                "Too many failed attempts, locking out manual unlocks"
            );
            self.disable_manual_unlocks(true).await;
        }
    }

    // Scans

    /// Claim the gate here, on the controller task, so a cancel that
    /// follows right behind the request reaches the scan.
    fn spawn_scan(&mut self, purpose: ScanPurpose) {
        self.scan_in_flight = true;
        let feedback = self.feedback_tx.clone();

        let session = match self.gate.reserve() {
            Ok(session) => session,
            Err(e) => {
                let _ = feedback.send(Feedback::ScanFinished {
                    purpose,
                    outcome: Err(e),
                });
                return;
            }
        };

        tokio::spawn(async move {
            let outcome = if purpose.admin_only() {
                session.scan_admin().await
            } else {
                session.scan().await
            };
            let _ = feedback.send(Feedback::ScanFinished {
                purpose,
                outcome: Ok(outcome),
            });
        });
    }

    async fn handle_feedback(&mut self, feedback: Feedback) {
        match feedback {
            Feedback::ScanFinished { purpose, outcome } => {
                self.scan_in_flight = false;
                match outcome {
                    Ok(outcome) => self.scan_finished(purpose, outcome).await,
                    Err(e) => {
                        warn!("Scan could not run: {}", e);
                        self.display.close_notification();
                        match purpose {
                            ScanPurpose::OpenDoor => {
                                self.update_state(|s| s.door_opening = false);
                            }
                            ScanPurpose::SystemToggle => {}
                            ScanPurpose::Settings(reply) => {
                                let _ = reply.send(false);
                            }
                        }
                    }
                }
            }
            Feedback::EmergencyConfirmation {
                id,
                ticket,
                confirmed,
            } => {
                self.emergency_confirmed(id, ticket, confirmed).await;
            }
            Feedback::RegistrationFinished(outcome) => {
                self.scan_in_flight = false;
                self.registration_finished(outcome).await;
            }
        }
    }

    async fn scan_finished(&mut self, purpose: ScanPurpose, outcome: ScanOutcome) {
        match (purpose, outcome) {
            (ScanPurpose::OpenDoor, ScanOutcome::Authorized(id)) => {
                self.display.close_notification();
                self.authorized_open(id).await;
            }
            (ScanPurpose::OpenDoor, ScanOutcome::Denied) => {
                self.record_failure().await;
                self.display.show_notification(MSG_NOT_RECOGNIZED);
                self.update_state(|s| s.door_opening = false);
            }
            (ScanPurpose::OpenDoor, ScanOutcome::Cancelled) => {
                info!("Open scan cancelled");
                self.display.close_notification();
                self.update_state(|s| s.door_opening = false);
            }

            (ScanPurpose::SystemToggle, ScanOutcome::Authorized(id)) => {
                self.display.close_notification();
                let locked = !self.state.current().locked;
                info!(credential_id = %id, "Administrator toggled the system lock");
                self.set_system_locked(locked);
            }
            (ScanPurpose::SystemToggle, ScanOutcome::Denied) => {
                self.record_failure().await;
                self.display.show_notification(MSG_NOT_AUTHORIZED);
            }
            (ScanPurpose::SystemToggle, ScanOutcome::Cancelled) => {
                info!("System toggle scan cancelled");
                self.display.close_notification();
            }

            (ScanPurpose::Settings(reply), ScanOutcome::Authorized(id)) => {
                self.display.close_notification();
                info!(credential_id = %id, "Settings opened");
                self.settings_open = true;
                let _ = reply.send(true);
            }
            (ScanPurpose::Settings(reply), ScanOutcome::Denied) => {
                warn!("Settings access denied");
                self.display.show_notification(MSG_ADMIN_ONLY);
                let _ = reply.send(false);
            }
            (ScanPurpose::Settings(reply), ScanOutcome::Cancelled) => {
                self.display.close_notification();
                let _ = reply.send(false);
            }
        }
    }

    async fn authorized_open(&mut self, id: CredentialId) {
        if self.gate.is_admin(id) {
            info!(credential_id = %id, "Administrator opened the door");
            self.unlock_door(self.config.open_cycle_seconds, true).await;
            return;
        }

        let remaining = self
            .settings
            .credential(id)
            .map(|c| c.emergency_uses)
            .unwrap_or(0);

        if remaining == 0 {
            warn!(credential_id = %id, "Out of emergency uses");
            self.display.show_notification(MSG_OUT_OF_EMERGENCY_USES);
            self.update_state(|s| s.door_opening = false);
            return;
        }

        self.confirmation_tickets += 1;
        let ticket = self.confirmation_tickets;
        self.pending_confirmation = Some(ticket);

        let answer = self.display.request_confirmation(MSG_EMERGENCY_PROMPT);
        let timeout = self.config.confirmation_timeout;
        let feedback = self.feedback_tx.clone();
        tokio::spawn(async move {
            let confirmed = matches!(tokio::time::timeout(timeout, answer).await, Ok(Ok(true)));
            let _ = feedback.send(Feedback::EmergencyConfirmation {
                id,
                ticket,
                confirmed,
            });
        });
    }

    async fn emergency_confirmed(&mut self, id: CredentialId, ticket: u64, confirmed: bool) {
        if self.pending_confirmation != Some(ticket) {
            debug!(credential_id = %id, ticket, "Stale emergency answer ignored");
            return;
        }
        self.pending_confirmation = None;
        self.display.close_notification();

        if !confirmed {
            info!(credential_id = %id, "Emergency use declined");
            self.update_state(|s| s.door_opening = false);
            return;
        }

        if !self.unlock_door(self.config.open_cycle_seconds, true).await {
            return;
        }

        warn!(credential_id = %id, "Emergency use consumed");
        if let Some(mut credential) = self.settings.credential(id) {
            credential.emergency_uses = 0;
            self.settings.put_credential(&credential);
            self.persist().await;
            self.refresh_listing();
        }
    }

    // Settings

    fn request_settings_access(&mut self, reply: oneshot::Sender<bool>) {
        if self.settings_open {
            let _ = reply.send(true);
            return;
        }
        if self.settings.credential_ids().is_empty() {
            info!("Settings opened: no credentials enrolled");
            self.settings_open = true;
            let _ = reply.send(true);
            return;
        }
        if self.scan_in_flight {
            debug!("Settings request ignored: scan already in progress");
            let _ = reply.send(false);
            return;
        }
        self.display.show_notification(MSG_ADMIN_SCAN_PROMPT);
        self.spawn_scan(ScanPurpose::Settings(reply));
    }

    fn require_settings(&self, action: &str) -> bool {
        if !self.settings_open {
            warn!("Cannot {} without settings access", action);
        }
        self.settings_open
    }

    fn register_credential(&mut self) {
        if !self.require_settings("register credentials") {
            return;
        }
        if self.scan_in_flight {
            debug!("Registration ignored: scan already in progress");
            return;
        }

        self.scan_in_flight = true;
        self.display.show_notification(MSG_REGISTER_PROMPT);
        let feedback = self.feedback_tx.clone();
        match self.gate.reserve() {
            Ok(session) => {
                tokio::spawn(async move {
                    let outcome = session.register().await;
                    let _ = feedback.send(Feedback::RegistrationFinished(Ok(outcome)));
                });
            }
            Err(e) => {
                let _ = feedback.send(Feedback::RegistrationFinished(Err(e)));
            }
        }
    }

    async fn registration_finished(&mut self, outcome: Result<RegistrationOutcome>) {
        match outcome {
            Ok(RegistrationOutcome::Registered(enrollment)) => {
                if let Err(e) = self
                    .settings
                    .store_template(enrollment.id, &enrollment.template)
                    .await
                {
                    error!(credential_id = %enrollment.id, "Failed to store template: {}", e);
                    self.display.show_notification(MSG_REGISTRATION_FAILED);
                    return;
                }
                self.settings
                    .put_credential(&Credential::enrolled(enrollment.id));
                self.persist().await;
                self.refresh_listing();
                info!(credential_id = %enrollment.id, "Credential registered");
                self.display
                    .show_notification(&format!("Fingerprint #{} registered.", enrollment.id));
            }
            Ok(RegistrationOutcome::AlreadyRegistered(id)) => {
                info!(credential_id = %id, "Registration rejected: already enrolled");
                self.display.show_notification(MSG_ALREADY_REGISTERED);
            }
            Ok(RegistrationOutcome::Failed) => {
                self.display.show_notification(MSG_REGISTRATION_FAILED);
            }
            Ok(RegistrationOutcome::Cancelled) => {
                self.display.close_notification();
            }
            Err(e) => {
                warn!("Registration could not run: {}", e);
                self.display.close_notification();
            }
        }
    }

    async fn edit_credential(&mut self, id: CredentialId, edit: impl FnOnce(&mut Credential)) {
        let Some(mut credential) = self.settings.credential(id) else {
            let err = Error::CredentialNotFound(id);
            warn!("{}", err);
            self.display.show_notification(&err.to_string());
            return;
        };

        edit(&mut credential);
        self.settings.put_credential(&credential);
        self.persist().await;
        self.gate.replace_admins(self.settings.admin_ids());
        self.refresh_listing();
        info!(
            credential_id = %id,
            admin = credential.admin,
            emergency_uses = credential.emergency_uses,
            "Credential updated"
        );
    }

    async fn remove_credential(&mut self, id: CredentialId) {
        if !self.require_settings("remove credentials") {
            return;
        }
        if self.scan_in_flight {
            debug!("Removal ignored: scan already in progress");
            return;
        }

        let Some(credential) = self.settings.credential(id) else {
            let err = Error::CredentialNotFound(id);
            warn!("{}", err);
            self.display.show_notification(&err.to_string());
            return;
        };

        if credential.admin {
            warn!("{}", Error::AdminRemovalRejected(id));
            self.display.show_notification(MSG_ADMIN_REMOVAL);
            return;
        }

        if let Err(e) = self.settings.delete_template(id).await {
            error!(credential_id = %id, "Failed to delete template: {}", e);
            return;
        }
        self.settings.forget_credential(id);
        self.persist().await;

        match self.settings.load_templates().await {
            Ok(templates) => {
                if let Err(e) = self.gate.upload_templates(&templates, true).await {
                    error!("Failed to resync sensor after removal: {}", e);
                }
            }
            Err(e) => error!("Failed to reload templates after removal: {}", e),
        }

        self.gate.replace_admins(self.settings.admin_ids());
        self.refresh_listing();
        info!(credential_id = %id, "Credential removed");
    }

    fn refresh_listing(&self) {
        let labels: Vec<String> = self
            .settings
            .credentials()
            .iter()
            .map(Credential::listing_label)
            .collect();
        self.display.show_credentials(&labels);
    }

    // Remote

    async fn handle_remote(&mut self, command: RemoteCommand) {
        let state = self.state.current();
        match command.kind {
            RemoteCommandKind::Lock => self.lock_door().await,
            RemoteCommandKind::Unlock => {
                let seconds = command.unlock_seconds();
                self.update_state(|s| s.door_opening = true);
                self.unlock_door(seconds, false).await;
            }
            RemoteCommandKind::SystemLock => {
                if !state.locked {
                    self.set_system_locked(true);
                }
            }
            RemoteCommandKind::SystemUnlock => {
                if state.locked {
                    self.set_system_locked(false);
                }
            }
            RemoteCommandKind::ManualUnlocksEnable => {
                if !state.manual_unlocks_enabled {
                    self.enable_manual_unlocks().await;
                }
            }
            RemoteCommandKind::ManualUnlocksDisable => {
                if state.manual_unlocks_enabled {
                    self.disable_manual_unlocks(false).await;
                }
            }
            RemoteCommandKind::Unrecognized => {
                debug!(args = ?command.args, "Unrecognized remote command ignored");
            }
        }
    }

    // Countdowns

    async fn countdown_completed(&mut self, kind: CountdownKind) {
        match kind {
            CountdownKind::OpenCycle => self.lock_door().await,
            CountdownKind::ManualUnlocks => self.enable_manual_unlocks().await,
            CountdownKind::FailedUnlocks => self.consecutive_failures = 0,
            CountdownKind::Standard | CountdownKind::Background => {}
        }
    }

    fn show_status(&self, text: Option<&str>) {
        self.display.set_status_text(text.unwrap_or(self.default_text));
    }

    // Shared helpers

    /// Apply `change` and mirror lock and manual-unlock flags onto the display.
    fn update_state(&mut self, change: impl FnOnce(&mut ControlState)) -> bool {
        let before = self.state.current();
        if !self.state.update(change) {
            return false;
        }
        let after = self.state.current();
        debug!(from = %before, to = %after, "State transition");
        if before.locked != after.locked {
            self.display.set_system_locked(after.locked);
        }
        if before.manual_unlocks_enabled != after.manual_unlocks_enabled {
            self.display.set_manual_unlocks(after.manual_unlocks_enabled);
        }
        true
    }

    async fn persist(&mut self) {
        if let Err(e) = self.settings.flush().await {
            warn!("Settings not saved, will retry on next change: {}", e);
        }
    }

    async fn shut_down(&mut self) {
        info!("Shutting down controller");
        self.disable_manual_unlocks(false).await;
        self.gate.cancel();

        if let Err(e) = self.relay.deactivate().await {
            error!("Relay deactivation failed during shutdown: {}", e);
        }
        if let Err(e) = self.relay.shutdown().await {
            error!("Relay shutdown failed: {}", e);
        }

        self.persist().await;
        self.countdowns.stop_all().await;
        self.settings_open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(3, 3)]
    #[case(0, 1)]
    #[case(42, 9)]
    fn test_config_clamps_open_cycle(#[case] seconds: i64, #[case] expected: i64) {
        let config = ControllerConfig::default().open_cycle_seconds(seconds);
        assert_eq!(config.open_cycle_seconds, expected);
    }

    #[test]
    fn test_config_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.open_cycle_seconds, 3);
        assert_eq!(config.confirmation_timeout, Duration::from_secs(15));
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.lockout_seconds, 300);
    }

    #[rstest]
    #[case(300, 300)]
    #[case(2, 2)]
    #[case(0, 1)]
    #[case(-5, 1)]
    fn test_config_lockout_seconds(#[case] seconds: i64, #[case] expected: i64) {
        let config = ControllerConfig::default().lockout_seconds(seconds);
        assert_eq!(config.lockout_seconds, expected);
    }

    #[test]
    fn test_only_open_door_scans_accept_non_admins() {
        let (reply, _rx) = oneshot::channel();
        assert!(!ScanPurpose::OpenDoor.admin_only());
        assert!(ScanPurpose::SystemToggle.admin_only());
        assert!(ScanPurpose::Settings(reply).admin_only());
    }
}
