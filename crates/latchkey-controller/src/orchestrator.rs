//! One countdown per kind, status text composition and completion effects.
//!
//! The orchestrator never touches the display or the controller state. It
//! turns [`CountdownSignal`]s into [`CountdownEffect`]s that the controller
//! applies on its own task, so every effect is serialized with the rest of
//! the controller's mutations.
//!
//! # Text precedence
//!
//! Only [`TEXT_PRECEDENCE`] kinds produce text. A tick from one of them is
//! shown only when no kind ahead of it in the table is running.
//!
//! # Inactivity
//!
//! Completion of any text kind arms a short [`CountdownKind::Background`]
//! run. When that run completes and neither a Standard nor a ManualUnlocks
//! countdown is running, the idle text is restored. Several completions in
//! quick succession therefore settle on a single idle update.

use std::time::Duration;

use latchkey_core::CountdownKind;
use latchkey_core::constants::{COUNTDOWN_TICK, INACTIVITY_MS, INACTIVITY_TICK};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::countdown::{CountdownEngine, CountdownSignal, RunId};

/// Kinds that produce visible text, highest precedence first.
pub const TEXT_PRECEDENCE: [CountdownKind; 3] = [
    CountdownKind::OpenCycle,
    CountdownKind::Standard,
    CountdownKind::ManualUnlocks,
];

/// What the controller must do in response to a countdown signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountdownEffect {
    /// Replace the status text. `None` means the current idle text.
    StatusText(Option<String>),
    /// A countdown of this kind ran to completion.
    Completed(CountdownKind),
}

/// Timer settings shared by every engine.
#[derive(Debug, Clone)]
pub struct CountdownTiming {
    /// Tick interval of visible countdowns
    pub tick: Duration,

    /// Duration of the inactivity run in milliseconds
    pub inactivity_ms: i64,

    /// Tick interval of the inactivity run
    pub inactivity_tick: Duration,
}

impl Default for CountdownTiming {
    fn default() -> Self {
        Self {
            tick: COUNTDOWN_TICK,
            inactivity_ms: INACTIVITY_MS,
            inactivity_tick: INACTIVITY_TICK,
        }
    }
}

/// `leading` followed by the remaining whole seconds as `MM:SS.`
pub fn compose_text(leading: &str, remaining: Duration) -> String {
    let seconds = remaining.as_secs();
    format!("{}{:02}:{:02}.", leading, seconds / 60, seconds % 60)
}

/// Owns one [`CountdownEngine`] per kind.
pub struct CountdownOrchestrator {
    standard: CountdownEngine,
    open_cycle: CountdownEngine,
    manual_unlocks: CountdownEngine,
    failed_unlocks: CountdownEngine,
    inactivity: CountdownEngine,
    timing: CountdownTiming,
}

impl CountdownOrchestrator {
    /// Create the engines. Every signal they emit arrives on the returned
    /// receiver and should be fed back through [`handle_signal`](Self::handle_signal).
    pub fn new(timing: CountdownTiming) -> (Self, mpsc::UnboundedReceiver<CountdownSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let orchestrator = Self {
            standard: CountdownEngine::new(CountdownKind::Standard, tx.clone()),
            open_cycle: CountdownEngine::new(CountdownKind::OpenCycle, tx.clone()),
            manual_unlocks: CountdownEngine::new(CountdownKind::ManualUnlocks, tx.clone()),
            failed_unlocks: CountdownEngine::new(CountdownKind::FailedUnlocks, tx.clone()),
            inactivity: CountdownEngine::new(CountdownKind::Background, tx),
            timing,
        };
        (orchestrator, rx)
    }

    fn engine(&self, kind: CountdownKind) -> &CountdownEngine {
        match kind {
            CountdownKind::Standard => &self.standard,
            CountdownKind::OpenCycle => &self.open_cycle,
            CountdownKind::ManualUnlocks => &self.manual_unlocks,
            CountdownKind::FailedUnlocks => &self.failed_unlocks,
            CountdownKind::Background => &self.inactivity,
        }
    }

    fn engine_mut(&mut self, kind: CountdownKind) -> &mut CountdownEngine {
        match kind {
            CountdownKind::Standard => &mut self.standard,
            CountdownKind::OpenCycle => &mut self.open_cycle,
            CountdownKind::ManualUnlocks => &mut self.manual_unlocks,
            CountdownKind::FailedUnlocks => &mut self.failed_unlocks,
            CountdownKind::Background => &mut self.inactivity,
        }
    }

    pub fn is_running(&self, kind: CountdownKind) -> bool {
        self.engine(kind).is_running()
    }

    /// (Re)start the countdown of `kind` for `seconds`.
    ///
    /// Negative or zero `seconds` hold for `|seconds|` and show only the
    /// leading text. The Background kind is reserved for the inactivity
    /// run and cannot be started here.
    pub async fn start_countdown(
        &mut self,
        kind: CountdownKind,
        seconds: i64,
        leading_text: &str,
    ) -> Option<RunId> {
        if kind == CountdownKind::Background {
            warn!("Background countdowns are managed internally");
            return None;
        }
        let tick = self.timing.tick;
        let run = self
            .engine_mut(kind)
            .restart(seconds.saturating_mul(1000), tick, leading_text)
            .await;
        Some(run)
    }

    /// Stop the countdown of `kind`.
    ///
    /// Standard countdowns clear themselves and are left alone. Stopping
    /// ManualUnlocks also restores the idle text immediately.
    pub async fn stop_countdown(&mut self, kind: CountdownKind) -> Vec<CountdownEffect> {
        match kind {
            CountdownKind::Standard | CountdownKind::Background => Vec::new(),
            CountdownKind::ManualUnlocks => {
                self.manual_unlocks.stop().await;
                vec![CountdownEffect::StatusText(None)]
            }
            CountdownKind::OpenCycle | CountdownKind::FailedUnlocks => {
                self.engine_mut(kind).stop().await;
                Vec::new()
            }
        }
    }

    /// Stop every engine, including the inactivity run.
    pub async fn stop_all(&mut self) {
        for kind in CountdownKind::ALL {
            self.engine_mut(kind).stop().await;
        }
    }

    /// Whether `kind` may show text right now.
    fn has_precedence(&self, kind: CountdownKind) -> bool {
        TEXT_PRECEDENCE
            .iter()
            .take_while(|k| **k != kind)
            .all(|k| !self.is_running(*k))
    }

    /// Translate a signal into effects. Signals from stopped or replaced
    /// runs produce nothing.
    pub async fn handle_signal(&mut self, signal: CountdownSignal) -> Vec<CountdownEffect> {
        let kind = signal.kind();
        if !self.engine(kind).is_current(signal.run()) {
            trace!(kind = %kind, run = signal.run(), "Dropping signal from a retired run");
            return Vec::new();
        }

        match signal {
            CountdownSignal::Tick { remaining, .. } => {
                if !TEXT_PRECEDENCE.contains(&kind) || !self.has_precedence(kind) {
                    return Vec::new();
                }
                let leading = self.engine(kind).leading_text().unwrap_or_default();
                vec![CountdownEffect::StatusText(Some(compose_text(
                    leading, remaining,
                )))]
            }
            CountdownSignal::Notice { .. } => {
                if !TEXT_PRECEDENCE.contains(&kind) {
                    return Vec::new();
                }
                let leading = self.engine(kind).leading_text().unwrap_or_default();
                vec![CountdownEffect::StatusText(Some(leading.to_string()))]
            }
            CountdownSignal::Done { run, .. } => {
                self.engine_mut(kind).settle(run);
                debug!(kind = %kind, "Countdown completed");

                if kind == CountdownKind::Background {
                    let busy = self.standard.is_running() || self.manual_unlocks.is_running();
                    return if busy {
                        Vec::new()
                    } else {
                        vec![CountdownEffect::StatusText(None)]
                    };
                }

                if kind != CountdownKind::FailedUnlocks && !self.inactivity.is_running() {
                    let timing = self.timing.clone();
                    self.inactivity
                        .restart(timing.inactivity_ms, timing.inactivity_tick, "")
                        .await;
                }
                vec![CountdownEffect::Completed(kind)]
            }
        }
    }
}
