//! Single cancellable countdown.
//!
//! A [`CountdownEngine`] owns at most one live run. Each run is a spawned
//! task that reports through a [`CountdownSignal`] channel and is stopped
//! through its own [`CancellationToken`]. Runs carry a [`RunId`] so the
//! consumer can drop signals from a run that has since been replaced.
//!
//! # Modes
//!
//! - `duration > 0`: emit [`CountdownSignal::Tick`] with the remaining time,
//!   sleep `min(tick, remaining)`, subtract the measured sleep and repeat.
//! - `duration <= 0`: emit one [`CountdownSignal::Notice`], then hold for
//!   `|duration|` without ticking.
//!
//! A run that finishes on its own emits [`CountdownSignal::Done`] exactly
//! once. A stopped run emits nothing further.

use std::time::Duration;

use latchkey_core::{CountdownKind, Error, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Identifies one run of an engine.
pub type RunId = u64;

/// Report emitted by a running countdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountdownSignal {
    Tick {
        kind: CountdownKind,
        run: RunId,
        remaining: Duration,
    },
    Notice {
        kind: CountdownKind,
        run: RunId,
    },
    Done {
        kind: CountdownKind,
        run: RunId,
    },
}

impl CountdownSignal {
    pub fn kind(&self) -> CountdownKind {
        match self {
            Self::Tick { kind, .. } | Self::Notice { kind, .. } | Self::Done { kind, .. } => *kind,
        }
    }

    pub fn run(&self) -> RunId {
        match self {
            Self::Tick { run, .. } | Self::Notice { run, .. } | Self::Done { run, .. } => *run,
        }
    }
}

struct ActiveRun {
    id: RunId,
    leading_text: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Countdown primitive for one [`CountdownKind`].
pub struct CountdownEngine {
    kind: CountdownKind,
    signals: mpsc::UnboundedSender<CountdownSignal>,
    active: Option<ActiveRun>,
    next_run: RunId,
}

impl CountdownEngine {
    pub fn new(kind: CountdownKind, signals: mpsc::UnboundedSender<CountdownSignal>) -> Self {
        Self {
            kind,
            signals,
            active: None,
            next_run: 0,
        }
    }

    pub fn kind(&self) -> CountdownKind {
        self.kind
    }

    /// Start a run of `duration_ms` milliseconds.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CountdownRunning`] if a run is still live; use
    /// [`restart`](Self::restart) to replace it.
    pub fn start(
        &mut self,
        duration_ms: i64,
        tick: Duration,
        leading_text: impl Into<String>,
    ) -> Result<RunId> {
        if self.active.is_some() {
            return Err(Error::CountdownRunning { kind: self.kind });
        }
        Ok(self.launch(duration_ms, tick, leading_text.into()))
    }

    /// Stop any live run, wait for it to wind down, then start afresh.
    pub async fn restart(
        &mut self,
        duration_ms: i64,
        tick: Duration,
        leading_text: impl Into<String>,
    ) -> RunId {
        self.stop().await;
        self.launch(duration_ms, tick, leading_text.into())
    }

    fn launch(&mut self, duration_ms: i64, tick: Duration, leading_text: String) -> RunId {
        let id = self.next_run;
        self.next_run += 1;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_countdown(
            self.kind,
            id,
            duration_ms,
            tick.max(Duration::from_millis(1)),
            self.signals.clone(),
            cancel.clone(),
        ));

        debug!(kind = %self.kind, run = id, duration_ms, "Countdown started");
        self.active = Some(ActiveRun {
            id,
            leading_text,
            cancel,
            task,
        });
        id
    }

    /// Cancel the live run, if any, and wait until its task has exited.
    ///
    /// Returns whether a run was stopped.
    pub async fn stop(&mut self) -> bool {
        let Some(run) = self.active.take() else {
            return false;
        };
        run.cancel.cancel();
        // A cancelled task only returns; a join error means it panicked.
        let _ = run.task.await;
        debug!(kind = %self.kind, run = run.id, "Countdown stopped");
        true
    }

    /// Whether a run is live. A run that finished on its own still counts
    /// until its [`CountdownSignal::Done`] has been [settled](Self::settle).
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Leading text of the live run.
    pub fn leading_text(&self) -> Option<&str> {
        self.active.as_ref().map(|run| run.leading_text.as_str())
    }

    /// Whether `run` is the live run.
    pub fn is_current(&self, run: RunId) -> bool {
        self.active.as_ref().is_some_and(|active| active.id == run)
    }

    /// Retire `run` after its completion was observed.
    ///
    /// Returns `false` if `run` is not the live run.
    pub fn settle(&mut self, run: RunId) -> bool {
        if self.is_current(run) {
            self.active = None;
            true
        } else {
            false
        }
    }
}

impl Drop for CountdownEngine {
    fn drop(&mut self) {
        if let Some(run) = self.active.take() {
            run.cancel.cancel();
        }
    }
}

/// Sleep for `step` unless cancelled first. Returns the time actually slept.
async fn sleep_step(step: Duration, cancel: &CancellationToken) -> Option<Duration> {
    let started = Instant::now();
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        _ = tokio::time::sleep(step) => Some(started.elapsed()),
    }
}

async fn run_countdown(
    kind: CountdownKind,
    run: RunId,
    duration_ms: i64,
    tick: Duration,
    signals: mpsc::UnboundedSender<CountdownSignal>,
    cancel: CancellationToken,
) {
    if duration_ms > 0 {
        let mut remaining = Duration::from_millis(duration_ms.unsigned_abs());
        while !remaining.is_zero() {
            trace!(kind = %kind, run, remaining_ms = remaining.as_millis() as u64, "Tick");
            if signals
                .send(CountdownSignal::Tick {
                    kind,
                    run,
                    remaining,
                })
                .is_err()
            {
                return;
            }
            let Some(slept) = sleep_step(tick.min(remaining), &cancel).await else {
                return;
            };
            remaining = remaining.saturating_sub(slept);
        }
    } else {
        if signals.send(CountdownSignal::Notice { kind, run }).is_err() {
            return;
        }
        let total = Duration::from_millis(duration_ms.unsigned_abs());
        let mut elapsed = Duration::ZERO;
        while elapsed < total {
            let Some(slept) = sleep_step(tick.min(total - elapsed), &cancel).await else {
                return;
            };
            elapsed += slept;
        }
    }

    if !cancel.is_cancelled() {
        let _ = signals.send(CountdownSignal::Done { kind, run });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(1000);

    fn engine(kind: CountdownKind) -> (CountdownEngine, mpsc::UnboundedReceiver<CountdownSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (CountdownEngine::new(kind, tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_positive_duration_ticks_then_completes() {
        let (mut engine, mut rx) = engine(CountdownKind::OpenCycle);
        let run = engine.start(3000, TICK, "Unlocked for ").unwrap();

        let mut remaining = Vec::new();
        loop {
            match rx.recv().await.unwrap() {
                CountdownSignal::Tick { remaining: r, .. } => remaining.push(r.as_secs()),
                CountdownSignal::Done { kind, run: done } => {
                    assert_eq!(kind, CountdownKind::OpenCycle);
                    assert_eq!(done, run);
                    break;
                }
                other => panic!("unexpected signal {:?}", other),
            }
        }
        assert_eq!(remaining, vec![3, 2, 1]);
        assert!(engine.is_running());
        assert!(engine.settle(run));
        assert!(!engine.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_last_step() {
        let (mut engine, mut rx) = engine(CountdownKind::Standard);
        engine.start(1500, TICK, "").unwrap();

        let started = Instant::now();
        let mut ticks = 0;
        while let Some(signal) = rx.recv().await {
            match signal {
                CountdownSignal::Tick { .. } => ticks += 1,
                CountdownSignal::Done { .. } => break,
                CountdownSignal::Notice { .. } => panic!("positive runs never emit a notice"),
            }
        }
        assert_eq!(ticks, 2);
        assert_eq!(started.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_duration_holds_without_ticks() {
        let (mut engine, mut rx) = engine(CountdownKind::Standard);
        engine.start(-1000, TICK, "Locked...").unwrap();

        let started = Instant::now();
        assert!(matches!(rx.recv().await, Some(CountdownSignal::Notice { .. })));
        assert!(matches!(rx.recv().await, Some(CountdownSignal::Done { .. })));
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_completes_after_notice() {
        let (mut engine, mut rx) = engine(CountdownKind::Background);
        engine.start(0, TICK, "").unwrap();

        assert!(matches!(rx.recv().await, Some(CountdownSignal::Notice { .. })));
        assert!(matches!(rx.recv().await, Some(CountdownSignal::Done { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_suppresses_done() {
        let (mut engine, mut rx) = engine(CountdownKind::OpenCycle);
        engine.start(3000, TICK, "Unlocked for ").unwrap();
        assert!(matches!(rx.recv().await, Some(CountdownSignal::Tick { .. })));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(engine.stop().await);
        assert!(!engine.is_running());

        tokio::time::sleep(Duration::from_secs(5)).await;
        while let Ok(signal) = rx.try_recv() {
            assert!(
                !matches!(signal, CountdownSignal::Done { .. }),
                "stopped run completed"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_running_is_rejected() {
        let (mut engine, _rx) = engine(CountdownKind::ManualUnlocks);
        engine.start(5000, TICK, "").unwrap();

        let err = engine.start(5000, TICK, "").unwrap_err();
        assert!(matches!(
            err,
            Error::CountdownRunning {
                kind: CountdownKind::ManualUnlocks
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_run() {
        let (mut engine, mut rx) = engine(CountdownKind::OpenCycle);
        let first = engine.start(3000, TICK, "first").unwrap();
        let second = engine.restart(2000, TICK, "second").await;

        assert_ne!(first, second);
        assert!(engine.is_current(second));
        assert!(!engine.is_current(first));
        assert_eq!(engine.leading_text(), Some("second"));

        let mut done = Vec::new();
        tokio::time::sleep(Duration::from_secs(4)).await;
        while let Ok(signal) = rx.try_recv() {
            if let CountdownSignal::Done { run, .. } = signal {
                done.push(run);
            }
        }
        assert_eq!(done, vec![second]);
    }

    #[tokio::test]
    async fn test_stop_without_run() {
        let (mut engine, _rx) = engine(CountdownKind::FailedUnlocks);
        assert!(!engine.stop().await);
        assert!(!engine.settle(0));
    }
}
