//! Remote client: connection upkeep and inbound dispatch.
//!
//! # Timers
//!
//! ```text
//!            connect ok                      peer drops / connect fails
//!   ┌──────────────────────┐            ┌──────────────────────────────┐
//!   │ keep-alive every 20s │ ◄────────► │ reconnect attempt every 5s   │
//!   └──────────────────────┘  Connected └──────────────────────────────┘
//! ```
//!
//! The keep-alive ticker runs for the life of the client and only writes
//! while the link is open. The reconnect ticker exists only while the link
//! is down and is dropped as soon as [`TransportEvent::Connected`] arrives.
//! Connection attempts are awaited inline, so at most one is ever in
//! flight.

use std::time::Duration;

use latchkey_core::constants::{KEEP_ALIVE_INTERVAL, KEEP_ALIVE_LINE, RECONNECT_INTERVAL};
use latchkey_protocol::{InboundMessage, RemoteCommand, classify};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::transport::{Transport, TransportEvent};

/// Timer configuration for [`RemoteClient`]
#[derive(Debug, Clone)]
pub struct RemoteClientConfig {
    /// Interval between keep-alive lines
    pub keep_alive_interval: Duration,

    /// Interval between reconnect attempts while disconnected
    pub reconnect_interval: Duration,
}

impl Default for RemoteClientConfig {
    fn default() -> Self {
        Self {
            keep_alive_interval: KEEP_ALIVE_INTERVAL,
            reconnect_interval: RECONNECT_INTERVAL,
        }
    }
}

fn ticker(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn tick_if_armed(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Long-lived client for the remote peer.
///
/// Commands parsed from `#command=` lines are forwarded on the `commands`
/// channel; every other line is logged.
pub struct RemoteClient<T: Transport> {
    config: RemoteClientConfig,
    transport: T,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    commands: mpsc::Sender<RemoteCommand>,
    reconnect: Option<Interval>,
}

impl<T: Transport> RemoteClient<T> {
    pub fn new(
        config: RemoteClientConfig,
        transport: T,
        events: mpsc::UnboundedReceiver<TransportEvent>,
        commands: mpsc::Sender<RemoteCommand>,
    ) -> Self {
        Self {
            config,
            transport,
            events,
            commands,
            reconnect: None,
        }
    }

    /// Connect and service the link until `shutdown` fires.
    ///
    /// Connection failures never end the loop; they arm the reconnect
    /// ticker. On shutdown the transport is disconnected.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut keep_alive = ticker(self.config.keep_alive_interval);
        self.attempt_connect().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Remote client shutting down");
                    self.transport.disconnect().await;
                    break;
                }

                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        warn!("Transport event channel closed");
                        break;
                    }
                },

                _ = keep_alive.tick() => {
                    if self.transport.is_open() {
                        trace!("Sending keep-alive");
                        self.transport.send(KEEP_ALIVE_LINE).await;
                    }
                }

                _ = tick_if_armed(&mut self.reconnect) => {
                    if self.transport.is_open() {
                        self.reconnect = None;
                    } else {
                        debug!("Attempting reconnect");
                        self.attempt_connect().await;
                    }
                }
            }
        }
    }

    async fn attempt_connect(&mut self) {
        if let Err(e) = self.transport.connect().await {
            warn!("Could not connect to remote: {}", e);
            self.arm_reconnect();
        }
    }

    fn arm_reconnect(&mut self) {
        if self.reconnect.is_none() {
            self.reconnect = Some(ticker(self.config.reconnect_interval));
        }
    }

    async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                info!("Connected to remote");
                self.reconnect = None;
                self.transport.send(KEEP_ALIVE_LINE).await;
            }
            TransportEvent::Disconnected => {
                warn!("Disconnected from remote");
                self.arm_reconnect();
            }
            TransportEvent::Text(line) => self.dispatch(&line).await,
        }
    }

    async fn dispatch(&mut self, line: &str) {
        match classify(line) {
            InboundMessage::Command(command) => {
                info!(command = %command.kind, args = ?command.args, "Remote command received");
                if self.commands.send(command).await.is_err() {
                    warn!("Command receiver dropped; remote command discarded");
                }
            }
            InboundMessage::Broadcast(text) => info!(text = %text, "Remote broadcast"),
            InboundMessage::Connection(text) => debug!(text = %text, "Remote connection notice"),
            InboundMessage::Response(text) => debug!(text = %text, "Remote response"),
            InboundMessage::Plain(text) => debug!(text = %text, "Remote message"),
        }
    }
}
