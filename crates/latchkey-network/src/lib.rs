//! Remote connection layer for Latchkey.
//!
//! The access point keeps one long-lived text connection to a remote peer.
//! The peer pushes commands (lock, unlock, system lock, manual unlock
//! toggles) and informational lines; the access point answers only with
//! periodic keep-alives.
//!
//! # Components
//!
//! - [`Transport`]: connect/disconnect/send over some line-oriented link,
//!   reporting [`TransportEvent`]s on a channel
//! - [`LineTransport`]: TCP implementation using newline-delimited frames
//! - [`RemoteClient`]: keep-alive and reconnect timers plus inbound dispatch
//! - [`mock::MockTransport`]: scripted transport for tests
//!
//! # Example
//!
//! ```no_run
//! use latchkey_network::{LineTransport, LineTransportConfig, RemoteClient, RemoteClientConfig};
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (events_tx, events_rx) = mpsc::unbounded_channel();
//! let transport = LineTransport::new(
//!     LineTransportConfig::new("127.0.0.1:4000".parse()?),
//!     events_tx,
//! );
//!
//! let (commands_tx, mut commands_rx) = mpsc::channel(32);
//! let client = RemoteClient::new(RemoteClientConfig::default(), transport, events_rx, commands_tx);
//!
//! let shutdown = CancellationToken::new();
//! tokio::spawn(client.run(shutdown.clone()));
//!
//! while let Some(command) = commands_rx.recv().await {
//!     println!("remote asked for {}", command.kind);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
pub mod mock;
mod tcp;
mod transport;

pub use client::{RemoteClient, RemoteClientConfig};
pub use tcp::{LineTransport, LineTransportConfig};
pub use transport::{Transport, TransportError, TransportEvent};
