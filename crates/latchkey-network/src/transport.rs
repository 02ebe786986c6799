#![allow(async_fn_in_trait)]

use thiserror::Error;

/// Lifecycle and data events a transport reports.
///
/// Transports deliver these on an unbounded channel handed to them at
/// construction, so a reader task never blocks on the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    Text(String),
}

/// Errors that can occur while establishing a connection
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection attempt timed out
    #[error("Connection timeout after {0}ms")]
    ConnectionTimeout(u64),

    /// Peer refused or the link is unavailable
    #[error("Connection refused: {0}")]
    Refused(String),

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A line-oriented, reconnectable link to the remote peer.
///
/// Inbound lines and connection state changes are not returned from these
/// methods; they arrive as [`TransportEvent`]s.
pub trait Transport: Send {
    /// Open the link. Emits [`TransportEvent::Connected`] on success.
    ///
    /// # Errors
    ///
    /// Returns an error if the link could not be opened.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Close the link. Emits [`TransportEvent::Disconnected`] if it was open.
    async fn disconnect(&mut self);

    /// Send one line. Returns `false` when the line could not be written.
    async fn send(&mut self, line: &str) -> bool;

    fn is_open(&self) -> bool;
}
