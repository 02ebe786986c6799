//! Scripted transport for testing the remote client without sockets.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::transport::{Transport, TransportError, TransportEvent};

#[derive(Debug, Default)]
struct LinkState {
    open: bool,
    refuse: bool,
    connect_attempts: usize,
    sent: Vec<String>,
}

fn lock(state: &Mutex<LinkState>) -> MutexGuard<'_, LinkState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory transport driven by a [`MockTransportHandle`].
///
/// # Examples
///
/// ```
/// use latchkey_network::mock::MockTransport;
/// use latchkey_network::{Transport, TransportEvent};
///
/// #[tokio::main]
/// async fn main() {
///     let (mut transport, handle, mut events) = MockTransport::new();
///     transport.connect().await.unwrap();
///     assert_eq!(events.recv().await, Some(TransportEvent::Connected));
///
///     assert!(transport.send("#connection=keep-alive").await);
///     assert_eq!(handle.sent(), vec!["#connection=keep-alive".to_string()]);
/// }
/// ```
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<LinkState>>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl MockTransport {
    /// Create a closed transport, its handle, and the event receiver the
    /// remote client consumes.
    pub fn new() -> (
        Self,
        MockTransportHandle,
        mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(LinkState::default()));
        let transport = Self {
            state: Arc::clone(&state),
            events: events.clone(),
        };
        (transport, MockTransportHandle { state, events }, events_rx)
    }
}

impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        {
            let mut state = lock(&self.state);
            state.connect_attempts += 1;
            if state.refuse {
                return Err(TransportError::Refused("peer unavailable".into()));
            }
            state.open = true;
        }
        let _ = self.events.send(TransportEvent::Connected);
        Ok(())
    }

    async fn disconnect(&mut self) {
        let was_open = std::mem::replace(&mut lock(&self.state).open, false);
        if was_open {
            let _ = self.events.send(TransportEvent::Disconnected);
        }
    }

    async fn send(&mut self, line: &str) -> bool {
        let mut state = lock(&self.state);
        if !state.open {
            return false;
        }
        state.sent.push(line.to_string());
        true
    }

    fn is_open(&self) -> bool {
        lock(&self.state).open
    }
}

/// Handle that plays the remote peer for a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockTransportHandle {
    state: Arc<Mutex<LinkState>>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl MockTransportHandle {
    /// Deliver an inbound line.
    pub fn push_line(&self, line: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Text(line.into()));
    }

    /// Simulate the peer dropping the connection.
    pub fn drop_connection(&self) {
        let was_open = std::mem::replace(&mut lock(&self.state).open, false);
        if was_open {
            let _ = self.events.send(TransportEvent::Disconnected);
        }
    }

    /// Make subsequent connection attempts fail.
    pub fn refuse_connections(&self, refuse: bool) {
        lock(&self.state).refuse = refuse;
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    pub fn connect_attempts(&self) -> usize {
        lock(&self.state).connect_attempts
    }

    /// Every line written so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        lock(&self.state).sent.clone()
    }
}
