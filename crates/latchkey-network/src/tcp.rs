//! TCP transport with newline-delimited framing.
//!
//! The stream is wrapped in a `Framed<TcpStream, LinesCodec>` and split: the
//! write half stays here for [`Transport::send`], the read half moves to a
//! reader task that forwards each line as [`TransportEvent::Text`] and
//! reports [`TransportEvent::Disconnected`] when the peer goes away.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, trace, warn};

use crate::transport::{Transport, TransportError, TransportEvent};

/// Longest inbound line accepted before the connection is dropped.
const MAX_LINE_LENGTH: usize = 8 * 1024;

type LineSink = SplitSink<Framed<TcpStream, LinesCodec>, String>;

/// Configuration for [`LineTransport`]
#[derive(Debug, Clone)]
pub struct LineTransportConfig {
    /// Peer address
    pub server_addr: SocketAddr,

    /// Timeout for connecting and for each write
    pub timeout: Duration,
}

impl LineTransportConfig {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            server_addr,
            timeout: Duration::from_millis(3000),
        }
    }

    /// Set the connect and write timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// TCP line transport.
pub struct LineTransport {
    config: LineTransportConfig,
    events: mpsc::UnboundedSender<TransportEvent>,
    sink: Option<LineSink>,
    reader: Option<JoinHandle<()>>,
    open: Arc<AtomicBool>,
}

impl LineTransport {
    pub fn new(config: LineTransportConfig, events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        debug!("Creating line transport for {}", config.server_addr);
        Self {
            config,
            events,
            sink: None,
            reader: None,
            open: Arc::new(AtomicBool::new(false)),
        }
    }

    fn teardown(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.sink = None;
    }
}

impl Transport for LineTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.teardown();
        info!("Connecting to remote at {}", self.config.server_addr);

        let stream = match tokio::time::timeout(
            self.config.timeout,
            TcpStream::connect(self.config.server_addr),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(TransportError::ConnectionTimeout(
                    self.config.timeout.as_millis() as u64,
                ));
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        let framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
        let (sink, mut lines) = framed.split();
        self.sink = Some(sink);
        self.open.store(true, Ordering::Release);
        let _ = self.events.send(TransportEvent::Connected);

        let events = self.events.clone();
        let open = Arc::clone(&self.open);
        self.reader = Some(tokio::spawn(async move {
            while let Some(item) = lines.next().await {
                match item {
                    Ok(line) => {
                        trace!(length = line.len(), "Line received");
                        if events.send(TransportEvent::Text(line)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Dropping connection after read error: {}", e);
                        break;
                    }
                }
            }
            if open.swap(false, Ordering::AcqRel) {
                info!("Remote closed the connection");
                let _ = events.send(TransportEvent::Disconnected);
            }
        }));

        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            let _ = sink.close().await;
        }
        self.teardown();
        if self.open.swap(false, Ordering::AcqRel) {
            info!("Disconnected from {}", self.config.server_addr);
            let _ = self.events.send(TransportEvent::Disconnected);
        }
    }

    async fn send(&mut self, line: &str) -> bool {
        if !self.is_open() {
            return false;
        }
        let Some(sink) = self.sink.as_mut() else {
            return false;
        };

        match tokio::time::timeout(self.config.timeout, sink.send(line.to_string())).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Failed to send line: {}", e);
                false
            }
            Err(_) => {
                warn!("Send timeout after {}ms", self.config.timeout.as_millis());
                false
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl Drop for LineTransport {
    fn drop(&mut self) {
        self.teardown();
    }
}
