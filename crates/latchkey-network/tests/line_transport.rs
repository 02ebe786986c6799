//! Integration tests for LineTransport
//!
//! These tests run a real loopback TCP peer and verify framing, event
//! delivery and disconnect detection.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use latchkey_network::{LineTransport, LineTransportConfig, Transport, TransportEvent};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec};

/// Test connect, inbound lines, outbound lines, and peer close
#[tokio::test]
async fn test_full_lifecycle_with_peer() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let peer = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, LinesCodec::new());

        framed
            .send("#command=!security:unlock 4".to_string())
            .await
            .unwrap();
        let received = framed.next().await.unwrap().unwrap();
        assert_eq!(received, "#connection=keep-alive");
        // Dropping the framed stream closes the connection.
    });

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let mut transport = LineTransport::new(
        LineTransportConfig::new(addr).timeout(Duration::from_millis(1000)),
        events_tx,
    );
    assert!(!transport.is_open());

    transport.connect().await.unwrap();
    assert!(transport.is_open());
    assert_eq!(events.recv().await, Some(TransportEvent::Connected));

    assert_eq!(
        events.recv().await,
        Some(TransportEvent::Text("#command=!security:unlock 4".into()))
    );

    assert!(transport.send("#connection=keep-alive").await);
    peer.await.unwrap();

    assert_eq!(events.recv().await, Some(TransportEvent::Disconnected));
    assert!(!transport.is_open());
    assert!(!transport.send("too late").await);
}

/// Test that connecting to a closed port fails without emitting events
#[tokio::test]
async fn test_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let mut transport = LineTransport::new(LineTransportConfig::new(addr), events_tx);

    assert!(transport.connect().await.is_err());
    assert!(!transport.is_open());
    assert!(events.try_recv().is_err());
}

/// Test local disconnect emits exactly one Disconnected
#[tokio::test]
async fn test_local_disconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, LinesCodec::new());
        while framed.next().await.is_some() {}
    });

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let mut transport = LineTransport::new(LineTransportConfig::new(addr), events_tx);
    transport.connect().await.unwrap();
    assert_eq!(events.recv().await, Some(TransportEvent::Connected));

    transport.disconnect().await;
    assert_eq!(events.recv().await, Some(TransportEvent::Disconnected));

    transport.disconnect().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(events.try_recv().is_err());
}
