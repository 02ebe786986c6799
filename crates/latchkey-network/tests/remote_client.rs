//! Integration tests for RemoteClient timers and dispatch.
//!
//! All tests run on a paused clock, so the 20s keep-alive and 5s reconnect
//! intervals are observed exactly without waiting.

use std::time::Duration;

use latchkey_network::mock::{MockTransport, MockTransportHandle};
use latchkey_network::{RemoteClient, RemoteClientConfig};
use latchkey_protocol::{RemoteCommand, RemoteCommandKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const KEEP_ALIVE: &str = "#connection=keep-alive";

struct Harness {
    link: MockTransportHandle,
    commands: mpsc::Receiver<RemoteCommand>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

fn start(refuse_first: bool) -> Harness {
    let (transport, link, events) = MockTransport::new();
    link.refuse_connections(refuse_first);
    let (commands_tx, commands) = mpsc::channel(8);

    let client = RemoteClient::new(RemoteClientConfig::default(), transport, events, commands_tx);
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(client.run(shutdown.clone()));

    Harness {
        link,
        commands,
        shutdown,
        task,
    }
}

fn keep_alives(link: &MockTransportHandle) -> usize {
    link.sent().iter().filter(|line| *line == KEEP_ALIVE).count()
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_on_connect_and_every_20s() {
    let harness = start(false);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(harness.link.is_open());
    assert_eq!(keep_alives(&harness.link), 1);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(keep_alives(&harness.link), 2);

    tokio::time::sleep(Duration::from_secs(40)).await;
    assert_eq!(keep_alives(&harness.link), 4);

    harness.shutdown.cancel();
    harness.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_no_keep_alive_while_disconnected() {
    let harness = start(true);

    tokio::time::sleep(Duration::from_secs(21)).await;
    assert!(harness.link.sent().is_empty());

    harness.shutdown.cancel();
    harness.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_initial_failure_retries_every_5s() {
    let harness = start(true);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(harness.link.connect_attempts(), 1);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(harness.link.connect_attempts(), 2);

    harness.link.refuse_connections(false);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(harness.link.connect_attempts(), 3);
    assert!(harness.link.is_open());

    // Connected: the reconnect ticker is gone.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(harness.link.connect_attempts(), 3);

    harness.shutdown.cancel();
    harness.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reconnects_after_peer_drop() {
    let harness = start(false);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(harness.link.connect_attempts(), 1);

    harness.link.drop_connection();
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(harness.link.connect_attempts(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(harness.link.connect_attempts(), 2);
    assert!(harness.link.is_open());

    harness.shutdown.cancel();
    harness.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_commands_forwarded_in_order() {
    let mut harness = start(false);
    tokio::time::sleep(Duration::from_millis(10)).await;

    harness.link.push_line("#broadcast=hello everyone");
    harness.link.push_line("#command=!security:unlock 7");
    harness.link.push_line("#response=ok");
    harness.link.push_line("  #command=!security:lock  ");

    let first = harness.commands.recv().await.unwrap();
    assert_eq!(first, RemoteCommand::unlock(["7"]));

    let second = harness.commands.recv().await.unwrap();
    assert_eq!(second.kind, RemoteCommandKind::Lock);

    harness.shutdown.cancel();
    harness.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_disconnects() {
    let harness = start(false);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(harness.link.is_open());

    harness.shutdown.cancel();
    harness.task.await.unwrap();
    assert!(!harness.link.is_open());
}
