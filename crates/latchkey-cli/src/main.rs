//! `latchkey`: the access-point controller wired to mock devices, an
//! optional remote peer and a line-oriented operator console on stdin.

mod config;
mod console;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use latchkey_biometric::{AuthenticationGate, GateConfig};
use latchkey_controller::{ControlEvent, ControlHandle, Controller, ControllerConfig, VirtualDisplay};
use latchkey_hardware::mock::{MockRelay, MockSensor, MockSensorHandle};
use latchkey_network::{LineTransport, LineTransportConfig, RemoteClient, RemoteClientConfig};
use latchkey_storage::{Database, DatabaseConfig, SettingsStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{config_path, load_settings};
use crate::console::{ConsoleCommand, HELP};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so console output stays readable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let path = config_path();
    let settings = load_settings(&path)?;
    info!(
        config = %path.display(),
        database = %settings.database_path,
        remote = ?settings.remote_addr,
        "Starting latchkey {}",
        latchkey_core::VERSION
    );

    let database_path = settings.database_path.clone();
    let db = Database::open(DatabaseConfig::new(&settings.database_path))
        .await
        .map_err(|error| {
            error!(%database_path, %error, "failed to open settings database");
            error
        })?;
    let store = SettingsStore::load(db)
        .await
        .context("failed to load settings")?;

    let (sensor, finger) = MockSensor::new();
    let (relay, _strike) = MockRelay::new();
    let gate = Arc::new(AuthenticationGate::new(sensor.into(), GateConfig::default()));
    let display = Arc::new(VirtualDisplay::new());

    let controller_config = ControllerConfig::default()
        .open_cycle_seconds(settings.open_cycle_seconds)
        .confirmation_timeout(settings.confirmation_timeout());
    let (controller, handle) =
        Controller::new(controller_config, gate, relay.into(), store, display.clone());
    let controller_task = tokio::spawn(controller.run());

    let shutdown = CancellationToken::new();
    let remote_tasks = settings
        .remote_addr
        .map(|addr| spawn_remote(addr, handle.clone(), shutdown.clone()));

    let console = Console {
        handle: handle.clone(),
        display,
        finger,
    };
    println!("{}", HELP);

    let outcome = tokio::select! {
        result = console.run() => result,
        result = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            result.context("failed to listen for ctrl-c")
        }
    };

    info!("Shutting down");
    if let Err(e) = handle.shutdown().await {
        warn!("Controller already stopped: {}", e);
    }
    shutdown.cancel();
    if let Some((client, bridge)) = remote_tasks {
        let _ = client.await;
        let _ = bridge.await;
    }
    drop(handle);
    let _ = controller_task.await;

    outcome
}

/// Run the remote client and forward its commands into the controller.
fn spawn_remote(
    addr: SocketAddr,
    handle: ControlHandle,
    shutdown: CancellationToken,
) -> (JoinHandle<()>, JoinHandle<()>) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let transport = LineTransport::new(LineTransportConfig::new(addr), events_tx);
    let (commands_tx, mut commands_rx) = mpsc::channel(32);
    let client = RemoteClient::new(RemoteClientConfig::default(), transport, events_rx, commands_tx);

    let client_task = tokio::spawn(client.run(shutdown.clone()));
    let bridge_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                command = commands_rx.recv() => {
                    let Some(command) = command else { break };
                    if handle.remote(command).await.is_err() {
                        warn!("Controller stopped; dropping remote commands");
                        break;
                    }
                }
            }
        }
    });

    (client_task, bridge_task)
}

struct Console {
    handle: ControlHandle,
    display: Arc<VirtualDisplay>,
    finger: MockSensorHandle,
}

impl Console {
    async fn run(self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
            let command = match ConsoleCommand::parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    println!("{}", e);
                    continue;
                }
            };

            if command == ConsoleCommand::Quit {
                break;
            }
            if let Err(e) = self.execute(command).await {
                println!("{}", e);
                break;
            }
        }

        Ok(())
    }

    async fn execute(&self, command: ConsoleCommand) -> latchkey_core::Result<()> {
        match command {
            ConsoleCommand::Open => self.handle.open_door().await?,
            ConsoleCommand::System => self.handle.toggle_system_lock().await?,
            ConsoleCommand::Cancel => self.handle.cancel_scan().await?,
            ConsoleCommand::Settings => {
                // The verdict may need a scan, and the finger comes from this
                // same console, so wait for it elsewhere.
                let handle = self.handle.clone();
                tokio::spawn(async move {
                    match handle.request_settings_access().await {
                        Ok(true) => println!("settings open"),
                        Ok(false) => println!("settings denied"),
                        Err(e) => println!("{}", e),
                    }
                });
            }
            ConsoleCommand::CloseSettings => self.handle.send(ControlEvent::CloseSettings).await?,
            ConsoleCommand::ToggleManual => {
                self.handle.send(ControlEvent::ToggleManualUnlocks).await?
            }
            ConsoleCommand::Register => self.handle.send(ControlEvent::RegisterCredential).await?,
            ConsoleCommand::SetAdmin { id, admin } => {
                self.handle.send(ControlEvent::SetAdmin { id, admin }).await?
            }
            ConsoleCommand::Rename { id, nickname } => {
                self.handle.send(ControlEvent::Rename { id, nickname }).await?
            }
            ConsoleCommand::ResetEmergencyUses(id) => {
                self.handle
                    .send(ControlEvent::ResetEmergencyUses { id })
                    .await?
            }
            ConsoleCommand::Remove(id) => {
                self.handle.send(ControlEvent::RemoveCredential { id }).await?
            }
            ConsoleCommand::Finger(template) => self.finger.place_finger(template),
            ConsoleCommand::Lift => self.finger.lift_finger(),
            ConsoleCommand::Answer(confirmed) => {
                if !self.display.answer_confirmation(confirmed) {
                    println!("nothing to answer");
                }
            }
            ConsoleCommand::List => {
                let credentials = self.display.credentials();
                if credentials.is_empty() {
                    println!("no fingerprints enrolled");
                }
                for label in credentials {
                    println!("{}", label);
                }
            }
            ConsoleCommand::Status => {
                let snapshot = self.handle.snapshot().await?;
                println!(
                    "{} | failures: {} | relay: {:?} | settings: {}",
                    snapshot.state,
                    snapshot.consecutive_failures,
                    snapshot.relay,
                    if snapshot.settings_open { "open" } else { "closed" }
                );
                for line in self.display.render() {
                    println!("  {}", line);
                }
            }
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => {}
        }
        Ok(())
    }
}
