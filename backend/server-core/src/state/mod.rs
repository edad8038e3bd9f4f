//! Shared state of the supervised game server.
//!
//! # Architecture
//!
//! Uses the actor pattern for everything the outside world may edit:
//! - Launch options, settings and the RCON connection change only through
//!   [`StateCommand`]s processed sequentially by a dedicated task
//! - Each command is acknowledged once applied, so a caller that awaited
//!   [`ServerState::update`] observes its own write
//! - Reads clone a snapshot out of an `RwLock`
//!
//! The running flag and PID are different: only the supervisor writes them,
//! so they are plain atomics, and transitions are broadcast as
//! [`ServerEvent`]s for readers that want to follow along.

use crate::config::SettingsDocument;
use crate::error::state::StateError;
use crate::rcon::RconConnection;

use common::ErrorLocation;
use models::{LaunchOptions, ServerStatus, ServerStatusBuilder, Version};

use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use log::{debug, info, warn};
use tokio::sync::{Mutex, MutexGuard, RwLock, broadcast, mpsc, oneshot};

const COMMAND_CHANNEL_CAPACITY: usize = 100;
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Commands that mutate server state.
#[derive(Debug)]
pub enum StateCommand {
    /// Replace the launch options used by the next start.
    SetLaunch(LaunchOptions),

    /// Replace the settings document written before the next start.
    SetSettings(SettingsDocument),

    /// Store a freshly authenticated RCON connection.
    SetRcon(RconConnection),

    /// Drop the RCON connection (process exited).
    ClearRcon,
}

/// Lifecycle notifications published by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Started { pid: u32 },
    RconConnected,
    Stopped { success: bool },
}

/// Versions detected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerVersions {
    pub binary: Version,
    pub base_mod: Version,
}

struct StateRequest {
    command: StateCommand,
    applied: oneshot::Sender<()>,
}

/// Shared handle to the server state.
///
/// This type is `Clone`; all clones share the same underlying state.
#[derive(Clone)]
pub struct ServerState {
    command_tx: Arc<Mutex<Option<mpsc::Sender<StateRequest>>>>,
    actor_init: Arc<Mutex<bool>>,

    launch: Arc<RwLock<LaunchOptions>>,
    settings: Arc<RwLock<SettingsDocument>>,
    rcon: Arc<Mutex<Option<RconConnection>>>,

    running: Arc<AtomicBool>,
    pid: Arc<AtomicU32>,
    events: broadcast::Sender<ServerEvent>,

    versions: ServerVersions,
}

impl ServerState {
    /// Create a new state.
    ///
    /// The actor is spawned lazily on the first [`update`](Self::update).
    pub fn new(versions: ServerVersions, launch: LaunchOptions, settings: SettingsDocument) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            command_tx: Arc::new(Mutex::new(None)),
            actor_init: Arc::new(Mutex::new(false)),
            launch: Arc::new(RwLock::new(launch)),
            settings: Arc::new(RwLock::new(settings)),
            rcon: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            pid: Arc::new(AtomicU32::new(0)),
            events,
            versions,
        }
    }

    /// Send a command and wait until the actor has applied it.
    pub async fn update(&self, cmd: StateCommand) -> Result<(), StateError> {
        self.ensure_actor().await;

        let (applied_tx, applied_rx) = oneshot::channel();

        {
            let tx_guard = self.command_tx.lock().await;
            let tx = tx_guard.as_ref().ok_or_else(|| StateError::Actor {
                message: String::from("State actor not initialized"),
                location: ErrorLocation::from(Location::caller()),
            })?;

            tx.send(StateRequest {
                command: cmd,
                applied: applied_tx,
            })
            .await
            .map_err(|e| StateError::Actor {
                message: format!("State actor died: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;
        }

        applied_rx.await.map_err(|e| StateError::Actor {
            message: format!("State actor dropped command: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Replace the settings document; the next start persists it.
    pub async fn update_settings(&self, settings: SettingsDocument) -> Result<(), StateError> {
        self.update(StateCommand::SetSettings(settings)).await
    }

    pub async fn update_launch(&self, launch: LaunchOptions) -> Result<(), StateError> {
        self.update(StateCommand::SetLaunch(launch)).await
    }

    pub async fn launch_options(&self) -> LaunchOptions {
        self.launch.read().await.clone()
    }

    /// Snapshot of the settings document; the copy is what the next start persists.
    pub async fn settings(&self) -> SettingsDocument {
        self.settings.read().await.clone()
    }

    pub fn versions(&self) -> ServerVersions {
        self.versions
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn pid(&self) -> Option<u32> {
        match self.pid.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(pid),
        }
    }

    pub async fn rcon_connected(&self) -> bool {
        self.rcon.lock().await.is_some()
    }

    /// Exclusive access to the stored RCON connection, for command dispatch.
    pub async fn rcon(&self) -> MutexGuard<'_, Option<RconConnection>> {
        self.rcon.lock().await
    }

    /// Validated read-only snapshot for status readers.
    pub async fn status(&self) -> Result<ServerStatus, StateError> {
        // PID first: it is set before and cleared after the running flag.
        let pid = self.pid();
        let running = self.is_running() && pid.is_some();
        let status = ServerStatusBuilder::default()
            .with_running(running)
            .with_pid(if running { pid } else { None })
            .with_launch(self.launch_options().await)
            .with_version(self.versions.binary)
            .with_base_mod_version(self.versions.base_mod)
            .with_rcon_connected(running && self.rcon_connected().await)
            .build()?;
        Ok(status)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    pub(crate) fn mark_started(&self, pid: u32) {
        self.pid.store(pid, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        info!("Factorio server running (PID: {pid})");
        self.publish(ServerEvent::Started { pid });
    }

    pub(crate) fn mark_stopped(&self, success: bool) {
        self.running.store(false, Ordering::SeqCst);
        self.pid.store(0, Ordering::SeqCst);
        info!("Factorio server stopped (success: {success})");
        self.publish(ServerEvent::Stopped { success });
    }

    pub(crate) fn publish(&self, event: ServerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn ensure_actor(&self) {
        let mut init_guard = self.actor_init.lock().await;
        if !*init_guard {
            let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

            let mut tx_guard = self.command_tx.lock().await;
            *tx_guard = Some(tx);
            drop(tx_guard);

            tokio::spawn(state_actor(
                rx,
                Arc::clone(&self.launch),
                Arc::clone(&self.settings),
                Arc::clone(&self.rcon),
                self.events.clone(),
            ));
            *init_guard = true;
            info!("Server state actor spawned");
        }
    }
}

/// The state actor task.
///
/// Owns every mutation of launch options, settings and the RCON slot.
async fn state_actor(
    mut command_rx: mpsc::Receiver<StateRequest>,
    launch: Arc<RwLock<LaunchOptions>>,
    settings: Arc<RwLock<SettingsDocument>>,
    rcon: Arc<Mutex<Option<RconConnection>>>,
    events: broadcast::Sender<ServerEvent>,
) {
    info!("Server state actor started");

    while let Some(StateRequest { command, applied }) = command_rx.recv().await {
        match command {
            StateCommand::SetLaunch(new_launch) => {
                debug!("Updating launch options: {new_launch:?}");
                *launch.write().await = new_launch;
            }
            StateCommand::SetSettings(new_settings) => {
                debug!("Replacing settings document ({} keys)", new_settings.len());
                *settings.write().await = new_settings;
            }
            StateCommand::SetRcon(connection) => {
                let mut slot = rcon.lock().await;
                if let Some(ref existing) = *slot {
                    warn!(
                        "Replacing existing RCON connection to {} with a new one",
                        existing.address()
                    );
                } else {
                    info!("Storing RCON connection to {}", connection.address());
                }
                *slot = Some(connection);
                drop(slot);
                let _ = events.send(ServerEvent::RconConnected);
            }
            StateCommand::ClearRcon => {
                if rcon.lock().await.take().is_some() {
                    info!("RCON connection cleared");
                }
            }
        }

        // The caller may have given up waiting; the command still applied.
        let _ = applied.send(());
    }

    warn!("Server state actor stopped - this should not happen during normal operation");
}
