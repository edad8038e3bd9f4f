//! Run the game server as a child process.
//!
//! `Idle -> Starting -> Running -> Exited`, then back to idle. One run at a
//! time; nothing restarts the server automatically.
//!
//! A run persists settings, builds the command line, spawns the process with
//! all three streams piped and attaches one [`LogStreamProcessor`] per output
//! stream. Matched lines flow to a dispatcher task that calls the error hook
//! and triggers RCON connection attempts, awaiting each attempt so the
//! outcome ends up in the [`RunReport`]. The server is marked stopped as
//! soon as the process is reaped, before any of that is collected.

pub mod command;
pub mod log_stream;
pub mod process;
pub mod rules;

pub use command::{LaunchCommand, build_launch_command};
pub use log_stream::{LogStreamProcessor, StreamKind};
pub use rules::{
    DEFAULT_RULES, ErrorClassifier, LineAction, LineEvent, LineRule, LogLine, LogOnlyClassifier,
};

use crate::config::{ManagerConfig, settings};
use crate::error::supervisor::SupervisorError;
use crate::rcon::RconBridge;
use crate::state::{ServerState, StateCommand};
use process::terminate_pid;

use common::ErrorLocation;

use std::io::Error as IoError;
use std::panic::Location;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::process::ChildStdin;
use tokio::spawn as TokioSpawn;
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, spawn_blocking};

/// Outcome of a run that ended with a zero exit status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub exit_code: Option<i32>,
    /// Readiness lines seen, one connection attempt each.
    pub rcon_attempts: usize,
    pub rcon_failures: usize,
}

/// The live process, owned by the supervisor while it runs.
struct ProcessHandle {
    pid: u32,
    /// Held open for the lifetime of the process; dropped on exit.
    _stdin: ChildStdin,
}

#[derive(Debug, Default, Clone, Copy)]
struct RconTally {
    attempts: usize,
    failures: usize,
}

#[derive(Clone)]
pub struct ServerSupervisor {
    config: Arc<ManagerConfig>,
    state: ServerState,
    bridge: RconBridge,
    rules: &'static [LineRule],
    classifier: Arc<dyn ErrorClassifier>,
    process: Arc<Mutex<Option<ProcessHandle>>>,
    run_lock: Arc<Mutex<()>>,
}

impl ServerSupervisor {
    pub fn new(config: Arc<ManagerConfig>, state: ServerState) -> Self {
        let bridge = RconBridge::new(
            config.rcon_address(),
            config.rcon_password.clone(),
            state.clone(),
        );
        Self {
            config,
            state,
            bridge,
            rules: DEFAULT_RULES,
            classifier: Arc::new(LogOnlyClassifier),
            process: Arc::new(Mutex::new(None)),
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_rules(mut self, rules: &'static [LineRule]) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_rcon_timeout(mut self, timeout: Duration) -> Self {
        self.bridge = self.bridge.with_connect_timeout(timeout);
        self
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// The command line the next start would use.
    pub async fn launch_command(&self) -> Result<LaunchCommand, SupervisorError> {
        let launch = self.state.launch_options().await;
        build_launch_command(&self.config, &launch, &self.state.versions().binary)
    }

    /// Start the server and block until it exits.
    ///
    /// # Errors
    ///
    /// * [`SupervisorError::AlreadyRunning`] - Another run is in progress
    /// * [`SupervisorError::Validation`] - Bind address or port is unset
    /// * [`SupervisorError::Spawn`] / [`SupervisorError::Pipe`] - Start failed; state stays idle
    /// * [`SupervisorError::Exit`] / [`SupervisorError::Wait`] - The process ended badly
    pub async fn run(&self) -> Result<RunReport, SupervisorError> {
        let _run_guard = self
            .run_lock
            .try_lock()
            .map_err(|_| SupervisorError::AlreadyRunning {
                message: format!(
                    "Factorio server is already running (PID: {:?})",
                    self.state.pid()
                ),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let settings_path = self.config.settings_path();
        let settings = self.state.settings().await;
        if let Err(e) = settings::persist(&settings, &settings_path) {
            warn!("Failed to persist server settings, starting anyway: {e}");
        }

        let command = self.launch_command().await?;
        info!("Starting Factorio server: {}", command.display_masked());

        let mut child = command.to_command().spawn().map_err(|e| {
            error!("Failed to start Factorio server: {e}");
            SupervisorError::Spawn {
                message: format!("Failed to spawn {}: {e}", command.program().display()),
                location: ErrorLocation::from(Location::caller()),
                source: Box::new(e),
            }
        })?;

        let pipes = (child.stdout.take(), child.stderr.take(), child.stdin.take());
        let (Some(stdout), Some(stderr), Some(stdin)) = pipes else {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(SupervisorError::Pipe {
                message: "Failed to capture Factorio server stdio".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        let Some(pid) = child.id() else {
            let _ = child.wait().await;
            return Err(SupervisorError::Spawn {
                message: "Factorio server exited before reporting a PID".to_string(),
                location: ErrorLocation::from(Location::caller()),
                source: Box::new(IoError::other("missing pid")),
            });
        };

        // The pipes exist from spawn onward, so nothing written before the
        // processors attach is lost.
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let log_path = self.config.console_log_path();
        let stdout_task = LogStreamProcessor::new(
            StreamKind::Stdout,
            &log_path,
            self.rules,
            events_tx.clone(),
        )
        .spawn(stdout);
        let stderr_task =
            LogStreamProcessor::new(StreamKind::Stderr, &log_path, self.rules, events_tx)
                .spawn(stderr);
        let dispatcher = TokioSpawn(dispatch_line_events(
            events_rx,
            self.bridge.clone(),
            Arc::clone(&self.classifier),
        ));

        *self.process.lock().await = Some(ProcessHandle { pid, _stdin: stdin });
        self.state.mark_started(pid);

        let waited = child.wait().await;

        // Drops stdin.
        self.process.lock().await.take();
        self.state
            .mark_stopped(matches!(&waited, Ok(status) if status.success()));

        // Inherited pipes can stay open past the exit, and RCON attempts may
        // still be pending.
        join_stream(StreamKind::Stdout, stdout_task).await;
        join_stream(StreamKind::Stderr, stderr_task).await;
        let tally = dispatcher.await.unwrap_or_else(|e| {
            error!("Line dispatcher task failed: {e}");
            RconTally::default()
        });

        if let Err(e) = self.state.update(StateCommand::ClearRcon).await {
            warn!("Failed to clear RCON connection: {e}");
        }

        self.finish(waited, tally)
    }

    fn finish(
        &self,
        waited: Result<ExitStatus, IoError>,
        tally: RconTally,
    ) -> Result<RunReport, SupervisorError> {
        let status = match waited {
            Ok(status) => status,
            Err(e) => {
                error!("Failed to wait for Factorio server: {e}");
                return Err(SupervisorError::Wait {
                    message: format!("Failed to wait for Factorio server: {e}"),
                    location: ErrorLocation::from(Location::caller()),
                    source: Box::new(e),
                });
            }
        };

        info!(
            "Factorio server exited with {status} (RCON attempts: {}, failures: {})",
            tally.attempts, tally.failures
        );

        if !status.success() {
            return Err(SupervisorError::Exit {
                message: format!("Factorio server exited with {status}"),
                code: status.code(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(RunReport {
            exit_code: status.code(),
            rcon_attempts: tally.attempts,
            rcon_failures: tally.failures,
        })
    }

    /// Terminate the running server.
    ///
    /// The process closing its pipes ends both stream scans, and the pending
    /// [`run`](Self::run) returns.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        let pid = self
            .process
            .lock()
            .await
            .as_ref()
            .map(|handle| handle.pid)
            .ok_or_else(|| SupervisorError::NotRunning {
                message: "Factorio server is not running".to_string(),
                location: ErrorLocation::from(Location::caller()),
            })?;

        info!("Stopping Factorio server (PID: {pid})");

        let terminated =
            spawn_blocking(move || terminate_pid(pid))
                .await
                .map_err(|e| SupervisorError::Stop {
                    message: format!("Termination task failed: {e}"),
                    location: ErrorLocation::from(Location::caller()),
                })?;

        if !terminated {
            return Err(SupervisorError::Stop {
                message: format!("Factorio server (PID: {pid}) did not terminate"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(())
    }
}

async fn join_stream(kind: StreamKind, task: JoinHandle<Result<u64, SupervisorError>>) {
    match task.await {
        Ok(Ok(lines)) => debug!("Factorio server {kind} scan finished ({lines} lines)"),
        Ok(Err(e)) => warn!("Factorio server {kind} scan ended with error: {e}"),
        Err(e) => error!("Factorio server {kind} scan task failed: {e}"),
    }
}

/// Route matched lines until both streams close, then collect every RCON
/// attempt's outcome.
async fn dispatch_line_events(
    mut events_rx: mpsc::UnboundedReceiver<LineEvent>,
    bridge: RconBridge,
    classifier: Arc<dyn ErrorClassifier>,
) -> RconTally {
    let mut attempts = Vec::new();

    while let Some(event) = events_rx.recv().await {
        match event {
            LineEvent::ServerError { stream, tokens } => {
                if let Err(e) = classifier.classify(&tokens) {
                    warn!("Error classification failed for {stream} line: {e}");
                }
            }
            LineEvent::RconReady { stream } => {
                info!(
                    "RCON interface ready ({stream}), connecting to {}",
                    bridge.address()
                );
                attempts.push(bridge.trigger());
            }
        }
    }

    let mut tally = RconTally {
        attempts: attempts.len(),
        failures: 0,
    };
    for attempt in attempts {
        match attempt.await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => tally.failures += 1,
            Err(e) => {
                error!("RCON connection task failed: {e}");
                tally.failures += 1;
            }
        }
    }
    tally
}
