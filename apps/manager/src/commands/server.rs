//! Server control commands for the host.
//!
//! Thin wrappers over the core that log, convert errors to
//! [`ManagerError`], and never block the caller on a running server.

use crate::error::ManagerError;

use server_core::Manager;
use server_core::error::supervisor::SupervisorError;

use common::ErrorLocation;
use models::{LaunchOptions, ServerStatus};

use std::panic::Location;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::spawn as TokioSpawn;
use tokio::task::JoinHandle;

/// Start the game server in the background.
///
/// `launch`, when given, replaces the stored launch options first.
///
/// # Returns
///
/// * `Ok(JoinHandle)` - The run task; resolves when the server exits
/// * `Err(ManagerError)` - Already running, or the launch options could not be stored
pub async fn start_server(
    manager: &Arc<Manager>,
    launch: Option<LaunchOptions>,
) -> Result<JoinHandle<()>, ManagerError> {
    if manager.state().is_running() {
        warn!("Start requested while the server is running");
        return Err(ManagerError::Core {
            message: "Factorio server is already running".to_string(),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    if let Some(launch) = launch {
        debug!("Applying launch options: {launch:?}");
        manager
            .state()
            .update_launch(launch)
            .await
            .map_err(|e| ManagerError::Core {
                message: e.to_string(),
                location: ErrorLocation::from(Location::caller()),
            })?;
    }

    let supervisor = manager.supervisor().clone();
    Ok(TokioSpawn(async move {
        match supervisor.run().await {
            Ok(report) => info!(
                "Factorio server finished (exit code: {:?}, RCON attempts: {}, failures: {})",
                report.exit_code, report.rcon_attempts, report.rcon_failures
            ),
            Err(e) => error!("Factorio server run failed: {e}"),
        }
    }))
}

/// Stop the running game server.
///
/// # Returns
///
/// * `Ok(())` - The server process is gone
/// * `Err(ManagerError::NotRunning)` - Nothing to stop
/// * `Err(ManagerError::StopFailed)` - The process survived termination
pub async fn stop_server(manager: &Arc<Manager>) -> Result<(), ManagerError> {
    info!("Stop requested");

    manager.supervisor().stop().await.map_err(|e| match e {
        SupervisorError::NotRunning { message, .. } => ManagerError::NotRunning {
            message,
            location: ErrorLocation::from(Location::caller()),
        },
        other => {
            error!("Failed to stop Factorio server: {other}");
            ManagerError::StopFailed {
                message: other.to_string(),
                location: ErrorLocation::from(Location::caller()),
            }
        }
    })
}

/// Snapshot of the server for status readers.
pub async fn server_status(manager: &Arc<Manager>) -> Result<ServerStatus, ManagerError> {
    manager
        .state()
        .status()
        .await
        .map_err(|e| ManagerError::Core {
            message: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
}
