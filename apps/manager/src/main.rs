use factorio_manager::commands::server::{server_status, stop_server};
use factorio_manager::error::ManagerError;
use factorio_manager::logger::initialize as LoggerInitialize;

use server_core::config::{ManagerConfig, default_config_path};
use server_core::initialize as ManagerInitialize;
use server_core::state::ServerEvent;

use common::ErrorLocation;

use std::env;
use std::fs::create_dir_all;
use std::panic::Location;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use log::{error, info, warn};
use tokio::signal::ctrl_c;
use tokio::time::timeout;

/// Points at the manager's TOML config; defaults to the platform config dir.
const ENV_CONFIG_FILE: &str = "FSM_CONFIG_FILE";

/// Directory for the manager log; defaults to the config file's directory.
const ENV_LOG_DIR: &str = "FSM_LOG_DIR";

const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // The logger may not be up yet.
            eprintln!("{e}");
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), ManagerError> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let config_path = env::var(ENV_CONFIG_FILE)
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_config_path());

    let log_dir = env::var(ENV_LOG_DIR).map(PathBuf::from).unwrap_or_else(|_| {
        config_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    });

    create_dir_all(&log_dir).map_err(|e| ManagerError::Manager {
        message: format!("Failed to create log directory {}: {e}", log_dir.display()),
        location: ErrorLocation::from(Location::caller()),
    })?;

    LoggerInitialize(&log_dir)?;

    info!("Factorio server manager starting");
    info!("Config file: {}", config_path.display());
    info!("Log directory: {}", log_dir.display());

    let config = ManagerConfig::load_with_env(&config_path).map_err(|e| ManagerError::Core {
        message: e.to_string(),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let manager = ManagerInitialize(config)
        .await
        .map_err(|e| ManagerError::Core {
            message: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

    if !manager.config().autostart {
        info!("Autostart disabled; waiting for a start request");
    }

    match server_status(&manager).await {
        Ok(status) => info!(
            "Factorio {} (base mod {}) ready, running: {}",
            status.version, status.base_mod_version, status.running
        ),
        Err(e) => warn!("Failed to read server status: {e}"),
    }

    ctrl_c().await.map_err(|e| ManagerError::Manager {
        message: format!("Failed to listen for shutdown signal: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    info!("Shutdown requested");

    let mut events = manager.state().subscribe();
    match stop_server(&manager).await {
        Ok(()) => {
            // Let the run finish its bookkeeping before the runtime goes away.
            let stopped = timeout(SHUTDOWN_GRACE, async {
                while let Ok(event) = events.recv().await {
                    if matches!(event, ServerEvent::Stopped { .. }) {
                        break;
                    }
                }
            })
            .await;
            if stopped.is_err() {
                warn!("Factorio server run did not finish within {SHUTDOWN_GRACE:?}");
            }
            info!("Factorio server stopped");
        }
        Err(ManagerError::NotRunning { .. }) => {}
        Err(e) => warn!("{e}"),
    }

    info!("Factorio server manager exiting");
    Ok(())
}
