//! One-time startup of the manager.
//!
//! [`initialize`] does everything that must happen exactly once per host
//! process: create the config dir, detect versions, load settings and the
//! admin list, and optionally autostart the server. It hands back a
//! [`Manager`] that owns the state and supervisor.

use crate::config::{ManagerConfig, settings};
use crate::error::CoreError;
use crate::error::config::ConfigError;
use crate::error::state::StateError;
use crate::state::{ServerState, ServerVersions};
use crate::supervisor::ServerSupervisor;
use crate::version::{detect_binary_version, read_base_mod_version};

use common::ErrorLocation;
use models::LaunchOptions;

use std::fs;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{error, info, warn};
use tokio::spawn as TokioSpawn;
use tokio::task::JoinHandle;

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Handle to everything [`initialize`] assembled.
pub struct Manager {
    config: Arc<ManagerConfig>,
    state: ServerState,
    supervisor: ServerSupervisor,
    autostarted: AtomicBool,
}

/// Assemble the manager. May only succeed once per process.
///
/// Startup failures are returned and release the guard, so the host may fix
/// its configuration and call again.
///
/// # Errors
///
/// * [`StateError::AlreadyInitialized`] - A previous call succeeded
/// * Anything [`Manager::build`] returns
pub async fn initialize(config: ManagerConfig) -> Result<Arc<Manager>, CoreError> {
    if INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(StateError::AlreadyInitialized {
            message: "Manager is already initialized".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
        .into());
    }

    let manager = match Manager::build(config).await {
        Ok(manager) => Arc::new(manager),
        Err(e) => {
            INITIALIZED.store(false, Ordering::SeqCst);
            return Err(e);
        }
    };

    if manager.config.autostart {
        manager.autostart().await?;
    }

    Ok(manager)
}

impl Manager {
    /// Build a manager without the process-wide guard.
    ///
    /// [`initialize`] is the entry point for hosts; this exists for callers
    /// that manage the lifetime themselves.
    pub async fn build(config: ManagerConfig) -> Result<Self, CoreError> {
        config.validate()?;

        let config_dir = config.config_dir();
        fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DirectoryError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.clone(),
            source: e,
        })?;

        let binary = detect_binary_version(&config).await?;
        let base_mod = read_base_mod_version(&config.base_mod_info_path())?;
        let settings = settings::load_with_admins(&config, &binary)?;

        if !binary.supports_admin_list() {
            info!("Factorio {binary} predates admin lists, skipping admin list");
        }

        let config = Arc::new(config);
        let state = ServerState::new(
            ServerVersions { binary, base_mod },
            LaunchOptions::default(),
            settings,
        );
        let supervisor = ServerSupervisor::new(Arc::clone(&config), state.clone());

        info!(
            "Manager ready: Factorio {binary}, base mod {base_mod}, config dir {}",
            config_dir.display()
        );

        Ok(Self {
            config,
            state,
            supervisor,
            autostarted: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    pub fn supervisor(&self) -> &ServerSupervisor {
        &self.supervisor
    }

    /// Start the server with boot defaults, in the background.
    ///
    /// Unset bind address and port get defaults and the latest save is
    /// loaded. Runs at most once per manager; later calls return `None`.
    pub async fn autostart(&self) -> Result<Option<JoinHandle<()>>, CoreError> {
        if self.autostarted.swap(true, Ordering::SeqCst) {
            warn!("Autostart already performed, ignoring");
            return Ok(None);
        }

        let launch = self.state.launch_options().await.with_autostart_defaults();
        info!(
            "Autostarting Factorio server on {}:{} ({})",
            launch.bind_ip.as_deref().unwrap_or_default(),
            launch.port.unwrap_or_default(),
            launch.savefile.as_str()
        );
        self.state.update_launch(launch).await?;

        let supervisor = self.supervisor.clone();
        Ok(Some(TokioSpawn(async move {
            match supervisor.run().await {
                Ok(report) => info!("Autostarted Factorio server finished: {report:?}"),
                Err(e) => error!("Autostarted Factorio server failed: {e}"),
            }
        })))
    }

    /// Re-read settings and the admin list from disk into the state.
    pub async fn reload_settings(&self) -> Result<(), CoreError> {
        let previous = self.state.settings().await;
        let reloaded =
            settings::reload(&self.config, &self.state.versions().binary, &previous)?;
        self.state.update_settings(reloaded).await?;
        info!("Server settings reloaded");
        Ok(())
    }
}
