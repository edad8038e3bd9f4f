pub mod config;
pub mod rcon;
pub mod settings;
pub mod state;
pub mod supervisor;
pub mod version;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Settings(#[from] settings::SettingsError),

    #[error(transparent)]
    Version(#[from] version::VersionError),

    #[error(transparent)]
    Supervisor(#[from] supervisor::SupervisorError),

    #[error(transparent)]
    Rcon(#[from] rcon::RconError),

    #[error(transparent)]
    State(#[from] state::StateError),
}
