use common::ErrorLocation;

use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the manager binary and its commands.
///
/// Serializable so a control surface can hand them to clients as-is; the
/// location is kept for diagnosis.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ManagerError {
    /// Error from this binary (startup, logging, signals)
    #[error("Manager Error: {message} {location}")]
    Manager {
        message: String,
        location: ErrorLocation,
    },

    /// Error from server-core operations (config, versions, supervisor)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },

    /// No game server is currently running
    #[error("Not Running Error: {message} {location}")]
    NotRunning {
        message: String,
        location: ErrorLocation,
    },

    /// Game server failed to stop
    #[error("Stop Error: {message} {location}")]
    StopFailed {
        message: String,
        location: ErrorLocation,
    },
}
