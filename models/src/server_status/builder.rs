use crate::error::model_error::ModelError;
use crate::{ErrorLocation, LaunchOptions, ServerStatus, Version};

use std::panic::Location;

/// Builder for validated [`ServerStatus`] snapshots.
#[derive(Debug, Default)]
pub struct ServerStatusBuilder {
    running: Option<bool>,
    pid: Option<u32>,
    launch: Option<LaunchOptions>,
    version: Option<Version>,
    base_mod_version: Option<Version>,
    rcon_connected: bool,
}

impl ServerStatusBuilder {
    pub fn with_running(mut self, running: bool) -> Self {
        self.running = Some(running);
        self
    }

    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    pub fn with_launch(mut self, launch: LaunchOptions) -> Self {
        self.launch = Some(launch);
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_base_mod_version(mut self, version: Version) -> Self {
        self.base_mod_version = Some(version);
        self
    }

    pub fn with_rcon_connected(mut self, connected: bool) -> Self {
        self.rcon_connected = connected;
        self
    }

    /// Build the snapshot.
    ///
    /// A running server must carry a non-zero PID; a stopped one must not
    /// carry any PID or RCON connection.
    #[track_caller]
    pub fn build(self) -> Result<ServerStatus, ModelError> {
        let running = self.running.ok_or_else(|| ModelError::Validation {
            message: String::from("Running flag is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let version = self.version.ok_or_else(|| ModelError::Validation {
            message: String::from("Server version is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let base_mod_version = self.base_mod_version.ok_or_else(|| ModelError::Validation {
            message: String::from("Base mod version is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if running {
            match self.pid {
                None => {
                    return Err(ModelError::Validation {
                        message: String::from("PID is required while running"),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
                Some(0) => {
                    return Err(ModelError::Validation {
                        message: String::from("PID must be non-zero"),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
                Some(_) => {}
            }
        } else if self.pid.is_some() {
            return Err(ModelError::Validation {
                message: String::from("Stopped server cannot have a PID"),
                location: ErrorLocation::from(Location::caller()),
            });
        } else if self.rcon_connected {
            return Err(ModelError::Validation {
                message: String::from("Stopped server cannot have an RCON connection"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let launch = self.launch.unwrap_or_default();

        Ok(ServerStatus {
            running,
            pid: self.pid,
            bind_ip: launch.bind_ip,
            port: launch.port,
            savefile: launch.savefile,
            version,
            base_mod_version,
            rcon_connected: self.rcon_connected,
        })
    }
}
