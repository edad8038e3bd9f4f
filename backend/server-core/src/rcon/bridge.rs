//! Turns "RCON is up" log lines into connection attempts.
//!
//! Every trigger is its own task with a bounded lifetime (connect + auth
//! timeout). The returned `JoinHandle` is the completion channel: the
//! supervisor awaits it and counts the outcome. Nothing is retried here; a
//! later readiness line simply triggers another attempt.

use crate::error::rcon::RconError;
use crate::rcon::RconConnection;
use crate::state::{ServerState, StateCommand};

use common::{ErrorLocation, RedactedSecret};

use std::net::SocketAddr;
use std::panic::Location;
use std::time::Duration;

use log::{error, info};
use tokio::spawn as TokioSpawn;
use tokio::task::JoinHandle;
use tokio::time::timeout as TokioTimeout;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct RconBridge {
    address: SocketAddr,
    password: RedactedSecret,
    state: ServerState,
    connect_timeout: Duration,
}

impl RconBridge {
    pub fn new(address: SocketAddr, password: RedactedSecret, state: ServerState) -> Self {
        Self {
            address,
            password,
            state,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Start one connection attempt in the background.
    pub fn trigger(&self) -> JoinHandle<Result<(), RconError>> {
        let bridge = self.clone();
        TokioSpawn(async move {
            let result = bridge.connect().await;
            if let Err(ref e) = result {
                error!("RCON connection to {} failed: {e}", bridge.address);
            }
            result
        })
    }

    /// Connect, authenticate and hand the connection to the server state.
    pub async fn connect(&self) -> Result<(), RconError> {
        let connection =
            TokioTimeout(self.connect_timeout, RconConnection::connect(self.address, &self.password))
                .await
                .map_err(|_| RconError::Timeout {
                    message: format!(
                        "No RCON session at {} within {:?}",
                        self.address, self.connect_timeout
                    ),
                    location: ErrorLocation::from(Location::caller()),
                })??;

        self.state
            .update(StateCommand::SetRcon(connection))
            .await
            .map_err(|e| RconError::Handoff {
                message: e.to_string(),
                location: ErrorLocation::from(Location::caller()),
            })?;

        info!("RCON connected at {}", self.address);
        Ok(())
    }
}
