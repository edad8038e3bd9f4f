//! Remote console (RCON) connection to the running game server.
//!
//! Only opening and authenticating the connection lives here. Once open the
//! connection is handed to [`ServerState`](crate::state::ServerState), where
//! the command layer picks it up.

pub mod bridge;
pub mod packet;

pub use bridge::RconBridge;

use crate::error::rcon::RconError;
use packet::{AUTH_FAILED_ID, Packet, SERVERDATA_AUTH, SERVERDATA_AUTH_RESPONSE};

use common::{ErrorLocation, RedactedSecret};

use std::fmt;
use std::net::SocketAddr;
use std::panic::Location;

use log::{debug, trace};
use tokio::net::TcpStream;

const AUTH_REQUEST_ID: i32 = 1;

/// An authenticated RCON session.
pub struct RconConnection {
    stream: TcpStream,
    address: SocketAddr,
}

impl RconConnection {
    /// Open a TCP connection to `address` and authenticate with `password`.
    pub async fn connect(
        address: SocketAddr,
        password: &RedactedSecret,
    ) -> Result<Self, RconError> {
        debug!("Connecting to RCON at {address}");

        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| RconError::Connect {
                message: format!("Failed to connect to {address}: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let mut connection = Self { stream, address };
        connection.authenticate(password).await?;

        debug!("RCON authenticated at {address}");
        Ok(connection)
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// The underlying socket, for the command layer.
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    async fn authenticate(&mut self, password: &RedactedSecret) -> Result<(), RconError> {
        Packet::new(AUTH_REQUEST_ID, SERVERDATA_AUTH, password.expose())
            .write_to(&mut self.stream)
            .await?;

        // Servers may send an empty RESPONSE_VALUE before the auth response.
        loop {
            let response = Packet::read_from(&mut self.stream).await?;
            trace!(
                "RCON auth reply: id={} type={}",
                response.id, response.kind
            );

            if response.kind != SERVERDATA_AUTH_RESPONSE {
                continue;
            }

            if response.id == AUTH_FAILED_ID {
                return Err(RconError::Auth {
                    message: format!("RCON at {} rejected the password", self.address),
                    location: ErrorLocation::from(Location::caller()),
                });
            }

            if response.id != AUTH_REQUEST_ID {
                return Err(RconError::Protocol {
                    message: format!(
                        "Unexpected auth response id {} (expected {AUTH_REQUEST_ID})",
                        response.id
                    ),
                    location: ErrorLocation::from(Location::caller()),
                });
            }

            return Ok(());
        }
    }
}

impl fmt::Debug for RconConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RconConnection")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
