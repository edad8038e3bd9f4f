use common::ErrorLocation;

use std::io::Error as IoError;
use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum RconError {
    #[error("RCON Connect Error: {message} {location}")]
    Connect {
        message: String,
        location: ErrorLocation,
    },

    #[error("RCON Auth Error: {message} {location}")]
    Auth {
        message: String,
        location: ErrorLocation,
    },

    #[error("RCON Protocol Error: {message} {location}")]
    Protocol {
        message: String,
        location: ErrorLocation,
    },

    #[error("RCON IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
    },

    #[error("RCON Timeout Error: {message} {location}")]
    Timeout {
        message: String,
        location: ErrorLocation,
    },

    #[error("RCON Handoff Error: {message} {location}")]
    Handoff {
        message: String,
        location: ErrorLocation,
    },
}

impl From<IoError> for RconError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        RconError::Io {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
