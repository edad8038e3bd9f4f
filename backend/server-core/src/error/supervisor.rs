use common::ErrorLocation;

use std::error::Error as StdError;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SupervisorError {
    #[error("Already Running Error: {message} {location}")]
    AlreadyRunning {
        message: String,
        location: ErrorLocation,
    },

    #[error("Not Running Error: {message} {location}")]
    NotRunning {
        message: String,
        location: ErrorLocation,
    },

    #[error("Validation Error: {message} {location}")]
    Validation {
        message: String,
        location: ErrorLocation,
    },

    #[error("Spawn Error: {message} {location}")]
    Spawn {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("Pipe Error: {message} {location}")]
    Pipe {
        message: String,
        location: ErrorLocation,
    },

    #[error("Stream Error: {message} {location}")]
    Stream {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("Wait Error: {message} {location}")]
    Wait {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("Exit Error: {message} {location}")]
    Exit {
        message: String,
        code: Option<i32>,
        location: ErrorLocation,
    },

    #[error("Stop Error: {message} {location}")]
    Stop {
        message: String,
        location: ErrorLocation,
    },

    #[error("Classification Error: {message} {location}")]
    Classification {
        message: String,
        location: ErrorLocation,
    },
}
