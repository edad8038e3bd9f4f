use common::ErrorLocation;

use models::ModelError;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum StateError {
    #[error("State Actor Error: {message} {location}")]
    Actor {
        message: String,
        location: ErrorLocation,
    },

    #[error("Already Initialized Error: {message} {location}")]
    AlreadyInitialized {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Snapshot(#[from] ModelError),
}
