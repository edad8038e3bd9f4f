use common::ErrorLocation;

use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum VersionError {
    #[error("Version Command Error: {message} {location}")]
    Command {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    #[error("Version Parse Error: {message} {location}")]
    Parse {
        message: String,
        location: ErrorLocation,
    },

    #[error("Base Mod Info Error: {path}: {message} {location}")]
    BaseModInfo {
        message: String,
        path: PathBuf,
        location: ErrorLocation,
    },
}
