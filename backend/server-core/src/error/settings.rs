use std::path::PathBuf;

use common::ErrorLocation;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings Read Error: {path}: {source} {location}")]
    Read {
        location: ErrorLocation,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings Write Error: {path}: {source} {location}")]
    Write {
        location: ErrorLocation,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings Decode Error: {path}: {reason} {location}")]
    Decode {
        location: ErrorLocation,
        path: PathBuf,
        reason: String,
    },

    #[error("Settings Encode Error: {reason} {location}")]
    Encode {
        location: ErrorLocation,
        reason: String,
    },
}
