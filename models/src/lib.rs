//! Domain models for the Factorio server manager.
//!
//! Pure data with validation only. Process control, file I/O and the RCON
//! wire live in `server-core`; the host binary wires both together.

pub mod error;
pub mod launch;
pub mod server_status;
pub mod version;

pub use common::ErrorLocation;
pub use error::model_error::ModelError;
pub use launch::{DEFAULT_BIND_IP, DEFAULT_GAME_PORT, LOAD_LATEST, LaunchOptions, SaveSelector};
pub use server_status::ServerStatus;
pub use server_status::builder::ServerStatusBuilder;
pub use version::{ADMIN_LIST_MIN_VERSION, NIL_VERSION, Version};

#[cfg(test)]
mod tests;
