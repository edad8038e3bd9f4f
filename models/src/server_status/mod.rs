//! Read-only snapshot of the supervised server, handed to concurrent readers.

pub mod builder;

use crate::{SaveSelector, Version};

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub running: bool,
    pub pid: Option<u32>,
    #[serde(rename = "bindip")]
    pub bind_ip: Option<String>,
    pub port: Option<u16>,
    #[serde(rename = "savefile")]
    pub savefile: SaveSelector,
    #[serde(rename = "fac_version")]
    pub version: Version,
    pub base_mod_version: Version,
    pub rcon_connected: bool,
}
