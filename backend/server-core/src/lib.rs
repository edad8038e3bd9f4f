pub mod bootstrap;
pub mod config;
pub mod error;
pub mod rcon;
pub mod state;
pub mod supervisor;
pub mod version;

#[cfg(test)]
mod tests;

pub use bootstrap::{Manager, initialize};

pub const FACTORIO_BINARY: &str = "factorio";
pub const FACTORIO_ARCH_DIR: &str = "x64";
pub const FACTORIO_BINARY_RELATIVE_PATH: &str =
    const_format::concatcp!("bin/", FACTORIO_ARCH_DIR, "/", FACTORIO_BINARY);
pub const FACTORIO_DATA_DIR: &str = "data";
pub const SETTINGS_TEMPLATE_FILE: &str = "server-settings.example.json";
pub const BASE_MOD_INFO_RELATIVE_PATH: &str = const_format::concatcp!("base", "/", "info.json");
pub const CONSOLE_LOG_FILE: &str = "factorio-server-console.log";
pub const RCON_HOST: &str = "127.0.0.1";
