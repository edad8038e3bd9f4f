pub mod settings;

pub use settings::{ADMINS_KEY, SettingsDocument};

use crate::error::config::ConfigError;
use crate::{
    BASE_MOD_INFO_RELATIVE_PATH, CONSOLE_LOG_FILE, FACTORIO_BINARY_RELATIVE_PATH,
    FACTORIO_DATA_DIR, RCON_HOST, SETTINGS_TEMPLATE_FILE,
};

use common::{ErrorLocation, RedactedSecret};

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{info, warn};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

pub const CONFIG_FILE_NAME: &str = "manager.toml";
pub const CONFIG_DIR_NAME: &str = "factorio-server-manager";
const DEFAULT_FACTORIO_DIR: &str = "./factorio";
const DEFAULT_SETTINGS_FILE: &str = "server-settings.json";
const DEFAULT_ADMIN_FILE: &str = "server-adminlist.json";
const DEFAULT_RCON_PORT: u16 = 27015;

// ============================================
// ENVIRONMENT OVERRIDES
// ============================================

pub const ENV_FACTORIO_DIR: &str = "FSM_FACTORIO_DIR";
pub const ENV_FACTORIO_BINARY: &str = "FSM_FACTORIO_BINARY";
pub const ENV_CONFIG_DIR: &str = "FSM_CONFIG_DIR";
pub const ENV_SAVES_DIR: &str = "FSM_SAVES_DIR";
pub const ENV_SETTINGS_FILE: &str = "FSM_SETTINGS_FILE";
pub const ENV_ADMIN_FILE: &str = "FSM_ADMIN_FILE";
pub const ENV_CONSOLE_LOG: &str = "FSM_CONSOLE_LOG";
pub const ENV_RCON_PORT: &str = "FSM_RCON_PORT";
pub const ENV_RCON_PASSWORD: &str = "FSM_RCON_PASSWORD";
pub const ENV_GLIBC_CUSTOM: &str = "FSM_GLIBC_CUSTOM";
pub const ENV_GLIBC_LOCATION: &str = "FSM_GLIBC_LOCATION";
pub const ENV_GLIBC_LIB_LOCATION: &str = "FSM_GLIBC_LIB_LOCATION";
pub const ENV_AUTOSTART: &str = "FSM_AUTOSTART";

// ============================================
// CONFIG STRUCTS
// ============================================

/// Custom dynamic loader used to run the game binary against a bundled glibc.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeWrapper {
    /// The `ld.so` to execute.
    pub loader: PathBuf,
    /// Directory passed as `--library-path`.
    pub library_path: PathBuf,
}

/// Where the game lives and how the manager talks to it.
///
/// Path fields left unset resolve relative to `factorio_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    #[serde(default = "default_factorio_dir")]
    pub factorio_dir: PathBuf,
    #[serde(default)]
    pub factorio_binary: Option<PathBuf>,
    #[serde(default)]
    pub config_dir: Option<PathBuf>,
    #[serde(default)]
    pub saves_dir: Option<PathBuf>,
    #[serde(default = "default_settings_file")]
    pub settings_file: String,
    #[serde(default = "default_admin_file")]
    pub admin_file: String,
    #[serde(default)]
    pub console_log_file: Option<PathBuf>,
    #[serde(default = "default_rcon_port")]
    pub rcon_port: u16,
    #[serde(default, serialize_with = "serialize_secret")]
    pub rcon_password: RedactedSecret,
    #[serde(default)]
    pub glibc_custom: bool,
    #[serde(default)]
    pub glibc_location: Option<PathBuf>,
    #[serde(default)]
    pub glibc_lib_location: Option<PathBuf>,
    #[serde(default)]
    pub autostart: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            factorio_dir: default_factorio_dir(),
            factorio_binary: None,
            config_dir: None,
            saves_dir: None,
            settings_file: default_settings_file(),
            admin_file: default_admin_file(),
            console_log_file: None,
            rcon_port: default_rcon_port(),
            rcon_password: RedactedSecret::default(),
            glibc_custom: false,
            glibc_location: None,
            glibc_lib_location: None,
            autostart: false,
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_factorio_dir() -> PathBuf {
    PathBuf::from(DEFAULT_FACTORIO_DIR)
}
fn default_settings_file() -> String {
    DEFAULT_SETTINGS_FILE.to_string()
}
fn default_admin_file() -> String {
    DEFAULT_ADMIN_FILE.to_string()
}
fn default_rcon_port() -> u16 {
    DEFAULT_RCON_PORT
}

fn serialize_secret<S>(secret: &RedactedSecret, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(secret.expose())
}

/// `<platform config dir>/factorio-server-manager/manager.toml`, falling back
/// to the working directory when the platform has no config dir.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_FILE_NAME)
}

// ============================================
// IMPLEMENTATION
// ============================================

impl ManagerConfig {
    /// Load config from a TOML file.
    ///
    /// # Returns
    ///
    /// Returns defaults if the file is missing.
    /// Returns `Err(ConfigError)` if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("Config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            location: ErrorLocation::from(Location::caller()),
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: ManagerConfig = toml::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config TOML at {}: {}", path.display(), e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        info!("Config loaded from {}", path.display());
        Ok(config)
    }

    /// Load the file, apply `FSM_*` environment overrides, generate an RCON
    /// password when none is set, and validate.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides()?;
        config.ensure_rcon_password();
        config.validate()?;
        Ok(config)
    }

    /// Overlay `FSM_*` environment variables on top of the file values.
    #[track_caller]
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(dir) = env_path(ENV_FACTORIO_DIR) {
            self.factorio_dir = dir;
        }
        if let Some(binary) = env_path(ENV_FACTORIO_BINARY) {
            self.factorio_binary = Some(binary);
        }
        if let Some(dir) = env_path(ENV_CONFIG_DIR) {
            self.config_dir = Some(dir);
        }
        if let Some(dir) = env_path(ENV_SAVES_DIR) {
            self.saves_dir = Some(dir);
        }
        if let Some(file) = env_string(ENV_SETTINGS_FILE) {
            self.settings_file = file;
        }
        if let Some(file) = env_string(ENV_ADMIN_FILE) {
            self.admin_file = file;
        }
        if let Some(file) = env_path(ENV_CONSOLE_LOG) {
            self.console_log_file = Some(file);
        }
        if let Some(port) = env_parse::<u16>(ENV_RCON_PORT)? {
            self.rcon_port = port;
        }
        if let Some(password) = env_string(ENV_RCON_PASSWORD) {
            self.rcon_password = RedactedSecret::new(password);
        }
        if let Some(custom) = env_parse::<bool>(ENV_GLIBC_CUSTOM)? {
            self.glibc_custom = custom;
        }
        if let Some(location) = env_path(ENV_GLIBC_LOCATION) {
            self.glibc_location = Some(location);
        }
        if let Some(location) = env_path(ENV_GLIBC_LIB_LOCATION) {
            self.glibc_lib_location = Some(location);
        }
        if let Some(autostart) = env_parse::<bool>(ENV_AUTOSTART)? {
            self.autostart = autostart;
        }
        Ok(())
    }

    /// Generate a random RCON password if none is configured.
    ///
    /// The game server refuses to open RCON without a password.
    pub fn ensure_rcon_password(&mut self) {
        if self.rcon_password.is_empty() {
            info!("No RCON password configured, generating one");
            self.rcon_password = RedactedSecret::new(Uuid::new_v4().simple().to_string());
        }
    }

    /// Save config to `path` using atomic write.
    ///
    /// Uses temp file + rename so a crash never leaves a truncated file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| ConfigError::DirectoryError {
                location: ErrorLocation::from(Location::caller()),
                path: dir.to_path_buf(),
                source: e,
            })?;
        }

        let temp_path = path.with_extension("toml.tmp");

        let contents = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, contents).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: path.to_path_buf(),
            source: e,
        })?;

        info!("Config saved to {}", path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    #[track_caller]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.binary_path().as_os_str().is_empty() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "Factorio binary path cannot be empty".to_string(),
            });
        }

        if self.settings_file.is_empty() || self.admin_file.is_empty() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "Settings and admin-list file names cannot be empty".to_string(),
            });
        }

        if self.rcon_port == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "RCON port must be non-zero".to_string(),
            });
        }

        if self.glibc_custom && (self.glibc_location.is_none() || self.glibc_lib_location.is_none())
        {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Custom glibc requires both {ENV_GLIBC_LOCATION} and {ENV_GLIBC_LIB_LOCATION}"
                ),
            });
        }

        Ok(())
    }

    pub fn binary_path(&self) -> PathBuf {
        self.factorio_binary
            .clone()
            .unwrap_or_else(|| self.factorio_dir.join(FACTORIO_BINARY_RELATIVE_PATH))
    }

    pub fn config_dir(&self) -> PathBuf {
        self.config_dir
            .clone()
            .unwrap_or_else(|| self.factorio_dir.join("config"))
    }

    pub fn saves_dir(&self) -> PathBuf {
        self.saves_dir
            .clone()
            .unwrap_or_else(|| self.factorio_dir.join("saves"))
    }

    pub fn settings_path(&self) -> PathBuf {
        self.config_dir().join(&self.settings_file)
    }

    pub fn admin_list_path(&self) -> PathBuf {
        self.config_dir().join(&self.admin_file)
    }

    pub fn settings_template_path(&self) -> PathBuf {
        self.factorio_dir
            .join(FACTORIO_DATA_DIR)
            .join(SETTINGS_TEMPLATE_FILE)
    }

    pub fn base_mod_info_path(&self) -> PathBuf {
        self.factorio_dir
            .join(FACTORIO_DATA_DIR)
            .join(BASE_MOD_INFO_RELATIVE_PATH)
    }

    pub fn console_log_path(&self) -> PathBuf {
        self.console_log_file
            .clone()
            .unwrap_or_else(|| self.factorio_dir.join(CONSOLE_LOG_FILE))
    }

    pub fn rcon_address(&self) -> SocketAddr {
        let host = IpAddr::from_str(RCON_HOST).unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        SocketAddr::new(host, self.rcon_port)
    }

    /// The custom loader, when enabled and fully configured.
    pub fn runtime_wrapper(&self) -> Option<RuntimeWrapper> {
        if !self.glibc_custom {
            return None;
        }
        match (&self.glibc_location, &self.glibc_lib_location) {
            (Some(loader), Some(library_path)) => Some(RuntimeWrapper {
                loader: loader.clone(),
                library_path: library_path.clone(),
            }),
            _ => None,
        }
    }
}

fn env_string(variable: &str) -> Option<String> {
    env::var(variable).ok().filter(|v| !v.trim().is_empty())
}

fn env_path(variable: &str) -> Option<PathBuf> {
    env_string(variable).map(PathBuf::from)
}

#[track_caller]
fn env_parse<T>(variable: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(variable) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::EnvError {
                location: ErrorLocation::from(Location::caller()),
                variable: variable.to_string(),
                reason: format!("'{raw}': {e}"),
            }),
    }
}
