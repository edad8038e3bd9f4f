//! What the next launch of the game server should bind to and load.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Save selector value meaning "resume the most recent save".
pub const LOAD_LATEST: &str = "Load Latest";

/// Bind-all address substituted by autostart when none is configured.
pub const DEFAULT_BIND_IP: &str = "0.0.0.0";

/// Factorio's default UDP game port.
pub const DEFAULT_GAME_PORT: u16 = 34197;

/// Which save the server starts from. Exactly one of these ends up on the
/// command line: `--start-server-load-latest` or `--start-server <path>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SaveSelector {
    #[default]
    LoadLatest,
    /// File name relative to the saves directory.
    Named(String),
}

impl SaveSelector {
    pub fn as_str(&self) -> &str {
        match self {
            SaveSelector::LoadLatest => LOAD_LATEST,
            SaveSelector::Named(name) => name,
        }
    }
}

impl From<&str> for SaveSelector {
    fn from(value: &str) -> Self {
        if value == LOAD_LATEST || value.is_empty() {
            SaveSelector::LoadLatest
        } else {
            SaveSelector::Named(value.to_string())
        }
    }
}

impl From<String> for SaveSelector {
    fn from(value: String) -> Self {
        SaveSelector::from(value.as_str())
    }
}

impl Serialize for SaveSelector {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SaveSelector {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SaveSelector::from)
    }
}

/// Bind address, port and save for the next start.
///
/// Edited at runtime by the HTTP layer; read by the supervisor at each start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchOptions {
    #[serde(rename = "bindip", default)]
    pub bind_ip: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(rename = "savefile", default)]
    pub savefile: SaveSelector,
}

impl LaunchOptions {
    pub fn new(bind_ip: impl Into<String>, port: u16, savefile: impl Into<SaveSelector>) -> Self {
        Self {
            bind_ip: Some(bind_ip.into()),
            port: Some(port),
            savefile: savefile.into(),
        }
    }

    /// Boot-time defaults: bind-all, the default game port, latest save.
    ///
    /// Explicit bind address and port are kept; the save selector is always
    /// reset to [`SaveSelector::LoadLatest`].
    pub fn with_autostart_defaults(mut self) -> Self {
        if self.bind_ip.as_deref().is_none_or(str::is_empty) {
            self.bind_ip = Some(DEFAULT_BIND_IP.to_string());
        }
        if self.port.is_none_or(|p| p == 0) {
            self.port = Some(DEFAULT_GAME_PORT);
        }
        self.savefile = SaveSelector::LoadLatest;
        self
    }
}
