//! The game's `server-settings.json` and the optional admin list.
//!
//! Settings are an opaque JSON object: the manager edits a few keys and must
//! round-trip everything else untouched. The admin list is a JSON array that
//! only servers newer than 0.17.0 understand; it is injected into the
//! settings under [`ADMINS_KEY`].

use crate::config::ManagerConfig;
use crate::error::settings::SettingsError;

use common::ErrorLocation;
use models::Version;

use std::fs;
use std::panic::Location;
use std::path::Path;

use log::{info, warn};
use serde_json::{Map, Value};

/// Reserved settings key holding the decoded admin list.
pub const ADMINS_KEY: &str = "admins";

const EMPTY_ADMIN_LIST: &str = "[]";

pub type SettingsDocument = Map<String, Value>;

/// Load `config_dir/settings_file_name`, bootstrapping it from `template_path`
/// when it does not exist yet.
///
/// # Errors
///
/// Any I/O failure on the template or target, and any JSON decode failure,
/// is returned; startup treats all of them as fatal.
pub fn load(
    config_dir: &Path,
    settings_file_name: &str,
    template_path: &Path,
) -> Result<SettingsDocument, SettingsError> {
    let settings_path = config_dir.join(settings_file_name);

    if !settings_path.exists() {
        info!(
            "Server settings at {} not found, copying example server settings from {}",
            settings_path.display(),
            template_path.display()
        );

        fs::copy(template_path, &settings_path).map_err(|e| SettingsError::Read {
            location: ErrorLocation::from(Location::caller()),
            path: template_path.to_path_buf(),
            source: e,
        })?;
    }

    let contents = fs::read_to_string(&settings_path).map_err(|e| SettingsError::Read {
        location: ErrorLocation::from(Location::caller()),
        path: settings_path.clone(),
        source: e,
    })?;

    let settings: SettingsDocument =
        serde_json::from_str(&contents).map_err(|e| SettingsError::Decode {
            location: ErrorLocation::from(Location::caller()),
            path: settings_path.clone(),
            reason: e.to_string(),
        })?;

    info!("Loaded Factorio settings from {}", settings_path.display());
    Ok(settings)
}

/// Read the admin list at `path`, creating it as `[]` when absent.
pub fn load_admin_list(path: &Path) -> Result<Value, SettingsError> {
    if !path.exists() {
        info!("Admin list at {} not found, creating an empty one", path.display());

        fs::write(path, EMPTY_ADMIN_LIST).map_err(|e| SettingsError::Write {
            location: ErrorLocation::from(Location::caller()),
            path: path.to_path_buf(),
            source: e,
        })?;

        return Ok(Value::Array(Vec::new()));
    }

    let contents = fs::read_to_string(path).map_err(|e| SettingsError::Read {
        location: ErrorLocation::from(Location::caller()),
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&contents).map_err(|e| SettingsError::Decode {
        location: ErrorLocation::from(Location::caller()),
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Put the admin list under [`ADMINS_KEY`], replacing any previous value.
pub fn apply_admin_list(settings: &mut SettingsDocument, admins: Value) {
    settings.insert(ADMINS_KEY.to_string(), admins);
}

/// Settings plus, when `version` supports it, the admin list.
///
/// Startup path: every failure is returned.
pub fn load_with_admins(
    config: &ManagerConfig,
    version: &Version,
) -> Result<SettingsDocument, SettingsError> {
    let mut settings = load(
        &config.config_dir(),
        &config.settings_file,
        &config.settings_template_path(),
    )?;

    if version.supports_admin_list() {
        let admins = load_admin_list(&config.admin_list_path())?;
        apply_admin_list(&mut settings, admins);
    }

    Ok(settings)
}

/// Re-read settings from disk at runtime.
///
/// Unlike [`load_with_admins`], a broken admin list does not fail the
/// reload: the error is logged and the admins from `previous` are kept.
pub fn reload(
    config: &ManagerConfig,
    version: &Version,
    previous: &SettingsDocument,
) -> Result<SettingsDocument, SettingsError> {
    let mut settings = load(
        &config.config_dir(),
        &config.settings_file,
        &config.settings_template_path(),
    )?;

    if version.supports_admin_list() {
        match load_admin_list(&config.admin_list_path()) {
            Ok(admins) => apply_admin_list(&mut settings, admins),
            Err(e) => {
                warn!("Failed to reload admin list, keeping the previous one: {e}");
                if let Some(admins) = previous.get(ADMINS_KEY) {
                    apply_admin_list(&mut settings, admins.clone());
                }
            }
        }
    }

    Ok(settings)
}

/// Write `settings` to `path` as pretty-printed (two-space) JSON.
///
/// Writes a sibling temp file and renames it over the target so the game
/// never reads a half-written file.
pub fn persist(settings: &SettingsDocument, path: &Path) -> Result<(), SettingsError> {
    let json = serde_json::to_string_pretty(settings).map_err(|e| SettingsError::Encode {
        location: ErrorLocation::from(Location::caller()),
        reason: e.to_string(),
    })?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!("{file_name}.tmp"));

    fs::write(&temp_path, json).map_err(|e| SettingsError::Write {
        location: ErrorLocation::from(Location::caller()),
        path: temp_path.clone(),
        source: e,
    })?;

    fs::rename(&temp_path, path).map_err(|e| {
        warn!("Failed to move {} into place", temp_path.display());
        SettingsError::Write {
            location: ErrorLocation::from(Location::caller()),
            path: path.to_path_buf(),
            source: e,
        }
    })?;

    info!("Server settings written to {}", path.display());
    Ok(())
}
