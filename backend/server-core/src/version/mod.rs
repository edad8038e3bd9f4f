//! Detect the installed game version and the base content version.
//!
//! The binary reports itself with `--version` (`Version: 1.1.110 (build ...)`),
//! and the base content ships `data/base/info.json` with a `version` field.

use crate::config::ManagerConfig;
use crate::error::version::VersionError;

use common::ErrorLocation;
use models::Version;

use std::panic::Location;
use std::path::Path;
use std::process::Stdio;
use std::sync::OnceLock;

use log::{debug, info};
use regex::Regex;
use serde::Deserialize;
use tokio::process::Command as TokioCommand;

const VERSION_FLAG: &str = "--version";
const LIBRARY_PATH_FLAG: &str = "--library-path";
const VERSION_OUTPUT_PATTERN: &str = r"Version.*?(?P<version>\d+(?:\.\d+){0,3})";
const VERSION_CAPTURE: &str = "version";

static VERSION_OUTPUT_REGEX: OnceLock<Regex> = OnceLock::new();

pub(crate) fn get_version_output_regex() -> &'static Regex {
    VERSION_OUTPUT_REGEX
        .get_or_init(|| Regex::new(VERSION_OUTPUT_PATTERN).expect("valid regex pattern"))
}

#[derive(Debug, Deserialize)]
struct BaseModInfo {
    version: String,
}

/// `<binary> --version`, or the same through the custom loader.
pub(crate) fn build_version_command(config: &ManagerConfig) -> TokioCommand {
    let binary = config.binary_path();

    let mut cmd = match config.runtime_wrapper() {
        Some(wrapper) => {
            let mut cmd = TokioCommand::new(&wrapper.loader);
            cmd.arg(LIBRARY_PATH_FLAG)
                .arg(&wrapper.library_path)
                .arg(&binary);
            cmd
        }
        None => TokioCommand::new(&binary),
    };

    cmd.arg(VERSION_FLAG)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

/// Extract the version that follows the word `Version` in `output`.
#[track_caller]
pub fn parse_version_output(output: &str) -> Result<Version, VersionError> {
    let captured = get_version_output_regex()
        .captures(output)
        .and_then(|cap| cap.name(VERSION_CAPTURE))
        .ok_or_else(|| VersionError::Parse {
            message: format!("No version found in output: {}", output.trim()),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Version::parse(captured.as_str()).map_err(|e| VersionError::Parse {
        message: e.to_string(),
        location: ErrorLocation::from(Location::caller()),
    })
}

/// Run the game binary with `--version` and parse what it prints.
///
/// There is no timeout: a binary that hangs here blocks startup.
pub async fn detect_binary_version(config: &ManagerConfig) -> Result<Version, VersionError> {
    let mut cmd = build_version_command(config);
    debug!("Detecting Factorio version: {:?}", cmd.as_std());

    let output = cmd.output().await.map_err(|e| VersionError::Command {
        message: format!(
            "Failed to run {} {VERSION_FLAG}: {e}",
            config.binary_path().display()
        ),
        location: ErrorLocation::from(Location::caller()),
        source: Some(Box::new(e)),
    })?;

    if !output.status.success() {
        return Err(VersionError::Command {
            message: format!(
                "{} {VERSION_FLAG} exited with {}: {}",
                config.binary_path().display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            location: ErrorLocation::from(Location::caller()),
            source: None,
        });
    }

    let version = parse_version_output(&String::from_utf8_lossy(&output.stdout))?;
    info!("Detected Factorio version {version}");
    Ok(version)
}

/// Read the base content version from `data/base/info.json`.
pub fn read_base_mod_version(info_path: &Path) -> Result<Version, VersionError> {
    let contents = std::fs::read_to_string(info_path).map_err(|e| VersionError::BaseModInfo {
        message: format!("Failed to read: {e}"),
        path: info_path.to_path_buf(),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let info: BaseModInfo =
        serde_json::from_str(&contents).map_err(|e| VersionError::BaseModInfo {
            message: format!("Failed to decode: {e}"),
            path: info_path.to_path_buf(),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let version = Version::parse(&info.version).map_err(|e| VersionError::Parse {
        message: e.to_string(),
        location: ErrorLocation::from(Location::caller()),
    })?;

    info!("Detected base mod version {version}");
    Ok(version)
}
