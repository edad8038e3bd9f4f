//! Logging for the manager: colored stdout plus a plain log file.
//!
//! Game server output is echoed through here as well, so the log file holds
//! both the manager's own messages and everything the server printed.

use crate::error::ManagerError;

use common::ErrorLocation;

use std::io::stdout;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use fern::Dispatch;
use fern::colors::Color::{Blue, Green, Magenta, Red, Yellow};
use fern::colors::ColoredLevelConfig;
use humantime::format_rfc3339;
use log::{LevelFilter, info, warn};

static INIT_LOGGER_ONCE: Once = Once::new();

/// Set on the first call, successful or not.
static LOGGER_ALREADY_CALLED: AtomicBool = AtomicBool::new(false);

pub const LOG_FILE_NAME: &str = "factorio-manager.log";

#[cfg(debug_assertions)]
const LOG_LEVEL: LevelFilter = LevelFilter::Debug;

#[cfg(not(debug_assertions))]
const LOG_LEVEL: LevelFilter = LevelFilter::Info;

pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE_NAME)
}

/// Install the global logger writing to stdout and `log_dir/factorio-manager.log`.
///
/// Only the first call does anything; later calls warn and return `Ok`.
///
/// # Errors
///
/// Returns [`ManagerError::Manager`] if the log file cannot be opened or a
/// global logger is already installed by someone else.
pub fn initialize(log_dir: &Path) -> Result<(), ManagerError> {
    if LOGGER_ALREADY_CALLED.swap(true, Ordering::SeqCst) {
        warn!("Logger already initialized");
        return Ok(());
    }

    let mut result = Ok(());

    INIT_LOGGER_ONCE.call_once(|| {
        result = initialize_internal(log_dir);
        if result.is_ok() {
            info!("Logger initialized with level: {LOG_LEVEL:?}");
        }
    });

    result
}

#[track_caller]
fn initialize_internal(log_dir: &Path) -> Result<(), ManagerError> {
    let log_file_path = log_file_path(log_dir);

    let color_configuration = ColoredLevelConfig::new()
        .debug(Blue)
        .info(Green)
        .warn(Yellow)
        .error(Red)
        .trace(Magenta);

    let stdout_dispatch = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{date} - {level}] {message} [{file}:{line}]",
                date = format_rfc3339(SystemTime::now()),
                level = color_configuration.color(record.level()),
                file = record.file().unwrap_or("unknown"),
                line = record.line().unwrap_or(0),
            ))
        })
        .chain(stdout());

    let log_file = fern::log_file(&log_file_path).map_err(|e| ManagerError::Manager {
        message: format!(
            "Failed to open log file {}: {e}",
            log_file_path.display()
        ),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let file_dispatch = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{date} - {level}] {message} [{file}:{line}]",
                date = format_rfc3339(SystemTime::now()),
                level = record.level(),
                file = record.file().unwrap_or("unknown"),
                line = record.line().unwrap_or(0),
            ))
        })
        .chain(log_file);

    Dispatch::new()
        .level(LOG_LEVEL)
        // Dependencies are noisy at debug.
        .level_for("sysinfo", LevelFilter::Warn)
        .chain(stdout_dispatch)
        .chain(file_dispatch)
        .apply()
        .map_err(|e| ManagerError::Manager {
            message: format!("Failed to initialize logger: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Ok(())
}
