//! Build the game server command line.

use crate::config::ManagerConfig;
use crate::error::supervisor::SupervisorError;

use common::{ErrorLocation, RedactedSecret};
use models::{LaunchOptions, SaveSelector, Version};

use std::ffi::OsString;
use std::fmt;
use std::panic::Location;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command as TokioCommand;

pub const BIND_FLAG: &str = "--bind";
pub const PORT_FLAG: &str = "--port";
pub const SERVER_SETTINGS_FLAG: &str = "--server-settings";
pub const RCON_PORT_FLAG: &str = "--rcon-port";
pub const RCON_PASSWORD_FLAG: &str = "--rcon-password";
pub const SERVER_ADMINLIST_FLAG: &str = "--server-adminlist";
pub const LOAD_LATEST_FLAG: &str = "--start-server-load-latest";
pub const START_SERVER_FLAG: &str = "--start-server";
pub const LIBRARY_PATH_FLAG: &str = "--library-path";
pub const EXECUTABLE_PATH_FLAG: &str = "--executable-path";

/// A fully resolved invocation of the game server.
#[derive(Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    program: PathBuf,
    args: Vec<OsString>,
    /// Index into `args` holding the RCON password.
    secret_index: Option<usize>,
}

impl LaunchCommand {
    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Whether `flag` appears anywhere in the argument vector.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.args.iter().any(|arg| arg == flag)
    }

    /// The value following `flag`, if present.
    pub fn flag_value(&self, flag: &str) -> Option<&OsString> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|idx| self.args.get(idx + 1))
    }

    /// The command line with the RCON password masked, for logs.
    pub fn display_masked(&self) -> String {
        let mut rendered = vec![self.program.to_string_lossy().to_string()];
        rendered.extend(self.args.iter().enumerate().map(|(idx, arg)| {
            if Some(idx) == self.secret_index {
                RedactedSecret::mask().to_string()
            } else {
                arg.to_string_lossy().to_string()
            }
        }));
        rendered.join(" ")
    }

    /// A tokio command with all three standard streams piped.
    pub fn to_command(&self) -> TokioCommand {
        let mut cmd = TokioCommand::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);
        cmd
    }
}

impl fmt::Debug for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchCommand")
            .field("command", &self.display_masked())
            .finish()
    }
}

/// Assemble the invocation for `launch` against the detected binary `version`.
///
/// The admin-list flag is only emitted when the version supports it, and
/// exactly one of the two save flags is always present.
#[track_caller]
pub fn build_launch_command(
    config: &ManagerConfig,
    launch: &LaunchOptions,
    version: &Version,
) -> Result<LaunchCommand, SupervisorError> {
    let bind_ip = launch
        .bind_ip
        .as_deref()
        .filter(|ip| !ip.trim().is_empty())
        .ok_or_else(|| SupervisorError::Validation {
            message: "Bind address is not set".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let port = launch
        .port
        .filter(|p| *p != 0)
        .ok_or_else(|| SupervisorError::Validation {
            message: "Game port is not set".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let binary = config.binary_path();

    let (program, mut args) = match config.runtime_wrapper() {
        Some(wrapper) => (
            wrapper.loader,
            vec![
                OsString::from(LIBRARY_PATH_FLAG),
                wrapper.library_path.into_os_string(),
                binary.clone().into_os_string(),
                OsString::from(EXECUTABLE_PATH_FLAG),
                binary.into_os_string(),
            ],
        ),
        None => (binary, Vec::new()),
    };

    args.push(BIND_FLAG.into());
    args.push(bind_ip.into());
    args.push(PORT_FLAG.into());
    args.push(port.to_string().into());
    args.push(SERVER_SETTINGS_FLAG.into());
    args.push(config.settings_path().into_os_string());
    args.push(RCON_PORT_FLAG.into());
    args.push(config.rcon_port.to_string().into());
    args.push(RCON_PASSWORD_FLAG.into());
    let secret_index = Some(args.len());
    args.push(config.rcon_password.expose().into());

    if version.supports_admin_list() {
        args.push(SERVER_ADMINLIST_FLAG.into());
        args.push(config.admin_list_path().into_os_string());
    }

    match &launch.savefile {
        SaveSelector::LoadLatest => args.push(LOAD_LATEST_FLAG.into()),
        SaveSelector::Named(name) => {
            args.push(START_SERVER_FLAG.into());
            args.push(config.saves_dir().join(name).into_os_string());
        }
    }

    Ok(LaunchCommand {
        program,
        args,
        secret_index,
    })
}
