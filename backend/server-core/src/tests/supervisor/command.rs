use crate::config::ManagerConfig;
use crate::error::supervisor::SupervisorError;
use crate::supervisor::command::{
    BIND_FLAG, EXECUTABLE_PATH_FLAG, LIBRARY_PATH_FLAG, LOAD_LATEST_FLAG, PORT_FLAG,
    RCON_PASSWORD_FLAG, SERVER_ADMINLIST_FLAG, START_SERVER_FLAG, build_launch_command,
};

use common::RedactedSecret;
use models::{LaunchOptions, SaveSelector, Version};

use std::ffi::OsString;
use std::path::PathBuf;

fn test_config() -> ManagerConfig {
    ManagerConfig {
        factorio_dir: PathBuf::from("/opt/factorio"),
        rcon_password: RedactedSecret::new("hunter2"),
        ..ManagerConfig::default()
    }
}

fn load_latest() -> LaunchOptions {
    LaunchOptions::new("0.0.0.0", 34197, SaveSelector::LoadLatest)
}

/// **VALUE**: Verifies the admin-list flag is gated on the binary version.
///
/// **WHY THIS MATTERS**: Factorio 0.17.0 and older abort on an unknown
/// `--server-adminlist` flag, so emitting it unconditionally breaks old servers.
///
/// **BUG THIS CATCHES**: Would catch an off-by-one in the gate (using `>=`
/// instead of strictly greater than 0.17.0).
#[test]
fn given_versions_around_gate_when_building_command_then_adminlist_only_above_0_17_0() {
    // GIVEN: A config and versions on both sides of the gate
    let config = test_config();
    let launch = load_latest();

    // WHEN: Building commands for each version
    let at_gate = build_launch_command(&config, &launch, &Version::new(0, 17, 0, 0)).unwrap();
    let below = build_launch_command(&config, &launch, &Version::new(0, 16, 51, 0)).unwrap();
    let above = build_launch_command(&config, &launch, &Version::new(0, 17, 1, 0)).unwrap();

    // THEN: Only the version above 0.17.0 carries the admin list
    assert!(!at_gate.has_flag(SERVER_ADMINLIST_FLAG));
    assert!(!below.has_flag(SERVER_ADMINLIST_FLAG));
    assert!(above.has_flag(SERVER_ADMINLIST_FLAG));
    assert_eq!(
        above.flag_value(SERVER_ADMINLIST_FLAG),
        Some(&config.admin_list_path().into_os_string())
    );
}

/// **VALUE**: Verifies exactly one save flag is emitted for each selector.
///
/// **WHY THIS MATTERS**: Factorio refuses to start with both or neither.
///
/// **BUG THIS CATCHES**: Would catch a refactor that appends the named save
/// without removing the load-latest default.
#[test]
fn given_save_selectors_when_building_command_then_exactly_one_save_flag() {
    // GIVEN: Both kinds of save selector
    let config = test_config();
    let version = Version::new(1, 1, 0, 0);
    let named = LaunchOptions::new("0.0.0.0", 34197, "my-world.zip");

    // WHEN: Building both commands
    let latest_cmd = build_launch_command(&config, &load_latest(), &version).unwrap();
    let named_cmd = build_launch_command(&config, &named, &version).unwrap();

    // THEN: Each has exactly one of the two flags
    assert!(latest_cmd.has_flag(LOAD_LATEST_FLAG));
    assert!(!latest_cmd.has_flag(START_SERVER_FLAG));

    assert!(!named_cmd.has_flag(LOAD_LATEST_FLAG));
    assert_eq!(
        named_cmd.flag_value(START_SERVER_FLAG),
        Some(&config.saves_dir().join("my-world.zip").into_os_string())
    );
}

/// **VALUE**: Verifies the custom loader wraps the binary and overrides its path.
///
/// **WHY THIS MATTERS**: Without `--executable-path`, Factorio resolves its
/// data directory relative to `ld.so` and fails to find its files.
///
/// **BUG THIS CATCHES**: Would catch the wrapper prefix being dropped or
/// reordered after the server flags.
#[test]
fn given_runtime_wrapper_when_building_command_then_prefixes_loader_invocation() {
    // GIVEN: A config with a custom glibc loader
    let config = ManagerConfig {
        glibc_custom: true,
        glibc_location: Some(PathBuf::from("/opt/glibc/ld-linux.so")),
        glibc_lib_location: Some(PathBuf::from("/opt/glibc/lib")),
        ..test_config()
    };
    let binary = config.binary_path().into_os_string();

    // WHEN: Building the command
    let cmd = build_launch_command(&config, &load_latest(), &Version::new(1, 1, 0, 0)).unwrap();

    // THEN: The loader runs the binary with an explicit executable path
    assert_eq!(cmd.program(), &PathBuf::from("/opt/glibc/ld-linux.so"));
    let expected_prefix: Vec<OsString> = vec![
        LIBRARY_PATH_FLAG.into(),
        "/opt/glibc/lib".into(),
        binary.clone(),
        EXECUTABLE_PATH_FLAG.into(),
        binary,
    ];
    assert_eq!(&cmd.args()[..5], expected_prefix.as_slice());
    assert_eq!(cmd.args()[5], OsString::from(BIND_FLAG));
}

/// **VALUE**: Verifies the plain invocation runs the binary directly.
///
/// **BUG THIS CATCHES**: Would catch the wrapper being applied when the
/// loader paths are configured but `glibc_custom` is off.
#[test]
fn given_wrapper_disabled_when_building_command_then_runs_binary_directly() {
    // GIVEN: Loader paths set but the feature switched off
    let config = ManagerConfig {
        glibc_custom: false,
        glibc_location: Some(PathBuf::from("/opt/glibc/ld-linux.so")),
        glibc_lib_location: Some(PathBuf::from("/opt/glibc/lib")),
        ..test_config()
    };

    // WHEN: Building the command
    let cmd = build_launch_command(&config, &load_latest(), &Version::new(1, 1, 0, 0)).unwrap();

    // THEN: The game binary is the program and the first flag is --bind
    assert_eq!(cmd.program(), &config.binary_path());
    assert_eq!(cmd.args()[0], OsString::from(BIND_FLAG));
    assert!(!cmd.has_flag(LIBRARY_PATH_FLAG));
}

/// **VALUE**: Verifies the RCON password never reaches logs.
///
/// **WHY THIS MATTERS**: The command line is logged at every start.
///
/// **BUG THIS CATCHES**: Would catch masking the wrong argument index after
/// flags are added or reordered.
#[test]
fn given_command_when_displayed_masked_then_password_hidden_and_args_kept() {
    // GIVEN: A built command
    let config = test_config();
    let cmd = build_launch_command(&config, &load_latest(), &Version::new(1, 1, 0, 0)).unwrap();

    // WHEN: Rendering it for logs
    let rendered = cmd.display_masked();
    let debug = format!("{cmd:?}");

    // THEN: The secret is masked everywhere but still passed to the process
    assert!(!rendered.contains("hunter2"));
    assert!(!debug.contains("hunter2"));
    assert!(rendered.contains(&format!("{RCON_PASSWORD_FLAG} {}", RedactedSecret::mask())));
    assert!(rendered.contains(&format!("{PORT_FLAG} 34197")));
    assert_eq!(
        cmd.flag_value(RCON_PASSWORD_FLAG),
        Some(&OsString::from("hunter2"))
    );
}

/// **VALUE**: Verifies an unset bind address or port is rejected up front.
///
/// **BUG THIS CATCHES**: Would catch `--port 0` or an empty `--bind` being
/// passed to the game, which fails later with a far less useful message.
#[test]
fn given_unset_bind_or_port_when_building_command_then_validation_error() {
    // GIVEN: Launch options missing either value
    let config = test_config();
    let version = Version::new(1, 1, 0, 0);
    let no_bind = LaunchOptions {
        bind_ip: None,
        port: Some(34197),
        savefile: SaveSelector::LoadLatest,
    };
    let zero_port = LaunchOptions {
        bind_ip: Some("0.0.0.0".to_string()),
        port: Some(0),
        savefile: SaveSelector::LoadLatest,
    };

    // WHEN/THEN: Both fail validation
    assert!(matches!(
        build_launch_command(&config, &no_bind, &version),
        Err(SupervisorError::Validation { .. })
    ));
    assert!(matches!(
        build_launch_command(&config, &zero_port, &version),
        Err(SupervisorError::Validation { .. })
    ));
}
