use crate::support::{fake_install, next_event, write_executable};

use server_core::error::CoreError;
use server_core::error::state::StateError;
use server_core::error::version::VersionError;
use server_core::state::ServerEvent;
use server_core::{Manager, initialize};

use models::{DEFAULT_BIND_IP, SaveSelector, Version};

use std::fs;
use std::time::Duration;

use serial_test::serial;

/// **VALUE**: Verifies startup detects both versions and bootstraps files.
///
/// **BUG THIS CATCHES**: Would catch the config dir not being created, or
/// the base mod version being read from the binary instead of info.json.
#[tokio::test]
#[serial]
async fn given_fresh_install_when_built_then_versions_and_files_ready() {
    // GIVEN: A fresh install with a separate config dir that does not exist
    let install = fake_install("1.1.110", "exit 0");
    let mut config = install.config.clone();
    config.config_dir = Some(install.root().join("state").join("config"));

    // WHEN: Building the manager
    let manager = Manager::build(config.clone()).await.unwrap();

    // THEN: Versions detected, settings and admin list bootstrapped
    let versions = manager.state().versions();
    assert_eq!(versions.binary, Version::new(1, 1, 110, 0));
    assert_eq!(versions.base_mod, Version::new(1, 1, 110, 0));
    assert!(config.settings_path().exists());
    assert_eq!(fs::read_to_string(config.admin_list_path()).unwrap(), "[]");

    let status = manager.state().status().await.unwrap();
    assert!(!status.running);
    assert_eq!(status.version, Version::new(1, 1, 110, 0));
}

#[tokio::test]
#[serial]
async fn given_binary_failing_version_check_when_built_then_version_command_error() {
    let install = fake_install("1.1.0", "exit 0");
    write_executable(&install.config.binary_path(), "#!/bin/sh\nexit 2\n");

    let result = Manager::build(install.config.clone()).await;

    assert!(matches!(
        result,
        Err(CoreError::Version(VersionError::Command { .. }))
    ));
}

/// **VALUE**: Verifies autostart fills in defaults and runs exactly once.
///
/// **BUG THIS CATCHES**: Would catch autostart overwriting an explicitly
/// configured port, or starting a second server on a repeated call.
#[tokio::test]
#[serial]
async fn given_partial_launch_options_when_autostarting_then_defaults_applied_once() {
    // GIVEN: Only the port is configured
    let install = fake_install("1.1.0", "exit 0");
    let manager = Manager::build(install.config.clone()).await.unwrap();
    let mut launch = manager.state().launch_options().await;
    launch.port = Some(34300);
    launch.savefile = SaveSelector::Named("old.zip".into());
    manager.state().update_launch(launch).await.unwrap();
    let mut events = manager.state().subscribe();

    // WHEN: Autostarting twice
    let first = manager.autostart().await.unwrap();
    let second = manager.autostart().await.unwrap();

    // THEN: One run with bind-all, the explicit port and the latest save
    assert!(second.is_none());
    tokio::time::timeout(Duration::from_secs(10), first.unwrap())
        .await
        .unwrap()
        .unwrap();
    next_event(&mut events, |e| matches!(e, ServerEvent::Stopped { .. })).await;

    let launch = manager.state().launch_options().await;
    assert_eq!(launch.bind_ip.as_deref(), Some(DEFAULT_BIND_IP));
    assert_eq!(launch.port, Some(34300));
    assert_eq!(launch.savefile, SaveSelector::LoadLatest);

    let args = install.recorded_args();
    assert!(args.iter().any(|a| a == "--start-server-load-latest"), "{args:?}");
}

/// **VALUE**: Verifies `initialize` succeeds once per process.
///
/// **WHY THIS MATTERS**: Two managers would race over the same settings
/// file and both try to start the game.
///
/// **BUG THIS CATCHES**: Would catch the guard being reset on success, or
/// a failed first attempt permanently blocking initialization.
#[tokio::test]
#[serial]
async fn given_initialize_when_called_again_then_already_initialized() {
    // GIVEN: A first attempt that fails on a broken install
    let broken = fake_install("1.1.0", "exit 0");
    fs::remove_file(broken.root().join("data").join("base").join("info.json")).unwrap();
    let failed = initialize(broken.config.clone()).await;
    assert!(matches!(
        failed,
        Err(CoreError::Version(VersionError::BaseModInfo { .. }))
    ));

    // WHEN: Initializing for real, then again
    let install = fake_install("1.1.0", "exit 0");
    let first = initialize(install.config.clone()).await;
    let second = initialize(install.config.clone()).await;

    // THEN: Only the first call succeeds
    assert!(first.is_ok());
    assert!(matches!(
        second,
        Err(CoreError::State(StateError::AlreadyInitialized { .. }))
    ));
}

/// **VALUE**: Verifies reload picks up edits made on disk.
#[tokio::test]
#[serial]
async fn given_settings_edited_on_disk_when_reloaded_then_state_updated() {
    let install = fake_install("1.1.0", "exit 0");
    let manager = Manager::build(install.config.clone()).await.unwrap();
    fs::write(
        install.config.settings_path(),
        r#"{"name": "Edited", "max_players": 3}"#,
    )
    .unwrap();
    fs::write(install.config.admin_list_path(), r#"["alice"]"#).unwrap();

    manager.reload_settings().await.unwrap();

    let settings = manager.state().settings().await;
    assert_eq!(settings["name"], serde_json::json!("Edited"));
    assert_eq!(settings["admins"], serde_json::json!(["alice"]));
}
