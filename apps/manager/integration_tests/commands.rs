use factorio_manager::commands::server::{server_status, start_server, stop_server};
use factorio_manager::error::ManagerError;

use server_core::Manager;
use server_core::config::ManagerConfig;
use server_core::state::ServerEvent;

use common::RedactedSecret;
use models::{LOAD_LATEST, LaunchOptions};

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::time::Duration;

use serial_test::serial;
use tempfile::TempDir;
use tokio::time::timeout;

/// Minimal install whose server prints one line and then sleeps.
fn sleeping_install() -> (TempDir, ManagerConfig) {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let binary = root.join("bin").join("x64").join("factorio");
    fs::create_dir_all(binary.parent().unwrap()).unwrap();
    fs::create_dir_all(root.join("data").join("base")).unwrap();
    fs::write(root.join("data").join("server-settings.example.json"), "{}").unwrap();
    fs::write(
        root.join("data").join("base").join("info.json"),
        r#"{"version": "1.1.0"}"#,
    )
    .unwrap();
    fs::write(
        &binary,
        "#!/bin/sh\n\
         if [ \"$1\" = \"--version\" ]; then echo 'Version: 1.1.0 (build 1)'; exit 0; fi\n\
         echo '0.1 Info up'\n\
         exec sleep 60\n",
    )
    .unwrap();
    let mut perms = fs::metadata(&binary).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&binary, perms).unwrap();

    let config = ManagerConfig {
        factorio_dir: root.to_path_buf(),
        rcon_password: RedactedSecret::new("pw"),
        ..ManagerConfig::default()
    };
    (dir, config)
}

/// **VALUE**: Drives the commands a host uses: start, status, stop.
///
/// **WHY THIS MATTERS**: These are the only entry points the binary uses to
/// control the game; their error mapping is what clients see.
///
/// **BUG THIS CATCHES**: Would catch start blocking until the server exits,
/// status not reflecting the live PID, and stop on an idle server being
/// reported as a failure instead of `NotRunning`.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn given_manager_when_started_queried_and_stopped_then_commands_reflect_state() {
    // GIVEN: A manager over a fake install
    let (_dir, config) = sleeping_install();
    let manager = Arc::new(Manager::build(config).await.unwrap());
    let mut events = manager.state().subscribe();

    // WHEN: Starting with explicit launch options
    let run = start_server(
        &manager,
        Some(LaunchOptions::new("0.0.0.0", 34197, LOAD_LATEST)),
    )
    .await
    .unwrap();
    let started = timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();

    // THEN: Status shows the running server
    let ServerEvent::Started { pid } = started else {
        panic!("Expected Started, got {started:?}");
    };
    let status = server_status(&manager).await.unwrap();
    assert!(status.running);
    assert_eq!(status.pid, Some(pid));
    assert_eq!(status.port, Some(34197));
    assert!(matches!(
        start_server(&manager, None).await,
        Err(ManagerError::Core { .. })
    ));

    // WHEN: Stopping
    stop_server(&manager).await.unwrap();
    timeout(Duration::from_secs(10), run).await.unwrap().unwrap();

    // THEN: Idle, and a second stop reports NotRunning
    let status = server_status(&manager).await.unwrap();
    assert!(!status.running);
    assert_eq!(status.pid, None);
    assert!(matches!(
        stop_server(&manager).await,
        Err(ManagerError::NotRunning { .. })
    ));
}
