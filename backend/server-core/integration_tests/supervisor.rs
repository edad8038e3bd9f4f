use crate::support::{RCON_READY_LINE, SilentPeer, fake_install, next_event};

use server_core::Manager;
use server_core::error::supervisor::SupervisorError;
use server_core::state::ServerEvent;
use server_core::supervisor::command::{LOAD_LATEST_FLAG, SERVER_ADMINLIST_FLAG};
use server_core::supervisor::process::{KILL_VERIFY_MAX_ELAPSED, TERM_GRACE};

use models::{LOAD_LATEST, LaunchOptions};

use std::fs;
use std::time::{Duration, Instant};

use serde_json::json;
use serial_test::serial;

/// **VALUE**: End-to-end start of a server that exits immediately.
///
/// **WHY THIS MATTERS**: This is the whole happy path: settings persisted,
/// command built for the detected version, output logged, state flipped
/// false -> true -> false.
///
/// **BUG THIS CATCHES**: Would catch the running flag never being set, or
/// being left set after exit, and the admin-list flag missing on 1.1.0.
#[tokio::test]
#[serial]
async fn given_bind_all_load_latest_on_1_1_0_when_run_then_full_lifecycle() {
    // GIVEN: A 1.1.0 install whose server prints a line and exits
    let install = fake_install("1.1.0", "echo '1.000 Info Hello from the server'\nexit 0");
    let manager = Manager::build(install.config.clone()).await.unwrap();
    let state = manager.state();
    state
        .update_launch(LaunchOptions::new("0.0.0.0", 34197, LOAD_LATEST))
        .await
        .unwrap();
    let mut events = state.subscribe();
    assert!(!state.is_running());

    // WHEN: Running the server to completion
    let report = manager.supervisor().run().await.unwrap();

    // THEN: The process saw the expected flags
    let args = install.recorded_args();
    assert!(args.iter().any(|a| a == LOAD_LATEST_FLAG), "{args:?}");
    assert!(args.iter().any(|a| a == SERVER_ADMINLIST_FLAG), "{args:?}");
    assert!(args.windows(2).any(|w| w == ["--bind", "0.0.0.0"]));
    assert!(args.windows(2).any(|w| w == ["--port", "34197"]));

    // AND: The state went running -> stopped
    let started = next_event(&mut events, |e| matches!(e, ServerEvent::Started { .. })).await;
    assert!(matches!(started, ServerEvent::Started { pid } if pid > 0));
    let stopped = next_event(&mut events, |e| matches!(e, ServerEvent::Stopped { .. })).await;
    assert_eq!(stopped, ServerEvent::Stopped { success: true });
    assert!(!state.is_running());
    assert_eq!(state.pid(), None);

    // AND: Output reached the console log
    assert_eq!(report.exit_code, Some(0));
    assert_eq!(report.rcon_attempts, 0);
    let console = fs::read_to_string(install.config.console_log_path()).unwrap();
    assert_eq!(console, "1.000 Info Hello from the server\n");
}

/// **VALUE**: Verifies in-memory settings edits are written before start.
///
/// **BUG THIS CATCHES**: Would catch the game being started with the file
/// from boot time instead of the edited document.
#[tokio::test]
#[serial]
async fn given_edited_settings_when_run_then_file_on_disk_updated_first() {
    // GIVEN: An edited settings document; the script copies the file it was given
    let install = fake_install(
        "1.1.0",
        "cp \"$6\" \"$(dirname \"$0\")/seen-settings.json\"\nexit 0",
    );
    let manager = Manager::build(install.config.clone()).await.unwrap();
    let state = manager.state();
    state
        .update_launch(LaunchOptions::new("0.0.0.0", 34197, LOAD_LATEST))
        .await
        .unwrap();
    let mut settings = state.settings().await;
    settings.insert("max_players".into(), json!(12));
    state.update_settings(settings).await.unwrap();

    // WHEN: Running
    manager.supervisor().run().await.unwrap();

    // THEN: The server saw the edited document
    let seen = fs::read_to_string(install.root().join("bin/x64/seen-settings.json")).unwrap();
    let seen: serde_json::Value = serde_json::from_str(&seen).unwrap();
    assert_eq!(seen["max_players"], json!(12));
    assert_eq!(seen["admins"], json!([]));
}

/// **VALUE**: Verifies a non-zero exit is an error result, not a crash.
///
/// **BUG THIS CATCHES**: Would catch the running flag staying set when the
/// game exits with an error.
#[tokio::test]
#[serial]
async fn given_server_exiting_non_zero_when_run_then_exit_error_and_idle() {
    // GIVEN: A server that fails
    let install = fake_install("1.1.0", "echo '0.5 Error Map version too new' >&2\nexit 3");
    let manager = Manager::build(install.config.clone()).await.unwrap();
    manager
        .state()
        .update_launch(LaunchOptions::new("0.0.0.0", 34197, "world.zip"))
        .await
        .unwrap();

    // WHEN: Running
    let result = manager.supervisor().run().await;

    // THEN: Exit code surfaces and the state is idle
    match result {
        Err(SupervisorError::Exit { code, .. }) => assert_eq!(code, Some(3)),
        other => panic!("Expected Exit error, got {other:?}"),
    }
    assert!(!manager.state().is_running());
    let console = fs::read_to_string(install.config.console_log_path()).unwrap();
    assert!(console.contains("Map version too new"));
    let args = install.recorded_args();
    assert!(args.iter().any(|a| a.ends_with("saves/world.zip")), "{args:?}");
}

/// **VALUE**: Verifies a spawn failure leaves the supervisor idle.
///
/// **BUG THIS CATCHES**: Would catch the running flag being set before the
/// spawn call has succeeded.
#[tokio::test]
#[serial]
async fn given_missing_binary_when_run_then_spawn_error_and_idle() {
    // GIVEN: An install whose binary disappears after version detection
    let install = fake_install("1.1.0", "exit 0");
    let manager = Manager::build(install.config.clone()).await.unwrap();
    manager
        .state()
        .update_launch(LaunchOptions::new("0.0.0.0", 34197, LOAD_LATEST))
        .await
        .unwrap();
    fs::remove_file(install.config.binary_path()).unwrap();

    // WHEN: Running
    let result = manager.supervisor().run().await;

    // THEN: Spawn error, still idle
    assert!(matches!(result, Err(SupervisorError::Spawn { .. })));
    assert!(!manager.state().is_running());
}

/// **VALUE**: Verifies stop terminates a live server and unblocks `run`.
///
/// **WHY THIS MATTERS**: Clean shutdown relies on process death closing the
/// pipes so both stream scans end.
///
/// **BUG THIS CATCHES**: Would catch `run` hanging after stop, a second run
/// being allowed concurrently, and stop on an idle server pretending to work.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn given_long_running_server_when_stopped_then_run_returns_promptly() {
    // GIVEN: A server that stays up
    let install = fake_install("1.1.0", "echo '0.1 Info ready'\nexec sleep 60");
    let manager = Manager::build(install.config.clone()).await.unwrap();
    manager
        .state()
        .update_launch(LaunchOptions::new("0.0.0.0", 34197, LOAD_LATEST))
        .await
        .unwrap();
    let supervisor = manager.supervisor().clone();
    let mut events = manager.state().subscribe();

    assert!(matches!(
        supervisor.stop().await,
        Err(SupervisorError::NotRunning { .. })
    ));

    let runner = supervisor.clone();
    let run = tokio::spawn(async move { runner.run().await });
    next_event(&mut events, |e| matches!(e, ServerEvent::Started { .. })).await;

    // WHEN: A second start is attempted, then the server is stopped
    let second = supervisor.run().await;
    let begin = Instant::now();
    supervisor.stop().await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("run did not return after stop")
        .unwrap();

    // THEN: The second start was refused and the first ended by signal
    assert!(matches!(second, Err(SupervisorError::AlreadyRunning { .. })));
    assert!(matches!(result, Err(SupervisorError::Exit { code: None, .. })));
    assert!(begin.elapsed() < Duration::from_secs(10));
    assert!(!manager.state().is_running());
}

#[tokio::test]
#[serial]
async fn given_rcon_line_without_listener_when_run_then_attempt_counted_as_failure() {
    let install = fake_install("1.1.0", &format!("echo '{RCON_READY_LINE}'\nexit 0"));
    let mut config = install.config.clone();
    // A port that was free a moment ago; nothing listens on it now.
    config.rcon_port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let manager = Manager::build(config).await.unwrap();
    manager
        .state()
        .update_launch(LaunchOptions::new("0.0.0.0", 34197, LOAD_LATEST))
        .await
        .unwrap();

    let report = manager.supervisor().run().await.unwrap();

    assert_eq!(report.rcon_attempts, 1);
    assert_eq!(report.rcon_failures, 1);
}

/// **VALUE**: Verifies the server reads as stopped as soon as the process
/// exits, even while an RCON attempt is still in flight.
///
/// **WHY THIS MATTERS**: Status readers and `stop()` must agree; a reaped
/// process reported as running cannot be stopped and cannot be restarted.
///
/// **BUG THIS CATCHES**: Would catch the running flag only being cleared
/// after every stream scan and RCON attempt has been collected.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn given_pending_rcon_attempt_when_process_exits_then_stopped_immediately() {
    // GIVEN: A server that announces RCON and exits, and a peer that never answers
    let peer = SilentPeer::start().await;
    let install = fake_install("1.1.0", &format!("echo '{RCON_READY_LINE}'\nexit 0"));
    let mut config = install.config.clone();
    config.rcon_port = peer.port;
    let manager = Manager::build(config).await.unwrap();
    manager
        .state()
        .update_launch(LaunchOptions::new("0.0.0.0", 34197, LOAD_LATEST))
        .await
        .unwrap();
    let supervisor = manager
        .supervisor()
        .clone()
        .with_rcon_timeout(Duration::from_secs(3));
    let mut events = manager.state().subscribe();

    // WHEN: The process exits while the attempt hangs
    let runner = supervisor.clone();
    let run = tokio::spawn(async move { runner.run().await });
    let stopped = next_event(&mut events, |e| matches!(e, ServerEvent::Stopped { .. })).await;

    // THEN: Stopped is visible before the run has collected the attempt
    assert_eq!(stopped, ServerEvent::Stopped { success: true });
    assert!(!run.is_finished());
    assert!(!manager.state().is_running());
    assert_eq!(manager.state().pid(), None);
    assert!(matches!(
        supervisor.stop().await,
        Err(SupervisorError::NotRunning { .. })
    ));

    // AND: The hung attempt still ends up in the report
    let report = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("run did not return after the RCON timeout")
        .unwrap()
        .unwrap();
    assert_eq!(report.rcon_attempts, 1);
    assert_eq!(report.rcon_failures, 1);
}

/// **VALUE**: Verifies the running flag follows the process, not its pipes.
///
/// **BUG THIS CATCHES**: Would catch a background grandchild holding stdout
/// open keeping the server marked as running after it exited.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn given_grandchild_holding_pipes_when_server_exits_then_not_running() {
    // GIVEN: A server that leaves a sleeper attached to its stdout
    let install = fake_install("1.1.0", "(sleep 3) &\nexit 0");
    let manager = Manager::build(install.config.clone()).await.unwrap();
    manager
        .state()
        .update_launch(LaunchOptions::new("0.0.0.0", 34197, LOAD_LATEST))
        .await
        .unwrap();
    let mut events = manager.state().subscribe();

    // WHEN: The server process exits
    let runner = manager.supervisor().clone();
    let run = tokio::spawn(async move { runner.run().await });
    next_event(&mut events, |e| matches!(e, ServerEvent::Stopped { .. })).await;

    // THEN: It is reported stopped while the scans still wait on the pipes
    assert!(!run.is_finished());
    assert!(!manager.state().is_running());
    let report = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(report.exit_code, Some(0));
}

/// **VALUE**: Verifies `stop()` kills a server that ignores SIGTERM.
///
/// **WHY THIS MATTERS**: A hung server must not survive a shutdown request.
///
/// **BUG THIS CATCHES**: Would catch stop giving up with an error while the
/// process keeps running.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn given_server_ignoring_sigterm_when_stopped_then_killed() {
    // GIVEN: A server that ignores SIGTERM
    let install = fake_install("1.1.0", "trap '' TERM\necho '0.1 Info ready'\nexec sleep 60");
    let manager = Manager::build(install.config.clone()).await.unwrap();
    manager
        .state()
        .update_launch(LaunchOptions::new("0.0.0.0", 34197, LOAD_LATEST))
        .await
        .unwrap();
    let supervisor = manager.supervisor().clone();
    let mut events = manager.state().subscribe();
    let runner = supervisor.clone();
    let run = tokio::spawn(async move { runner.run().await });
    next_event(&mut events, |e| matches!(e, ServerEvent::Started { .. })).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    // WHEN: Stopping
    let begin = Instant::now();
    supervisor.stop().await.unwrap();

    // THEN: It was killed within the grace period plus the kill window
    assert!(begin.elapsed() < TERM_GRACE + KILL_VERIFY_MAX_ELAPSED + Duration::from_secs(1));
    let result = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("run did not return after stop")
        .unwrap();
    assert!(matches!(result, Err(SupervisorError::Exit { code: None, .. })));
    assert!(!manager.state().is_running());
}
