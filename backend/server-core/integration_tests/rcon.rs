use crate::support::{FakeRcon, RCON_READY_LINE, TEST_RCON_PASSWORD, fake_install, next_event};

use server_core::Manager;
use server_core::error::rcon::RconError;
use server_core::rcon::{RconBridge, RconConnection};
use server_core::state::ServerEvent;

use common::RedactedSecret;
use models::{LOAD_LATEST, LaunchOptions};

use std::net::SocketAddr;
use std::time::Duration;

use serial_test::serial;

/// **VALUE**: Verifies every readiness line produces its own connection.
///
/// **WHY THIS MATTERS**: Readiness is deliberately not deduplicated. If the
/// server prints the marker twice, two sessions are opened and the later
/// one replaces the earlier one in the state.
///
/// **BUG THIS CATCHES**: Would catch attempts being dropped, or their
/// outcomes not reaching the run report.
#[tokio::test]
#[serial]
async fn given_two_readiness_lines_when_run_then_two_authenticated_sessions() {
    // GIVEN: A fake RCON server and a game that announces RCON twice
    let rcon = FakeRcon::start(TEST_RCON_PASSWORD).await;
    let body = format!("echo '{RCON_READY_LINE}'\necho '{RCON_READY_LINE}'\nsleep 1\nexit 0");
    let install = fake_install("1.1.0", &body);
    let mut config = install.config.clone();
    config.rcon_port = rcon.port;
    let manager = Manager::build(config).await.unwrap();
    manager
        .state()
        .update_launch(LaunchOptions::new("0.0.0.0", 34197, LOAD_LATEST))
        .await
        .unwrap();
    let mut events = manager.state().subscribe();

    // WHEN: Running
    let report = manager.supervisor().run().await.unwrap();

    // THEN: Two attempts, both authenticated
    assert_eq!(report.rcon_attempts, 2);
    assert_eq!(report.rcon_failures, 0);
    assert_eq!(rcon.accepted(), 2);
    next_event(&mut events, |e| *e == ServerEvent::RconConnected).await;

    // AND: The connection does not outlive the process
    assert!(!manager.state().rcon_connected().await);
}

#[tokio::test]
async fn given_wrong_password_when_connecting_then_auth_error() {
    let rcon = FakeRcon::start(TEST_RCON_PASSWORD).await;
    let address = SocketAddr::from(([127, 0, 0, 1], rcon.port));

    let result = RconConnection::connect(address, &RedactedSecret::new("wrong")).await;

    assert!(matches!(result, Err(RconError::Auth { .. })));
}

/// **VALUE**: Verifies a hung RCON peer cannot stall an attempt forever.
///
/// **BUG THIS CATCHES**: Would catch the timeout wrapping only the TCP
/// connect and not the authentication exchange.
#[tokio::test]
#[serial]
async fn given_silent_peer_when_bridge_connects_then_times_out() {
    // GIVEN: A listener that accepts but never answers
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let hold = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(socket);
    });

    let install = fake_install("1.1.0", "exit 0");
    let manager = Manager::build(install.config.clone()).await.unwrap();
    let bridge = RconBridge::new(
        address,
        RedactedSecret::new(TEST_RCON_PASSWORD),
        manager.state().clone(),
    )
    .with_connect_timeout(Duration::from_millis(200));

    // WHEN: Triggering an attempt
    let result = bridge.trigger().await.unwrap();

    // THEN: It times out and nothing is stored
    assert!(matches!(result, Err(RconError::Timeout { .. })));
    assert!(!manager.state().rcon_connected().await);
    hold.abort();
}
