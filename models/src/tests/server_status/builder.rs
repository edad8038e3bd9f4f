use crate::{LaunchOptions, ModelError, ServerStatusBuilder, Version};

fn base_builder() -> ServerStatusBuilder {
    ServerStatusBuilder::default()
        .with_version(Version::new(1, 1, 0, 0))
        .with_base_mod_version(Version::new(1, 1, 0, 0))
        .with_launch(LaunchOptions::new("0.0.0.0", 34197, "Load Latest"))
}

fn validation_message(result: Result<crate::ServerStatus, ModelError>) -> String {
    match result {
        Err(ModelError::Validation { message, .. }) => message,
        other => panic!("expected validation error, got {other:?}"),
    }
}

/// **VALUE**: Verifies that a running snapshot must carry a PID.
///
/// **WHY THIS MATTERS**: The stop path signals the PID from the snapshot. A running
/// server without one could never be stopped.
#[test]
fn given_running_without_pid_when_building_then_returns_validation_error() {
    // GIVEN/WHEN: Running but no PID
    let result = base_builder().with_running(true).build();

    // THEN: Rejected
    assert_eq!(validation_message(result), "PID is required while running");
}

/// **VALUE**: Verifies that PID zero is rejected.
#[test]
fn given_zero_pid_when_building_then_returns_validation_error() {
    let result = base_builder().with_running(true).with_pid(Some(0)).build();

    assert_eq!(validation_message(result), "PID must be non-zero");
}

/// **VALUE**: Verifies that a stopped snapshot cannot claim a live PID or RCON link.
///
/// **BUG THIS CATCHES**: Would catch the exit path forgetting to clear the handle.
#[test]
fn given_stopped_with_leftovers_when_building_then_returns_validation_error() {
    let with_pid = base_builder().with_running(false).with_pid(Some(42)).build();
    assert_eq!(validation_message(with_pid), "Stopped server cannot have a PID");

    let with_rcon = base_builder()
        .with_running(false)
        .with_rcon_connected(true)
        .build();
    assert_eq!(
        validation_message(with_rcon),
        "Stopped server cannot have an RCON connection"
    );
}

/// **VALUE**: Verifies that required fields are enforced.
#[test]
fn given_missing_version_when_building_then_returns_validation_error() {
    let result = ServerStatusBuilder::default()
        .with_running(false)
        .with_base_mod_version(Version::new(1, 1, 0, 0))
        .build();

    assert_eq!(validation_message(result), "Server version is required");
}

/// **VALUE**: Verifies a valid running snapshot and its JSON field names.
#[test]
fn given_valid_running_fields_when_building_then_snapshot_serializes() {
    // GIVEN/WHEN: A complete running snapshot
    let status = base_builder()
        .with_running(true)
        .with_pid(Some(4242))
        .with_rcon_connected(true)
        .build()
        .unwrap();

    // THEN: Fields and JSON names
    assert!(status.running);
    assert_eq!(status.pid, Some(4242));
    assert_eq!(status.port, Some(34197));

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["bindip"], "0.0.0.0");
    assert_eq!(json["savefile"], "Load Latest");
    assert_eq!(json["fac_version"], "1.1.0");
    assert_eq!(json["rcon_connected"], true);
}
