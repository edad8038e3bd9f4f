use crate::config::{
    ENV_AUTOSTART, ENV_FACTORIO_DIR, ENV_RCON_PASSWORD, ENV_RCON_PORT, ManagerConfig,
};
use crate::error::config::ConfigError;
use crate::tests::EnvGuard;

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

use serial_test::serial;
use tempfile::tempdir;

#[test]
fn given_missing_file_when_load_then_defaults() {
    let dir = tempdir().unwrap();

    let config = ManagerConfig::load(&dir.path().join("manager.toml")).unwrap();

    assert_eq!(config.rcon_port, 27015);
    assert_eq!(config.settings_file, "server-settings.json");
    assert_eq!(config.admin_file, "server-adminlist.json");
    assert!(!config.autostart);
    assert!(config.rcon_password.is_empty());
}

/// **VALUE**: Verifies unset paths resolve under the Factorio directory.
///
/// **BUG THIS CATCHES**: Would catch the binary or data paths being resolved
/// against the working directory instead of the install.
#[test]
fn given_only_factorio_dir_when_resolving_paths_then_derived_from_install() {
    // GIVEN: A config with just the install dir
    let config = ManagerConfig {
        factorio_dir: PathBuf::from("/srv/factorio"),
        ..ManagerConfig::default()
    };

    // WHEN/THEN: Every path hangs off the install
    assert_eq!(config.binary_path(), PathBuf::from("/srv/factorio/bin/x64/factorio"));
    assert_eq!(
        config.settings_path(),
        PathBuf::from("/srv/factorio/config/server-settings.json")
    );
    assert_eq!(
        config.settings_template_path(),
        PathBuf::from("/srv/factorio/data/server-settings.example.json")
    );
    assert_eq!(
        config.base_mod_info_path(),
        PathBuf::from("/srv/factorio/data/base/info.json")
    );
    assert_eq!(
        config.console_log_path(),
        PathBuf::from("/srv/factorio/factorio-server-console.log")
    );
    assert_eq!(
        config.rcon_address(),
        "127.0.0.1:27015".parse::<SocketAddr>().unwrap()
    );
}

/// **VALUE**: Verifies the password survives a save/load cycle in clear text.
///
/// **WHY THIS MATTERS**: `RedactedSecret` refuses plain serialization, so the
/// config file must use the explicit serializer or the password is lost.
///
/// **BUG THIS CATCHES**: Would catch the masked value being written to disk.
#[test]
fn given_config_with_password_when_saved_and_loaded_then_password_preserved() {
    // GIVEN: A config with a password
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("manager.toml");
    let mut config = ManagerConfig {
        rcon_port: 27100,
        autostart: true,
        ..ManagerConfig::default()
    };
    config.rcon_password = common::RedactedSecret::new("s3cret");

    // WHEN: Saving and reloading
    config.save(&path).unwrap();
    let loaded = ManagerConfig::load(&path).unwrap();

    // THEN: Values match and no temp file is left behind
    assert_eq!(loaded.rcon_password.expose(), "s3cret");
    assert_eq!(loaded.rcon_port, 27100);
    assert!(loaded.autostart);
    assert!(!path.with_extension("toml.tmp").exists());
}

#[test]
fn given_invalid_toml_when_load_then_parse_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("manager.toml");
    fs::write(&path, "rcon_port = \"not a number\"").unwrap();

    assert!(matches!(
        ManagerConfig::load(&path),
        Err(ConfigError::ParseError { .. })
    ));
}

/// **VALUE**: Verifies half-configured custom glibc is rejected.
///
/// **BUG THIS CATCHES**: Would catch silently running without the loader
/// when only one of the two paths is set.
#[test]
fn given_glibc_custom_without_paths_when_validated_then_error() {
    let config = ManagerConfig {
        glibc_custom: true,
        glibc_location: Some(PathBuf::from("/opt/glibc/ld.so")),
        ..ManagerConfig::default()
    };

    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError { .. })
    ));
    assert!(config.runtime_wrapper().is_none());
}

#[test]
fn given_zero_rcon_port_when_validated_then_error() {
    let config = ManagerConfig {
        rcon_port: 0,
        ..ManagerConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn given_empty_password_when_ensured_then_generated_once() {
    let mut config = ManagerConfig::default();

    config.ensure_rcon_password();
    let generated = config.rcon_password.expose().to_string();
    config.ensure_rcon_password();

    assert_eq!(generated.len(), 32);
    assert_eq!(config.rcon_password.expose(), generated);
}

/// **VALUE**: Verifies environment variables override the file.
///
/// **BUG THIS CATCHES**: Would catch overrides applied before the file is
/// read, letting the file win.
#[test]
#[serial]
fn given_env_vars_and_file_when_load_with_env_then_env_wins() {
    // GIVEN: A file and conflicting environment
    let dir = tempdir().unwrap();
    let path = dir.path().join("manager.toml");
    fs::write(&path, "rcon_port = 27100\nautostart = false\n").unwrap();
    let _port = EnvGuard::set(ENV_RCON_PORT, "27200");
    let _autostart = EnvGuard::set(ENV_AUTOSTART, "true");
    let _password = EnvGuard::set(ENV_RCON_PASSWORD, "from-env");
    let _dir = EnvGuard::set(ENV_FACTORIO_DIR, "/env/factorio");

    // WHEN: Loading with env
    let config = ManagerConfig::load_with_env(&path).unwrap();

    // THEN: Environment values win
    assert_eq!(config.rcon_port, 27200);
    assert!(config.autostart);
    assert_eq!(config.rcon_password.expose(), "from-env");
    assert_eq!(config.factorio_dir, PathBuf::from("/env/factorio"));
}

#[test]
#[serial]
fn given_malformed_env_port_when_applying_overrides_then_env_error() {
    let _port = EnvGuard::set(ENV_RCON_PORT, "seventy");
    let mut config = ManagerConfig::default();

    match config.apply_env_overrides() {
        Err(ConfigError::EnvError { variable, .. }) => assert_eq!(variable, ENV_RCON_PORT),
        other => panic!("Expected EnvError, got {other:?}"),
    }
}
