use crate::config::ManagerConfig;
use crate::config::settings::{
    ADMINS_KEY, SettingsDocument, apply_admin_list, load, load_admin_list, load_with_admins,
    persist, reload,
};
use crate::error::settings::SettingsError;

use models::Version;

use std::fs;
use std::path::Path;

use serde_json::{Value, json};
use tempfile::tempdir;

const TEMPLATE: &str = r#"{
  "name": "Name of the game as it will appear in the game listing",
  "max_players": 0,
  "visibility": { "public": true, "lan": true }
}"#;

fn install(root: &Path) -> ManagerConfig {
    let data = root.join("data");
    fs::create_dir_all(&data).unwrap();
    fs::create_dir_all(root.join("config")).unwrap();
    fs::write(data.join("server-settings.example.json"), TEMPLATE).unwrap();
    ManagerConfig {
        factorio_dir: root.to_path_buf(),
        ..ManagerConfig::default()
    }
}

/// **VALUE**: Verifies first-run bootstrap copies the template byte for byte.
///
/// **WHY THIS MATTERS**: Fresh installs have no settings file; the example
/// shipped with the game is the documented starting point.
///
/// **BUG THIS CATCHES**: Would catch decoding and re-encoding the template,
/// which loses the game's comments-by-key and formatting.
#[test]
fn given_absent_settings_and_template_when_load_then_file_equals_template() {
    // GIVEN: An install with only the template
    let dir = tempdir().unwrap();
    let config = install(dir.path());

    // WHEN: Loading
    let settings = load(
        &config.config_dir(),
        &config.settings_file,
        &config.settings_template_path(),
    )
    .unwrap();

    // THEN: The new file is the template, and it decoded
    assert_eq!(fs::read_to_string(config.settings_path()).unwrap(), TEMPLATE);
    assert_eq!(settings["max_players"], json!(0));
}

#[test]
fn given_existing_settings_when_load_then_template_ignored() {
    let dir = tempdir().unwrap();
    let config = install(dir.path());
    fs::write(config.settings_path(), r#"{"max_players": 8}"#).unwrap();

    let settings = load(
        &config.config_dir(),
        &config.settings_file,
        &config.settings_template_path(),
    )
    .unwrap();

    assert_eq!(settings["max_players"], json!(8));
    assert!(settings.get("visibility").is_none());
}

#[test]
fn given_invalid_json_when_load_then_decode_error() {
    let dir = tempdir().unwrap();
    let config = install(dir.path());
    fs::write(config.settings_path(), "{ not json").unwrap();

    let result = load(
        &config.config_dir(),
        &config.settings_file,
        &config.settings_template_path(),
    );
    assert!(matches!(result, Err(SettingsError::Decode { .. })));
}

#[test]
fn given_missing_template_when_load_then_read_error() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("config")).unwrap();

    let result = load(
        &dir.path().join("config"),
        "server-settings.json",
        &dir.path().join("nope.json"),
    );
    assert!(matches!(result, Err(SettingsError::Read { .. })));
}

/// **VALUE**: Verifies the admin list is created empty and injected.
///
/// **BUG THIS CATCHES**: Would catch the admin file not being created, which
/// makes the game fail on `--server-adminlist <missing file>`.
#[test]
fn given_new_version_without_admin_file_when_loading_then_creates_and_injects_empty_list() {
    // GIVEN: A fresh install and a version above the gate
    let dir = tempdir().unwrap();
    let config = install(dir.path());

    // WHEN: Loading settings with admins
    let settings = load_with_admins(&config, &Version::new(1, 1, 0, 0)).unwrap();

    // THEN: The file exists with [] and the key is set
    assert_eq!(fs::read_to_string(config.admin_list_path()).unwrap(), "[]");
    assert_eq!(settings[ADMINS_KEY], json!([]));
}

#[test]
fn given_old_version_when_loading_then_admin_list_untouched() {
    let dir = tempdir().unwrap();
    let config = install(dir.path());

    let settings = load_with_admins(&config, &Version::new(0, 17, 0, 0)).unwrap();

    assert!(!config.admin_list_path().exists());
    assert!(settings.get(ADMINS_KEY).is_none());
}

#[test]
fn given_existing_admin_list_when_loaded_then_decoded() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("admins.json");
    fs::write(&path, r#"["alice", "bob"]"#).unwrap();

    assert_eq!(load_admin_list(&path).unwrap(), json!(["alice", "bob"]));
}

/// **VALUE**: Verifies a broken admin list during reload keeps the old one.
///
/// **WHY THIS MATTERS**: Reload runs while the server is live; a typo in the
/// admin file must not drop every admin.
///
/// **BUG THIS CATCHES**: Would catch the reload failing outright, or
/// replacing the admins with nothing.
#[test]
fn given_corrupt_admin_list_when_reloading_then_previous_admins_kept() {
    // GIVEN: Settings with admins, then a corrupted admin file
    let dir = tempdir().unwrap();
    let config = install(dir.path());
    let version = Version::new(1, 1, 0, 0);
    fs::write(config.admin_list_path(), r#"["alice"]"#).unwrap();
    let previous = load_with_admins(&config, &version).unwrap();
    fs::write(config.admin_list_path(), "[\"alice\",").unwrap();

    // WHEN: Reloading
    let reloaded = reload(&config, &version, &previous).unwrap();

    // THEN: The earlier admin list survives
    assert_eq!(reloaded[ADMINS_KEY], json!(["alice"]));
}

/// **VALUE**: Verifies persisted settings are two-space pretty JSON and
/// keep unknown keys.
///
/// **BUG THIS CATCHES**: Would catch compact output, or a typed struct
/// dropping keys the manager does not know about.
#[test]
fn given_settings_with_unknown_keys_when_persisted_then_pretty_and_complete() {
    // GIVEN: A document with nested unknown keys
    let dir = tempdir().unwrap();
    let path = dir.path().join("server-settings.json");
    let mut settings = SettingsDocument::new();
    settings.insert("future_option".into(), json!({ "nested": [1, 2] }));
    apply_admin_list(&mut settings, json!(["alice"]));

    // WHEN: Persisting
    persist(&settings, &path).unwrap();

    // THEN: Pretty-printed and round-trips
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("\n  \"admins\": [\n    \"alice\"\n  ]"));
    let decoded: Value = serde_json::from_str(&written).unwrap();
    assert_eq!(decoded["future_option"]["nested"], json!([1, 2]));
    assert!(!path.with_file_name("server-settings.json.tmp").exists());
}
