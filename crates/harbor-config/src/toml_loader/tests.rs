//! Tests for reading and writing config files.

use super::*;
use std::path::Path;

#[test]
fn load_from_nonexistent_returns_file_not_found() {
    let result = load_from_path(Path::new("/tmp/nonexistent_harbor_config.toml"));
    assert!(matches!(
        result,
        Err(harbor_common::ConfigError::FileNotFound(_))
    ));
}

#[test]
fn load_valid_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[extensions]
dir = "/opt/harbor/extensions"
user_locale = "de_DE"

[storage]
persist_local = false
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.extensions.dir, "/opt/harbor/extensions");
    assert_eq!(config.extensions.user_locale, "de_DE");
    assert!(!config.storage.persist_local);
    // Defaults preserved
    assert_eq!(config.tabs.new_tab_url, "about:blank");
    assert_eq!(config.storage.quota_kb, 10240);
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is not valid toml {{{").unwrap();

    match load_from_path(&path) {
        Err(harbor_common::ConfigError::ParseError(msg)) => {
            assert!(msg.contains("config.toml"), "{msg}");
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn directory_in_place_of_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_from_path(dir.path()),
        Err(harbor_common::ConfigError::ParseError(_))
    ));
}

#[test]
fn load_config_with_invalid_values_is_returned_as_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[extensions]\nmax_extensions = 0\n").unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.extensions.max_extensions, 0);
}

#[test]
fn create_and_load_default_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("harbor").join("config.toml");

    create_default_config(&path).unwrap();
    assert!(path.exists());

    let config = load_from_path(&path).unwrap();
    assert!(config.extensions.enabled);
    assert_eq!(config.tabs.new_tab_url, "about:blank");
}

#[test]
fn default_template_parses_to_defaults() {
    let parsed: crate::HarborConfig =
        toml::from_str(&super::template::default_config_toml()).unwrap();
    assert_eq!(parsed.extensions.max_extensions, 64);
    assert!(crate::validation::validate(&parsed).is_ok());
}

#[test]
fn default_config_path_ends_with_harbor() {
    let path = default_config_path().unwrap();
    assert_eq!(path.file_name().unwrap().to_str().unwrap(), "config.toml");
    assert!(path.parent().unwrap().ends_with("harbor"));
}
