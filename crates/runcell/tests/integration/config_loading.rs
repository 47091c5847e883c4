use std::path::Path;

use runcell::config::{Config, LanguageKind};

use super::FIXTURES_PATH;

#[test]
fn test_load_valid_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_full.toml");
    let config = Config::load(Some(Path::new(&path))).expect("Failed to load config");

    assert_eq!(config.port, 8080);
    assert_eq!(config.max_timeout_ms, 10_000);
    assert_eq!(config.max_concurrent, Some(4));
    assert_eq!(config.languages["ruby"].kind, LanguageKind::Interpreted);
    // Embedded languages are still present
    assert!(config.languages.contains_key("java"));
}

#[test]
fn test_load_minimal_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_minimal.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert!(config.languages.contains_key("python"));
    assert_eq!(config.default_timeout_ms, 5000);
}

#[test]
fn test_load_invalid_empty_name() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_empty_name.toml");
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_load_invalid_compiled_without_compile() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_compiled_without_compile.toml");
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_load_invalid_timeouts() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_timeouts.toml");
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_load_missing_file() {
    let path = format!("{FIXTURES_PATH}/configs/does_not_exist.toml");
    assert!(Config::from_file(&path).is_err());
    assert!(Config::load(Some(Path::new(&path))).is_err());
}
