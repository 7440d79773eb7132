// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use sazon::Config;
use std::time::Duration;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.recipe_limit, 3, "Three recipes are requested by default");
    assert_eq!(config.recipe_ranking, 1);
    assert!(config.ignore_pantry, "Pantry staples are ignored by default");
    assert_eq!(config.settle_delay(), Duration::from_millis(200));
    assert_eq!(config.stream_ready_timeout(), Some(Duration::from_secs(5)));
    assert_eq!(config.extraction_timeout(), None);
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(&dir.path().join("config.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sazon").join("config.json");

    let config = Config {
        recipe_limit: 7,
        capture_dir: Some(dir.path().join("captures")),
        ..Config::default()
    };
    config.save_to(&path).unwrap();

    let reloaded = Config::load_from(&path).unwrap();
    assert_eq!(reloaded, config);
    assert_eq!(reloaded.capture_dir(), dir.path().join("captures"));
}

#[test]
fn test_partial_file_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"vision_model": "gemini-2.0-flash"}"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.vision_model, "gemini-2.0-flash");
    assert_eq!(config.recipe_limit, 3);
}

#[test]
fn test_invalid_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{not json").unwrap();

    assert!(Config::load_from(&path).is_err());
}

#[test]
fn test_keys_are_never_serialized() {
    let json = serde_json::to_string(&Config::default()).unwrap();
    assert!(!json.to_lowercase().contains("api_key"));
}
