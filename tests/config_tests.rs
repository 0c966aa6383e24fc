// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use survey_camera::Config;

#[test]
fn test_config_default() {
    // Test that default config can be created
    let config = Config::default();

    // Check sensible defaults
    assert_eq!(
        config.fallback_location, "Location unavailable",
        "Fallback text should match the unresolved-location sentinel"
    );
    assert!(config.jpeg_quality > 0 && config.jpeg_quality <= 100);
}

#[test]
fn test_config_desktop_id() {
    // Test that the location-service desktop id is set
    let config = Config::default();
    assert!(
        !config.desktop_id.is_empty(),
        "Desktop id should not be empty"
    );
}

#[test]
fn test_config_missing_file_uses_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let loaded = Config::load_from(&tmp.path().join("does-not-exist.json"));
    assert_eq!(loaded, Config::default());
}
