//! Tests for the cxxgraph configuration system.

use std::sync::Mutex;

use cxxgraph_core::config::{
    ConfigOverrides, CxxgraphConfig, OverrideStrictness, ResolutionMode,
};
use cxxgraph_core::errors::ConfigError;

/// Global mutex to serialize tests that modify environment variables.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn tempdir() -> tempfile::TempDir {
    tempfile::TempDir::new().unwrap()
}

/// Clear all CXXGRAPH_ env vars and point HOME at an empty directory so a
/// developer's own user config never leaks into a test.
fn isolate_env(home: &std::path::Path) {
    for key in [
        "CXXGRAPH_SCAN_WORKERS",
        "CXXGRAPH_PARSE_TIMEOUT_MS",
        "CXXGRAPH_RESOLUTION_MODE",
        "CXXGRAPH_ACCEPTANCE_THRESHOLD",
        "CXXGRAPH_OVERRIDE_STRICTNESS",
        "CXXGRAPH_TEXTUAL_FALLBACK",
        "USERPROFILE",
    ] {
        std::env::remove_var(key);
    }
    std::env::set_var("HOME", home);
}

#[test]
fn test_defaults_without_any_layer() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let home = tempdir();
    isolate_env(home.path());

    let project = tempdir();
    let config = CxxgraphConfig::load(project.path(), None).unwrap();

    assert_eq!(config.scan.effective_workers(), 4);
    assert_eq!(config.resolution.effective_mode(), ResolutionMode::Enhanced);
    assert_eq!(config.resolution.effective_acceptance_threshold(), 2.0);
    assert_eq!(config.analysis.effective_parse_timeout_ms(), 10_000);
    assert!(config.analysis.effective_textual_fallback());
    assert_eq!(config.scan.effective_extensions().len(), 8);
}

#[test]
fn test_layered_resolution() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let home = tempdir();
    isolate_env(home.path());

    std::fs::create_dir_all(home.path().join(".cxxgraph")).unwrap();
    std::fs::write(
        home.path().join(".cxxgraph").join("config.toml"),
        r#"
[scan]
workers = 2

[resolution]
override_strictness = "signature"
"#,
    )
    .unwrap();

    let project = tempdir();
    std::fs::write(
        project.path().join("cxxgraph.toml"),
        r#"
[scan]
workers = 8

[resolution]
mode = "full"
acceptance_threshold = 3.5
"#,
    )
    .unwrap();

    std::env::set_var("CXXGRAPH_ACCEPTANCE_THRESHOLD", "4.0");

    let overrides = ConfigOverrides {
        workers: Some(16),
        ..Default::default()
    };
    let config = CxxgraphConfig::load(project.path(), Some(&overrides)).unwrap();

    // Overrides beat the project file.
    assert_eq!(config.scan.workers, Some(16));
    // Env beats the project file.
    assert_eq!(config.resolution.acceptance_threshold, Some(4.0));
    // Project file beats defaults.
    assert_eq!(config.resolution.mode, Some(ResolutionMode::Full));
    // User file survives where nothing above it spoke.
    assert_eq!(
        config.resolution.override_strictness,
        Some(OverrideStrictness::Signature)
    );

    std::env::remove_var("CXXGRAPH_ACCEPTANCE_THRESHOLD");
}

#[test]
fn test_invalid_env_mode_is_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let home = tempdir();
    isolate_env(home.path());

    std::env::set_var("CXXGRAPH_RESOLUTION_MODE", "psychic");
    let project = tempdir();
    let result = CxxgraphConfig::load(project.path(), None);
    std::env::remove_var("CXXGRAPH_RESOLUTION_MODE");

    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}

#[test]
fn test_validation_rejects_bad_values() {
    let zero_workers = CxxgraphConfig::from_toml("[scan]\nworkers = 0\n");
    assert!(matches!(
        zero_workers,
        Err(ConfigError::ValidationFailed { ref field, .. }) if field == "scan.workers"
    ));

    let negative = CxxgraphConfig::from_toml("[resolution]\nacceptance_threshold = -1.0\n");
    assert!(negative.is_err());

    let zero_timeout = CxxgraphConfig::from_toml("[analysis]\nparse_timeout_ms = 0\n");
    assert!(zero_timeout.is_err());
}

#[test]
fn test_malformed_toml_reports_parse_error() {
    let result = CxxgraphConfig::from_toml("[scan\nworkers = ");
    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

#[test]
fn test_unknown_mode_in_toml_fails_to_parse() {
    let result = CxxgraphConfig::from_toml("[resolution]\nmode = \"fuzzy\"\n");
    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

#[test]
fn test_toml_round_trip_preserves_values() {
    let config = CxxgraphConfig::from_toml(
        r#"
[analysis]
textual_fallback = false

[scan]
extensions = [".cpp", "HPP"]
"#,
    )
    .unwrap();
    assert!(!config.analysis.effective_textual_fallback());
    assert_eq!(config.scan.effective_extensions(), vec!["cpp", "hpp"]);

    let text = config.to_toml().unwrap();
    let reparsed = CxxgraphConfig::from_toml(&text).unwrap();
    assert_eq!(reparsed, config);
}

#[test]
fn test_scan_config_accepts_by_extension() {
    let config = CxxgraphConfig::default();
    assert!(config.scan.accepts(std::path::Path::new("src/shape.CPP")));
    assert!(config.scan.accepts(std::path::Path::new("include/shape.hh")));
    assert!(!config.scan.accepts(std::path::Path::new("README.md")));
    assert!(!config.scan.accepts(std::path::Path::new("Makefile")));
}
