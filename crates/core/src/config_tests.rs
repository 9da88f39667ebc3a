// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[test]
fn defaults_match_reference_values() {
    let config = Config::default();
    assert_eq!(config.max_concurrent, 3);
    assert_eq!(config.stage_timeout(), Duration::from_secs(600));
    assert_eq!(config.stop_grace(), Duration::from_secs(10));
    assert_eq!(config.sampler_interval(), Duration::from_secs(5));
    assert_eq!(config.sentinel.yellow_threshold, 80.0);
    assert_eq!(config.sentinel.red_threshold, 90.0);
    assert_eq!(config.sentinel_poll(), Duration::from_secs(5));
}

#[test]
fn load_reads_partial_toml_over_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foundry.toml");
    std::fs::write(
        &path,
        r#"
max_concurrent = 5
stage_timeout_secs = 120

[sentinel]
yellow_threshold = 70.0
red_threshold = 85.0

[sandbox.builder]
command = "builder-agent"
"#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.max_concurrent, 5);
    assert_eq!(config.stage_timeout_secs, 120);
    assert_eq!(config.sentinel.yellow_threshold, 70.0);
    assert_eq!(config.sentinel.red_threshold, 85.0);
    assert_eq!(config.sandbox.builder.command, "builder-agent");
    // untouched sections keep defaults
    assert_eq!(config.sampler.interval_secs, 5);
    assert_eq!(config.sandbox.checker.command, "foundry-checker");
}

#[test]
fn load_rejects_unknown_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foundry.toml");
    std::fs::write(&path, "max_concurent = 3\n").unwrap();

    assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
}

#[test]
fn load_missing_file_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.toml");
    assert!(matches!(Config::load(&path), Err(ConfigError::Read { .. })));
}

#[test]
fn validate_rejects_zero_concurrency() {
    let config = Config { max_concurrent: 0, ..Config::default() };
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn validate_rejects_inverted_thresholds() {
    let mut config = Config::default();
    config.sentinel.yellow_threshold = 95.0;
    config.sentinel.red_threshold = 90.0;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn equal_thresholds_are_valid() {
    let mut config = Config::default();
    config.sentinel.yellow_threshold = 90.0;
    config.sentinel.red_threshold = 90.0;
    assert!(config.validate().is_ok());
}
