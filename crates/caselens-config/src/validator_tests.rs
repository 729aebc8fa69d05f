use super::*;
use crate::schema::{CacheConfig, FeaturesConfig};

#[test]
fn test_default_config_is_valid() {
    let result = ConfigValidator::validate(&Config::default());
    assert!(result.is_valid());
    assert!(result.warnings.is_empty());
}

#[test]
fn test_zero_max_age_is_error() {
    let mut config = Config::default();
    config.cache = CacheConfig {
        max_age_days: 0,
        ..Default::default()
    };
    let result = ConfigValidator::validate(&config);
    assert!(!result.is_valid());
    assert!(result.errors.iter().any(|e| e.path == "cache.max_age_days"));
}

#[test]
fn test_trim_threshold_out_of_range() {
    let mut config = Config::default();
    config.cache.trim_threshold = 1.5;
    let result = ConfigValidator::validate(&config);
    assert!(result.errors.iter().any(|e| e.path == "cache.trim_threshold"));

    config.cache.trim_threshold = 0.0;
    let result = ConfigValidator::validate(&config);
    assert!(result.errors.iter().any(|e| e.path == "cache.trim_threshold"));
}

#[test]
fn test_zero_ready_attempts_warns() {
    let mut config = Config::default();
    config.controller.ready_max_attempts = 0;
    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid());
    assert!(
        result
            .warnings
            .iter()
            .any(|w| w.path == "controller.ready_max_attempts")
    );
}

#[test]
fn test_presence_stale_window_warns() {
    let mut config = Config::default();
    config.presence.stale_after_ms = 1_000;
    let result = ConfigValidator::validate(&config);
    assert!(result.warnings.iter().any(|w| w.path == "presence.stale_after_ms"));
}

#[test]
fn test_disabled_presence_skips_checks() {
    let mut config = Config::default();
    config.presence.enabled = false;
    config.presence.heartbeat_interval_ms = 0;
    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid());
}

#[test]
fn test_feature_conflict() {
    let mut config = Config::default();
    config.features = FeaturesConfig {
        enabled: vec!["highlight".to_string()],
        disabled: vec!["highlight".to_string()],
    };
    let result = ConfigValidator::validate(&config);
    assert!(!result.is_valid());
    assert!(result.errors[0].message.contains("highlight"));
}
