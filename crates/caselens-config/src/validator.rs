//! Configuration validation.

use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_cache(config, &mut result);
        Self::validate_controller(config, &mut result);
        Self::validate_presence(config, &mut result);
        Self::validate_features(config, &mut result);

        result
    }

    fn validate_cache(config: &Config, result: &mut ValidationResult) {
        let cache = &config.cache;

        if cache.max_age_days == 0 {
            result.add_error(ValidationError::new(
                "cache.max_age_days",
                "max_age_days must be greater than 0",
            ));
        }

        if !(cache.trim_threshold > 0.0 && cache.trim_threshold <= 1.0) {
            result.add_error(ValidationError::new(
                "cache.trim_threshold",
                "trim_threshold must be within (0, 1]",
            ));
        }

        if cache.capacity_bytes == 0 {
            result.add_error(ValidationError::new(
                "cache.capacity_bytes",
                "capacity_bytes must be greater than 0",
            ));
        }

        if cache.key_prefix.is_empty() {
            result.add_error(ValidationError::new(
                "cache.key_prefix",
                "key_prefix cannot be empty",
            ));
        }
    }

    fn validate_controller(config: &Config, result: &mut ValidationResult) {
        let controller = &config.controller;

        if controller.ready_poll_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "controller.ready_poll_interval_ms",
                "ready_poll_interval_ms must be greater than 0",
            ));
        }

        if controller.ready_max_attempts == 0 {
            result.add_warning(ValidationWarning::new(
                "controller.ready_max_attempts",
                "ready_max_attempts is 0, features will always activate in degraded mode",
            ));
        }

        if controller.case_ready_markers.is_empty() {
            result.add_warning(ValidationWarning::new(
                "controller.case_ready_markers",
                "No case ready markers, case pages are treated as ready immediately",
            ));
        }
    }

    fn validate_presence(config: &Config, result: &mut ValidationResult) {
        let presence = &config.presence;
        if !presence.enabled {
            return;
        }

        if presence.heartbeat_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "presence.heartbeat_interval_ms",
                "heartbeat_interval_ms must be greater than 0",
            ));
        }

        if presence.stale_after_ms <= presence.heartbeat_interval_ms {
            result.add_warning(ValidationWarning::new(
                "presence.stale_after_ms",
                "stale_after_ms should exceed heartbeat_interval_ms or peers will flicker",
            ));
        }
    }

    fn validate_features(config: &Config, result: &mut ValidationResult) {
        for name in &config.features.enabled {
            if config.features.disabled.contains(name) {
                result.add_error(ValidationError::new(
                    "features",
                    format!("Feature '{}' is both enabled and disabled", name),
                ));
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
