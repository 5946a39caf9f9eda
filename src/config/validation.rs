//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (threshold <= 100, window and permits >= 1)
//! - Detect duplicate breaker names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::{AppConfig, CircuitBreakerConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{scope}: failure_rate_threshold must be within 0..=100, got {value}")]
    ThresholdOutOfRange { scope: String, value: u32 },

    #[error("{scope}: sliding_window_size must be at least 1")]
    EmptyWindow { scope: String },

    #[error("{scope}: minimum_number_of_calls must be at least 1")]
    ZeroMinimumCalls { scope: String },

    #[error("{scope}: minimum_number_of_calls ({minimum}) exceeds sliding_window_size ({window})")]
    MinimumCallsExceedWindow {
        scope: String,
        minimum: u32,
        window: u32,
    },

    #[error("{scope}: permitted_calls_in_half_open_state must be at least 1")]
    NoHalfOpenPermits { scope: String },

    #[error("{scope}: failure_predicate must not be empty")]
    EmptyPredicate { scope: String },

    #[error("breaker name must not be empty")]
    EmptyName,

    #[error("duplicate breaker name: {0}")]
    DuplicateName(String),
}

/// Validate a whole configuration file.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_breaker("defaults", &config.defaults, &mut errors);

    let mut seen = HashSet::new();
    for breaker in &config.breakers {
        if breaker.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName);
            continue;
        }
        if !seen.insert(breaker.name.as_str()) {
            errors.push(ValidationError::DuplicateName(breaker.name.clone()));
        }
        check_breaker(&breaker.name, &breaker.settings, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate one breaker's settings; `scope` names it in messages.
pub fn validate_breaker(scope: &str, config: &CircuitBreakerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_breaker(scope, config, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Render errors as one comma-separated line.
pub(crate) fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn check_breaker(scope: &str, config: &CircuitBreakerConfig, errors: &mut Vec<ValidationError>) {
    let scope = scope.to_string();

    if config.failure_rate_threshold > 100 {
        errors.push(ValidationError::ThresholdOutOfRange {
            scope: scope.clone(),
            value: config.failure_rate_threshold,
        });
    }
    if config.sliding_window_size == 0 {
        errors.push(ValidationError::EmptyWindow { scope: scope.clone() });
    }
    if config.minimum_number_of_calls == 0 {
        errors.push(ValidationError::ZeroMinimumCalls { scope: scope.clone() });
    } else if config.sliding_window_size > 0 && config.minimum_number_of_calls > config.sliding_window_size {
        errors.push(ValidationError::MinimumCallsExceedWindow {
            scope: scope.clone(),
            minimum: config.minimum_number_of_calls,
            window: config.sliding_window_size,
        });
    }
    if config.permitted_calls_in_half_open_state == 0 {
        errors.push(ValidationError::NoHalfOpenPermits { scope: scope.clone() });
    }
    if config.failure_predicate.trim().is_empty() {
        errors.push(ValidationError::EmptyPredicate { scope });
    }
}
