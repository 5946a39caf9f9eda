//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every field has a default so a minimal file only names what it changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::predicate::DEFAULT_PREDICATE;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Settings for breakers created on demand, and the base every
    /// `[[breakers]]` entry is merged over when loaded from a file.
    pub defaults: CircuitBreakerConfig,

    /// Named breakers.
    pub breakers: Vec<BreakerConfig>,
}

impl AppConfig {
    /// Settings for `name`, if it is declared.
    pub fn breaker(&self, name: &str) -> Option<&CircuitBreakerConfig> {
        self.breakers
            .iter()
            .find(|b| b.name == name)
            .map(|b| &b.settings)
    }
}

/// A named breaker definition.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BreakerConfig {
    /// Identifier used for lookup, logs, and metrics labels.
    pub name: String,

    #[serde(flatten)]
    pub settings: CircuitBreakerConfig,
}

/// Settings for a single circuit breaker. Immutable once a breaker is built.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// When false every acquire succeeds and nothing is recorded.
    pub enabled: bool,

    /// Failure rate (percent, 0-100) at or above which Closed trips to Open.
    pub failure_rate_threshold: u32,

    /// Minimum time spent Open before a trial call is let through.
    pub wait_duration_in_open_state_ms: u64,

    /// Trial calls allowed while half-open, and successes needed to close.
    pub permitted_calls_in_half_open_state: u32,

    /// Number of most recent outcomes kept in the window.
    pub sliding_window_size: u32,

    /// Samples required before the failure rate is evaluated.
    pub minimum_number_of_calls: u32,

    /// Name of the failure predicate to bind.
    pub failure_predicate: String,
}

impl CircuitBreakerConfig {
    pub fn wait_duration_in_open_state(&self) -> Duration {
        Duration::from_millis(self.wait_duration_in_open_state_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_rate_threshold: 50,
            wait_duration_in_open_state_ms: 60_000,
            permitted_calls_in_half_open_state: 10,
            sliding_window_size: 100,
            minimum_number_of_calls: 100,
            failure_predicate: DEFAULT_PREDICATE.to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
