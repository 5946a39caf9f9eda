//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define the sink breakers report state entries and outcomes to
//! - Forward to the `metrics` facade for Prometheus exposition
//!
//! # Metrics
//! - `circuit_breaker_state` (gauge): 0=closed, 1=open, 2=half-open, by breaker
//! - `circuit_breaker_calls_total` (counter): outcomes by breaker and kind
//! - `circuit_breaker_transitions_total` (counter): state entries by breaker and state
//!
//! # Design Decisions
//! - Sinks are fire-and-forget; they must not block or panic
//! - Breakers notify only after a transition has been committed

use std::fmt;
use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::state::State;

/// What happened to one call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Failure,
    Ignored,
    Rejected,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Ignored => "ignored",
            Outcome::Rejected => "rejected",
        }
    }
}

/// Observer of a breaker's activity.
pub trait CircuitBreakerMetrics: Send + Sync + fmt::Debug {
    /// The breaker `name` entered `state`.
    fn on_state_entered(&self, _name: &str, _state: State) {}

    /// A call on breaker `name` finished (or was refused) with `outcome`.
    fn on_outcome(&self, _name: &str, _outcome: Outcome) {}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl CircuitBreakerMetrics for NoopMetrics {}

/// Reports through the global `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusMetrics;

impl CircuitBreakerMetrics for PrometheusMetrics {
    fn on_state_entered(&self, name: &str, state: State) {
        metrics::gauge!("circuit_breaker_state", "breaker" => name.to_string()).set(state_gauge(state));
        metrics::counter!(
            "circuit_breaker_transitions_total",
            "breaker" => name.to_string(),
            "state" => state.as_str()
        )
        .increment(1);
    }

    fn on_outcome(&self, name: &str, outcome: Outcome) {
        metrics::counter!(
            "circuit_breaker_calls_total",
            "breaker" => name.to_string(),
            "kind" => outcome.as_str()
        )
        .increment(1);
    }
}

fn state_gauge(state: State) -> f64 {
    match state {
        State::Closed => 0.0,
        State::Open => 1.0,
        State::HalfOpen => 2.0,
    }
}

/// Install the Prometheus recorder and its HTTP scrape listener.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}
