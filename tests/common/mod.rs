//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use circuit_gate::resilience::ManualClock;
use circuit_gate::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, Outcome, State};

/// An error every default predicate counts.
#[derive(Debug, thiserror::Error)]
#[error("backend returned 503")]
pub struct Boom;

/// An error the `ignore-io` predicate skips.
pub fn io_error() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")
}

/// Metrics sink that remembers everything.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    pub states: Mutex<Vec<State>>,
    pub outcomes: Mutex<Vec<Outcome>>,
}

impl RecordingMetrics {
    pub fn entered(&self, state: State) -> usize {
        self.states.lock().unwrap().iter().filter(|s| **s == state).count()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.lock().unwrap().iter().filter(|o| **o == outcome).count()
    }
}

impl CircuitBreakerMetrics for RecordingMetrics {
    fn on_state_entered(&self, _name: &str, state: State) {
        self.states.lock().unwrap().push(state);
    }

    fn on_outcome(&self, _name: &str, outcome: Outcome) {
        self.outcomes.lock().unwrap().push(outcome);
    }
}

/// Settings with the given threshold, window, minimum calls and half-open permits.
pub fn settings(threshold: u32, window: u32, minimum: u32, half_open: u32) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_rate_threshold: threshold,
        wait_duration_in_open_state_ms: 1_000,
        permitted_calls_in_half_open_state: half_open,
        sliding_window_size: window,
        minimum_number_of_calls: minimum,
        ..CircuitBreakerConfig::default()
    }
}

pub struct Harness {
    pub breaker: Arc<CircuitBreaker>,
    pub clock: Arc<ManualClock>,
    pub metrics: Arc<RecordingMetrics>,
}

/// A breaker on a manual clock with a recording sink.
pub fn harness(config: CircuitBreakerConfig) -> Harness {
    let clock = Arc::new(ManualClock::new());
    let metrics = Arc::new(RecordingMetrics::default());
    let breaker = CircuitBreaker::builder("backend", config)
        .clock(clock.clone())
        .metrics(metrics.clone())
        .build()
        .unwrap();
    Harness {
        breaker: Arc::new(breaker),
        clock,
        metrics,
    }
}

/// Acquire and report failures until the breaker opens.
pub fn trip(breaker: &CircuitBreaker) {
    for _ in 0..10_000 {
        if breaker.state() == State::Open {
            return;
        }
        assert!(breaker.try_acquire());
        breaker.release_on_error(&Boom);
    }
    panic!("breaker never opened");
}
