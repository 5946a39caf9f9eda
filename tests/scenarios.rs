//! End-to-end breaker behavior through the public API.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use circuit_gate::resilience::ManualClock;
use circuit_gate::{CallError, CircuitBreaker, CircuitBreakerConfig, Outcome, State};

mod common;
use common::{harness, io_error, settings, trip, Boom};

#[test]
fn test_opens_once_rate_crosses_threshold() {
    let h = harness(settings(30, 10, 8, 1));
    let cb = &h.breaker;

    for _ in 0..6 {
        assert!(cb.try_acquire());
        cb.release_on_success();
    }
    for _ in 0..2 {
        assert!(cb.try_acquire());
        cb.release_on_error(&Boom);
    }
    // 8 samples, 25%
    assert_eq!(cb.state(), State::Closed);

    assert!(cb.try_acquire());
    cb.release_on_error(&Boom);

    // 9 samples, 33%
    assert!(!cb.try_acquire());
    assert_eq!(cb.state(), State::Open);
    assert_eq!(h.metrics.entered(State::Open), 1);
}

#[test]
fn test_single_trial_closes_breaker() {
    let h = harness(settings(100, 2, 2, 1));
    let cb = &h.breaker;

    assert!(cb.try_acquire());
    cb.release_on_error(&Boom);
    assert_eq!(cb.state(), State::Closed);

    assert!(cb.try_acquire());
    cb.release_on_error(&Boom);
    assert_eq!(cb.state(), State::Open);

    h.clock.advance(Duration::from_millis(1_000));
    assert!(cb.try_acquire());
    assert_eq!(cb.state(), State::HalfOpen);
    cb.release_on_success();

    assert_eq!(cb.state(), State::Closed);
    assert!(cb.try_acquire());
}

#[test]
fn test_open_is_sticky_for_wait_duration() {
    let h = harness(settings(50, 4, 2, 3));
    trip(&h.breaker);

    for _ in 0..9 {
        h.clock.advance(Duration::from_millis(100));
        assert!(!h.breaker.try_acquire());
        assert_eq!(h.breaker.state(), State::Open);
    }

    h.clock.advance(Duration::from_millis(100));
    assert!(h.breaker.try_acquire());
    assert_eq!(h.breaker.state(), State::HalfOpen);
    assert_eq!(h.metrics.count(Outcome::Rejected), 9);
}

#[test]
fn test_half_open_needs_consecutive_successes() {
    let h = harness(settings(50, 4, 2, 3));
    let cb = &h.breaker;
    trip(cb);
    h.clock.advance(Duration::from_secs(1));

    for _ in 0..3 {
        assert!(cb.try_acquire());
    }
    assert!(!cb.try_acquire(), "all three trial permits are out");

    cb.release_on_success();
    cb.release_on_success();
    assert_eq!(cb.state(), State::HalfOpen);
    cb.release_on_success();
    assert_eq!(cb.state(), State::Closed);
}

#[test]
fn test_failure_during_probe_reopens_and_restarts_wait() {
    let h = harness(settings(100, 4, 2, 3));
    let cb = &h.breaker;
    trip(cb);
    h.clock.advance(Duration::from_secs(1));

    assert!(cb.try_acquire());
    cb.release_on_success();
    assert!(cb.try_acquire());
    cb.release_on_error(&Boom);
    assert_eq!(cb.state(), State::Open);

    h.clock.advance(Duration::from_millis(999));
    assert!(!cb.try_acquire());
    h.clock.advance(Duration::from_millis(1));
    assert!(cb.try_acquire());

    // the earlier success does not carry over
    cb.release_on_success();
    assert_eq!(cb.state(), State::HalfOpen);
    assert_eq!(cb.snapshot().consecutive_successes, 1);
}

#[test]
fn test_ignored_errors_keep_half_open_probing() {
    let h = harness(CircuitBreakerConfig {
        failure_predicate: "ignore-io".into(),
        ..settings(50, 4, 2, 2)
    });
    let cb = &h.breaker;
    trip(cb);
    h.clock.advance(Duration::from_secs(1));

    for _ in 0..50 {
        assert!(cb.try_acquire(), "ignored errors must keep freeing permits");
        cb.release_on_error(&io_error());
        assert_eq!(cb.state(), State::HalfOpen);
    }
    assert_eq!(cb.snapshot().outstanding_permits, 0);
    assert_eq!(cb.snapshot().consecutive_successes, 0);
}

#[test]
fn test_ignored_replay_leaves_initial_state() {
    let h = harness(CircuitBreakerConfig {
        failure_predicate: "ignore-io".into(),
        ..settings(10, 5, 1, 1)
    });
    let cb = &h.breaker;
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..1_000 {
        assert!(cb.try_acquire());
        if rng.gen_bool(0.3) {
            cb.release_on_success();
        } else {
            cb.release_on_error(&io_error());
        }
    }
    assert_eq!(cb.state(), State::Closed);
    assert_eq!(cb.snapshot().failed_calls, 0);
    assert_eq!(h.metrics.entered(State::Open), 0);
}

#[test]
fn test_disabled_breaker_never_opens() {
    let h = harness(CircuitBreakerConfig {
        enabled: false,
        ..settings(1, 2, 1, 1)
    });
    for _ in 0..100 {
        assert!(h.breaker.try_acquire());
        h.breaker.release_on_error(&Boom);
        assert_eq!(h.breaker.state(), State::Closed);
    }
    let result = h.breaker.call(|| Err::<(), _>(Boom));
    assert!(matches!(result, Err(CallError::Failed(Boom))));
}

/// Closed opens exactly when the last `window` samples cross the threshold.
#[test]
fn test_closed_trip_matches_reference_model() {
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..200 {
        let window = rng.gen_range(1..=20u32);
        let minimum = rng.gen_range(1..=window);
        let threshold = rng.gen_range(0..=100u32);
        let failure_bias = rng.gen_range(0.0..1.0);

        let clock = Arc::new(ManualClock::new());
        let cb = CircuitBreaker::builder("model", settings(threshold, window, minimum, 1))
            .clock(clock)
            .build()
            .unwrap();

        let mut model: VecDeque<bool> = VecDeque::new();
        for _ in 0..60 {
            let is_failure = rng.gen_bool(failure_bias);
            if model.len() == window as usize {
                model.pop_front();
            }
            model.push_back(is_failure);

            assert!(cb.try_acquire());
            if is_failure {
                cb.release_on_error(&Boom);
            } else {
                cb.release_on_success();
            }

            let filled = model.len();
            let failures = model.iter().filter(|f| **f).count();
            let should_open =
                is_failure && filled >= minimum as usize && (failures * 100 / filled) as u32 >= threshold;

            if should_open {
                assert_eq!(cb.state(), State::Open, "window={window} min={minimum} threshold={threshold}");
                break;
            }
            assert_eq!(cb.state(), State::Closed, "window={window} min={minimum} threshold={threshold}");
        }
    }
}

#[test]
fn test_not_permitted_carries_name_and_state() {
    let h = harness(settings(50, 2, 2, 1));
    trip(&h.breaker);

    let err = h.breaker.acquire().unwrap_err();
    assert_eq!(err.name, "backend");
    assert_eq!(err.state, State::Open);

    let err = h.breaker.call(|| Ok::<_, Boom>(1)).unwrap_err();
    assert!(err.is_not_permitted());
}
