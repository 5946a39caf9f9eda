//! Breaker state machine.
//!
//! # State Transitions
//! ```text
//! Closed → Open:      failure release makes the window rate >= threshold
//! Open → Half-Open:   acquire after the open wait has elapsed (first trial)
//! Half-Open → Closed: permitted_calls consecutive successful trials
//! Half-Open → Open:   any counted failure during a trial
//! ```
//!
//! Everything here is pure: a [`StateRecord`] plus an [`Event`] yields a
//! [`Step`] describing the next record. The breaker commits steps with a
//! compare-and-swap, so no caller sees a half-applied transition.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::CircuitBreakerConfig;
use crate::resilience::sliding_window::SlidingWindow;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    /// Calls pass through and outcomes feed the sliding window.
    Closed,
    /// Calls are rejected until the open wait elapses.
    Open,
    /// A bounded number of trial calls decide between Closed and Open.
    HalfOpen,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Closed => "CLOSED",
            State::Open => "OPEN",
            State::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A caller asks for a permit.
    Acquire { now: Instant },
    /// A permitted call returned normally.
    Success,
    /// A permitted call failed and the predicate counted it.
    Failure { now: Instant },
    /// A permitted call failed and the predicate ignored it.
    Ignored,
}

/// A committed state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: State,
    pub to: State,
    /// Window failure rate that tripped a Closed → Open change.
    pub failure_rate: Option<u32>,
}

/// Result of applying one event.
#[derive(Debug, Clone)]
pub struct Step {
    /// Replacement record, or `None` when the event changes nothing.
    pub next: Option<StateRecord>,
    /// Whether an `Acquire` was granted. Always `true` for releases.
    pub permitted: bool,
    pub transition: Option<Transition>,
}

impl Step {
    fn unchanged(permitted: bool) -> Self {
        Self {
            next: None,
            permitted,
            transition: None,
        }
    }

    fn update(next: StateRecord, permitted: bool) -> Self {
        Self {
            next: Some(next),
            permitted,
            transition: None,
        }
    }

    fn transition(next: StateRecord, permitted: bool, from: State, failure_rate: Option<u32>) -> Self {
        let to = next.state;
        Self {
            next: Some(next),
            permitted,
            transition: Some(Transition {
                from,
                to,
                failure_rate,
            }),
        }
    }
}

/// Immutable snapshot of everything a breaker mutates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRecord {
    pub state: State,
    pub window: SlidingWindow,
    /// In-flight trial calls while half-open.
    pub outstanding_permits: u32,
    /// Successful trials since entering half-open.
    pub consecutive_successes: u32,
    /// When the breaker last entered Open.
    pub opened_at: Option<Instant>,
}

impl StateRecord {
    /// Closed, empty window, zeroed counters.
    pub fn initial(config: &CircuitBreakerConfig) -> Self {
        Self {
            state: State::Closed,
            window: SlidingWindow::new(
                config.sliding_window_size as usize,
                config.minimum_number_of_calls as usize,
            ),
            outstanding_permits: 0,
            consecutive_successes: 0,
            opened_at: None,
        }
    }

    /// Apply `event` under `config`.
    pub fn step(&self, event: Event, config: &CircuitBreakerConfig) -> Step {
        match (self.state, event) {
            (State::Closed, Event::Acquire { .. }) => Step::unchanged(true),
            (State::Closed, Event::Success) => {
                let mut next = self.clone();
                next.window.record(false);
                Step::update(next, true)
            }
            (State::Closed, Event::Failure { now }) => {
                let mut next = self.clone();
                next.window.record(true);
                match next.window.failure_rate_percent() {
                    Some(rate) if rate >= config.failure_rate_threshold => {
                        Step::transition(next.into_open(now), true, State::Closed, Some(rate))
                    }
                    _ => Step::update(next, true),
                }
            }

            (State::Open, Event::Acquire { now }) => {
                let elapsed = self
                    .opened_at
                    .map(|at| now.saturating_duration_since(at) >= config.wait_duration_in_open_state())
                    .unwrap_or(true);
                if !elapsed {
                    return Step::unchanged(false);
                }
                let mut next = self.clone();
                next.state = State::HalfOpen;
                next.window.reset();
                next.consecutive_successes = 0;
                // this caller holds the first trial permit
                next.outstanding_permits = 1;
                Step::transition(next, true, State::Open, None)
            }
            // No permit can be held while open except one granted in Closed
            // just before the trip; its outcome is stale.
            (State::Open, _) => Step::unchanged(true),

            (State::HalfOpen, Event::Acquire { .. }) => {
                if self.outstanding_permits >= config.permitted_calls_in_half_open_state {
                    return Step::unchanged(false);
                }
                let mut next = self.clone();
                next.outstanding_permits += 1;
                Step::update(next, true)
            }
            (State::HalfOpen, Event::Success) => {
                let successes = self.consecutive_successes.saturating_add(1);
                if successes >= config.permitted_calls_in_half_open_state {
                    let mut next = self.clone();
                    next.state = State::Closed;
                    next.window.reset();
                    next.outstanding_permits = 0;
                    next.consecutive_successes = 0;
                    next.opened_at = None;
                    return Step::transition(next, true, State::HalfOpen, None);
                }
                let mut next = self.clone();
                next.outstanding_permits = next.outstanding_permits.saturating_sub(1);
                next.consecutive_successes = successes;
                Step::update(next, true)
            }
            (State::HalfOpen, Event::Failure { now }) => {
                Step::transition(self.clone().into_open(now), true, State::HalfOpen, None)
            }
            (State::HalfOpen, Event::Ignored) => {
                if self.outstanding_permits == 0 {
                    return Step::unchanged(true);
                }
                let mut next = self.clone();
                next.outstanding_permits -= 1;
                Step::update(next, true)
            }

            (State::Closed, Event::Ignored) => Step::unchanged(true),
        }
    }

    fn into_open(mut self, now: Instant) -> Self {
        self.state = State::Open;
        self.opened_at = Some(now);
        self.outstanding_permits = 0;
        self.consecutive_successes = 0;
        self
    }
}
