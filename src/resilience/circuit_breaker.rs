//! Circuit breaker for protecting a failing resource.
//!
//! # States
//! - Closed: normal operation, calls pass through and feed the sliding window
//! - Open: resource assumed down, calls fail fast
//! - Half-Open: a bounded number of trial calls probe for recovery
//!
//! # Protocol
//! ```text
//! try_acquire / acquire ──▶ caller runs the operation ──▶ release_on_success
//!                                                      └─▶ release_on_error(e)
//!                                                            └─ FailurePredicate decides counted/ignored
//! ```
//!
//! # Design Decisions
//! - One breaker per protected resource, owned by whoever builds it
//! - All mutable fields live in one immutable [`StateRecord`] swapped with
//!   compare-and-swap; the hot path never takes a lock
//! - Transitions are decided by the pure [`StateRecord::step`]; logging and
//!   metrics happen only after a swap has been committed
//! - Hot-path operations are total: they never panic or return errors

use std::error::Error;
use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::config::validation::validate_breaker;
use crate::config::CircuitBreakerConfig;
use crate::observability::metrics::{CircuitBreakerMetrics, NoopMetrics, Outcome};
use crate::resilience::clock::{Clock, SystemClock};
use crate::resilience::error::{BuildError, CallError, CallNotPermitted};
use crate::resilience::predicate::{FailurePredicate, PredicateRegistry};
use crate::resilience::state::{Event, State, StateRecord, Transition};

/// A concurrency-safe failure gate.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    record: ArcSwap<StateRecord>,
    predicate: Arc<dyn FailurePredicate>,
    metrics: Arc<dyn CircuitBreakerMetrics>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    /// Build with the built-in predicates, no metrics, and the system clock.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Result<Self, BuildError> {
        Self::builder(name, config).build()
    }

    pub fn builder(name: impl Into<String>, config: CircuitBreakerConfig) -> CircuitBreakerBuilder {
        CircuitBreakerBuilder {
            name: name.into(),
            config,
            predicate: None,
            predicates: None,
            metrics: None,
            clock: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state. Never blocks.
    pub fn state(&self) -> State {
        self.record.load().state
    }

    /// Ask for permission to run one call.
    ///
    /// May move Open to Half-Open when the open wait has elapsed; the caller
    /// that performs that move holds the first trial permit.
    pub fn try_acquire(&self) -> bool {
        if !self.config.enabled {
            return true;
        }
        let now = self.clock.now();
        let permitted = self.apply(Event::Acquire { now }).permitted;
        if !permitted {
            tracing::debug!(breaker = %self.name, state = %self.state(), "Call not permitted");
            self.metrics.on_outcome(&self.name, Outcome::Rejected);
        }
        permitted
    }

    /// [`try_acquire`](Self::try_acquire), as an error.
    pub fn acquire(&self) -> Result<(), CallNotPermitted> {
        if self.try_acquire() {
            Ok(())
        } else {
            Err(self.not_permitted())
        }
    }

    /// Report that a permitted call returned normally.
    pub fn release_on_success(&self) {
        if !self.config.enabled {
            return;
        }
        let applied = self.apply(Event::Success);
        self.report_release(applied, Outcome::Success);
    }

    /// Report that a permitted call failed with `error`.
    ///
    /// The bound predicate decides whether it counts; ignored errors only
    /// free a half-open trial slot.
    pub fn release_on_error(&self, error: &(dyn Error + 'static)) {
        if !self.config.enabled {
            return;
        }
        if self.predicate.test(error) {
            let now = self.clock.now();
            let applied = self.apply(Event::Failure { now });
            self.report_release(applied, Outcome::Failure);
        } else {
            tracing::trace!(
                breaker = %self.name,
                error = %error,
                "Error ignored by failure predicate"
            );
            self.release_ignored();
        }
    }

    /// Give a permit back without recording an outcome.
    pub(crate) fn release_ignored(&self) {
        if !self.config.enabled {
            return;
        }
        self.apply(Event::Ignored);
        self.metrics.on_outcome(&self.name, Outcome::Ignored);
    }

    /// RAII form of [`try_acquire`](Self::try_acquire).
    pub fn try_acquire_permit(&self) -> Option<Permit<'_>> {
        self.try_acquire().then(|| Permit {
            breaker: self,
            released: false,
        })
    }

    /// RAII form of [`acquire`](Self::acquire).
    pub fn acquire_permit(&self) -> Result<Permit<'_>, CallNotPermitted> {
        self.try_acquire_permit().ok_or_else(|| self.not_permitted())
    }

    /// Run `f` under the breaker.
    ///
    /// Rejected calls never run `f`. Errors from `f` are recorded, then
    /// handed back unchanged in [`CallError::Failed`]. A panic in `f`
    /// releases the permit as ignored.
    pub fn call<T, E, F>(&self, f: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        E: Error + 'static,
    {
        let permit = self.acquire_permit()?;
        match f() {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(e) => {
                permit.error(&e);
                Err(CallError::Failed(e))
            }
        }
    }

    /// Async form of [`call`](Self::call). Dropping the returned future
    /// mid-flight releases the permit as ignored.
    pub async fn call_async<T, E, F, Fut>(&self, f: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        let permit = self.acquire_permit()?;
        match f().await {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(e) => {
                permit.error(&e);
                Err(CallError::Failed(e))
            }
        }
    }

    /// Point-in-time view for health reporting.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let record = self.record.load();
        let open_remaining_ms = match (record.state, record.opened_at) {
            (State::Open, Some(at)) => {
                let elapsed = self.clock.now().saturating_duration_since(at);
                let remaining = self.config.wait_duration_in_open_state().saturating_sub(elapsed);
                Some(u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX))
            }
            _ => None,
        };

        BreakerSnapshot {
            name: self.name.clone(),
            enabled: self.config.enabled,
            state: record.state,
            failure_rate: record.window.failure_rate_percent(),
            buffered_calls: record.window.buffered_calls(),
            failed_calls: record.window.failed_calls(),
            outstanding_permits: record.outstanding_permits,
            consecutive_successes: record.consecutive_successes,
            open_remaining_ms,
        }
    }

    fn not_permitted(&self) -> CallNotPermitted {
        CallNotPermitted {
            name: self.name.clone(),
            state: self.state(),
        }
    }

    /// A release dropped while Open never reached the window.
    fn report_release(&self, applied: Applied, outcome: Outcome) {
        if applied.recorded {
            self.metrics.on_outcome(&self.name, outcome);
        } else {
            tracing::debug!(
                breaker = %self.name,
                ?outcome,
                "Stale release dropped while open"
            );
            self.metrics.on_outcome(&self.name, Outcome::Ignored);
        }
    }

    /// Commit `event` with a compare-and-swap retry loop.
    fn apply(&self, event: Event) -> Applied {
        let mut current = self.record.load();
        loop {
            let step = current.step(event, &self.config);
            let Some(next) = step.next else {
                return Applied {
                    permitted: step.permitted,
                    recorded: false,
                };
            };

            let prev = self.record.compare_and_swap(&*current, Arc::new(next));
            if Arc::ptr_eq(&*prev, &*current) {
                if let Some(transition) = step.transition {
                    self.on_transition(transition);
                }
                return Applied {
                    permitted: step.permitted,
                    recorded: true,
                };
            }
            current = prev;
        }
    }

    fn on_transition(&self, transition: Transition) {
        match transition.to {
            State::Open => tracing::warn!(
                breaker = %self.name,
                from = %transition.from,
                to = %transition.to,
                failure_rate = ?transition.failure_rate,
                wait_ms = self.config.wait_duration_in_open_state_ms,
                "Circuit breaker opened"
            ),
            _ => tracing::info!(
                breaker = %self.name,
                from = %transition.from,
                to = %transition.to,
                "Circuit breaker state transition"
            ),
        }
        self.metrics.on_state_entered(&self.name, transition.to);
    }
}

/// What committing one event did.
#[derive(Debug, Clone, Copy)]
struct Applied {
    permitted: bool,
    /// A new record was swapped in.
    recorded: bool,
}

/// Configures optional collaborators of a [`CircuitBreaker`].
pub struct CircuitBreakerBuilder {
    name: String,
    config: CircuitBreakerConfig,
    predicate: Option<Arc<dyn FailurePredicate>>,
    predicates: Option<PredicateRegistry>,
    metrics: Option<Arc<dyn CircuitBreakerMetrics>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CircuitBreakerBuilder {
    /// Bind this predicate, bypassing `failure_predicate` lookup.
    pub fn predicate(mut self, predicate: Arc<dyn FailurePredicate>) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Resolve `failure_predicate` against this registry instead of the built-ins.
    pub fn predicates(mut self, registry: PredicateRegistry) -> Self {
        self.predicates = Some(registry);
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn CircuitBreakerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<CircuitBreaker, BuildError> {
        validate_breaker(&self.name, &self.config).map_err(|errors| BuildError::InvalidConfig {
            name: self.name.clone(),
            errors,
        })?;

        let predicate = match self.predicate {
            Some(predicate) => predicate,
            None => self
                .predicates
                .unwrap_or_default()
                .get(&self.config.failure_predicate)
                .ok_or_else(|| BuildError::UnknownPredicate {
                    name: self.name.clone(),
                    predicate: self.config.failure_predicate.clone(),
                })?,
        };

        let record = StateRecord::initial(&self.config);
        Ok(CircuitBreaker {
            name: self.name,
            config: self.config,
            record: ArcSwap::from_pointee(record),
            predicate,
            metrics: self.metrics.unwrap_or_else(|| Arc::new(NoopMetrics)),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        })
    }
}

/// Outstanding permission to run one call.
///
/// Report the outcome with [`success`](Self::success) or
/// [`error`](Self::error). Dropping an unreported permit releases it as
/// ignored so a half-open trial slot is never leaked.
#[must_use = "dropping a permit releases it without recording an outcome"]
#[derive(Debug)]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    released: bool,
}

impl Permit<'_> {
    pub fn success(mut self) {
        self.released = true;
        self.breaker.release_on_success();
    }

    pub fn error(mut self, error: &(dyn Error + 'static)) {
        self.released = true;
        self.breaker.release_on_error(error);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.breaker.release_ignored();
        }
    }
}

/// Serializable view of a breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub enabled: bool,
    pub state: State,
    /// `None` until the window holds `minimum_number_of_calls` samples.
    pub failure_rate: Option<u32>,
    pub buffered_calls: usize,
    pub failed_calls: usize,
    pub outstanding_permits: u32,
    pub consecutive_successes: u32,
    pub open_remaining_ms: Option<u64>,
}
