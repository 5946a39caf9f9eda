//! Concurrency-safe circuit breaker.
//!
//! A [`CircuitBreaker`] gates calls to a resource that may be failing: it
//! admits or rejects each attempt, learns from reported outcomes over a
//! count-based sliding window, and probes for recovery through a bounded
//! half-open phase.

pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::{AppConfig, CircuitBreakerConfig};
pub use observability::metrics::{CircuitBreakerMetrics, NoopMetrics, Outcome, PrometheusMetrics};
pub use resilience::{
    BreakerSnapshot, CallError, CallNotPermitted, CircuitBreaker, CircuitBreakerRegistry, FailurePredicate,
    Permit, PredicateRegistry, State,
};
