//! Resilience subsystem: the circuit breaker core.
//!
//! # Data Flow
//! ```text
//! Caller:
//!     → circuit_breaker.rs try_acquire (state.rs decides, CAS commits)
//!     → caller runs the protected operation
//!     → release_on_success / release_on_error
//!         → predicate.rs (counted or ignored)
//!         → state.rs (sliding_window.rs in Closed, trial counters in Half-Open)
//!     → observability sink notified of committed transitions
//! ```
//!
//! # Design Decisions
//! - Breaker never performs the protected call itself unless handed a closure
//! - State is in-process only; nothing is persisted or shared across instances
//! - Half-open accounting is separate from the failure-rate window

pub mod circuit_breaker;
pub mod clock;
pub mod error;
pub mod predicate;
pub mod registry;
pub mod sliding_window;
pub mod state;

pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitBreakerBuilder, Permit};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{BuildError, CallError, CallNotPermitted};
pub use predicate::{CountAllErrors, FailurePredicate, FnPredicate, IgnoreIoErrors, PredicateRegistry};
pub use registry::{CircuitBreakerRegistry, ReloadSummary};
pub use sliding_window::SlidingWindow;
pub use state::State;
