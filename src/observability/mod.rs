//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! CircuitBreaker
//!     → tracing events on every transition (logging.rs installs the subscriber)
//!     → CircuitBreakerMetrics sink (metrics.rs)
//!         → PrometheusMetrics → metrics facade → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Structured logging with the breaker name on every event
//! - Metrics are cheap (atomic increments behind the facade)
//! - The sink is injectable so tests can observe transitions directly

pub mod logging;
pub mod metrics;

pub use metrics::{CircuitBreakerMetrics, NoopMetrics, Outcome, PrometheusMetrics};
