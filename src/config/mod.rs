//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → CircuitBreakerRegistry builds one breaker per entry
//!
//! On file change:
//!     watcher.rs detects change, waits for writes to settle
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → registry replaces breakers whose settings changed
//! ```
//!
//! # Design Decisions
//! - A breaker's settings never change after construction; reload swaps the instance
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{AppConfig, BreakerConfig, CircuitBreakerConfig, ObservabilityConfig};
pub use validation::{validate_breaker, validate_config, ValidationError};
