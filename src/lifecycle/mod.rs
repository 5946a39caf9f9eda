//! Lifecycle management for the `circuit-gate` binary.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast to simulation loop and config reload task → exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
