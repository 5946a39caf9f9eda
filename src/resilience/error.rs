//! Errors raised at the breaker boundary.

use thiserror::Error;

use crate::config::validation::{join_errors, ValidationError};
use crate::resilience::state::State;

/// The breaker refused a call. Routine, not a fault: do not call the
/// protected resource now.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit breaker '{name}' is {state} and does not permit further calls")]
pub struct CallNotPermitted {
    pub name: String,
    pub state: State,
}

/// Outcome of a guarded call that did not produce a value.
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// The breaker rejected the call; the operation never ran.
    #[error(transparent)]
    NotPermitted(#[from] CallNotPermitted),

    /// The operation ran and returned this error, unchanged.
    #[error("{0}")]
    Failed(E),
}

impl<E> CallError<E> {
    pub fn is_not_permitted(&self) -> bool {
        matches!(self, CallError::NotPermitted(_))
    }

    /// The operation's own error, if it ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CallError::Failed(e) => Some(e),
            CallError::NotPermitted(_) => None,
        }
    }
}

/// A breaker could not be constructed.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid settings for '{name}': {}", join_errors(.errors))]
    InvalidConfig {
        name: String,
        errors: Vec<ValidationError>,
    },

    #[error("unknown failure predicate '{predicate}' for '{name}'")]
    UnknownPredicate { name: String, predicate: String },
}
