//! Failure classification.
//!
//! A predicate decides whether an error reported to a breaker counts as a
//! failure or is ignored outright. A call that returns normally is always a
//! success and never reaches a predicate.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Name of the predicate bound when a config does not pick one.
pub const DEFAULT_PREDICATE: &str = "default";

/// Name of the built-in predicate that ignores I/O errors.
pub const IGNORE_IO_PREDICATE: &str = "ignore-io";

/// Classifies errors for a circuit breaker.
///
/// Implementations must be pure: no side effects, no panics.
pub trait FailurePredicate: Send + Sync + fmt::Debug {
    /// `true` if `error` counts as a failure, `false` if it must be ignored.
    fn test(&self, error: &(dyn Error + 'static)) -> bool;
}

/// Counts every error as a failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountAllErrors;

impl FailurePredicate for CountAllErrors {
    fn test(&self, _error: &(dyn Error + 'static)) -> bool {
        true
    }
}

/// Ignores errors caused by `std::io::Error` anywhere in the source chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreIoErrors;

impl FailurePredicate for IgnoreIoErrors {
    fn test(&self, error: &(dyn Error + 'static)) -> bool {
        let mut current = Some(error);
        while let Some(err) = current {
            if err.is::<std::io::Error>() {
                return false;
            }
            current = err.source();
        }
        true
    }
}

/// Adapts a closure into a predicate.
pub struct FnPredicate<F>(pub F);

impl<F> fmt::Debug for FnPredicate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnPredicate")
    }
}

impl<F> FailurePredicate for FnPredicate<F>
where
    F: Fn(&(dyn Error + 'static)) -> bool + Send + Sync,
{
    fn test(&self, error: &(dyn Error + 'static)) -> bool {
        (self.0)(error)
    }
}

/// Construction-time map from predicate name to implementation.
#[derive(Debug, Clone)]
pub struct PredicateRegistry {
    predicates: HashMap<String, Arc<dyn FailurePredicate>>,
}

impl PredicateRegistry {
    /// An empty registry. Most callers want [`PredicateRegistry::default`].
    pub fn empty() -> Self {
        Self {
            predicates: HashMap::new(),
        }
    }

    /// Bind `name` to `predicate`, replacing any previous binding.
    pub fn register(&mut self, name: impl Into<String>, predicate: Arc<dyn FailurePredicate>) {
        self.predicates.insert(name.into(), predicate);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, name: impl Into<String>, predicate: Arc<dyn FailurePredicate>) -> Self {
        self.register(name, predicate);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn FailurePredicate>> {
        self.predicates.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.predicates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for PredicateRegistry {
    fn default() -> Self {
        Self::empty()
            .with(DEFAULT_PREDICATE, Arc::new(CountAllErrors))
            .with(IGNORE_IO_PREDICATE, Arc::new(IgnoreIoErrors))
    }
}
