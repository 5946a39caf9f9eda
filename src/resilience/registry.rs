//! Named circuit breakers built from configuration.
//!
//! # Responsibilities
//! - Build one breaker per configured name
//! - Hand out shared handles (`Arc<CircuitBreaker>`) by name
//! - Replace instances whose settings changed on reload
//!
//! # Design Decisions
//! - Explicitly constructed and passed around; no global instance
//! - Reload never mutates a live breaker; a changed breaker is rebuilt and
//!   starts Closed, an unchanged one keeps its state
//! - Breakers created on demand are tracked by name and survive reloads
//!   until the file declares them

use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};

use crate::config::{AppConfig, CircuitBreakerConfig};
use crate::observability::metrics::{CircuitBreakerMetrics, NoopMetrics};
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreaker};
use crate::resilience::clock::{Clock, SystemClock};
use crate::resilience::error::BuildError;
use crate::resilience::predicate::PredicateRegistry;

/// Owner of named breakers.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    /// Names created by `get_or_create` rather than declared.
    on_demand: DashSet<String>,
    defaults: ArcSwap<CircuitBreakerConfig>,
    predicates: PredicateRegistry,
    metrics: Arc<dyn CircuitBreakerMetrics>,
    clock: Arc<dyn Clock>,
}

/// What [`CircuitBreakerRegistry::apply`] did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReloadSummary {
    pub added: Vec<String>,
    pub replaced: Vec<String>,
    pub removed: Vec<String>,
}

impl CircuitBreakerRegistry {
    /// An empty registry using `defaults` for on-demand breakers.
    pub fn new(
        defaults: CircuitBreakerConfig,
        predicates: PredicateRegistry,
        metrics: Arc<dyn CircuitBreakerMetrics>,
    ) -> Self {
        Self::with_clock(defaults, predicates, metrics, Arc::new(SystemClock))
    }

    pub fn with_clock(
        defaults: CircuitBreakerConfig,
        predicates: PredicateRegistry,
        metrics: Arc<dyn CircuitBreakerMetrics>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            breakers: DashMap::new(),
            on_demand: DashSet::new(),
            defaults: ArcSwap::from_pointee(defaults),
            predicates,
            metrics,
            clock,
        }
    }

    /// Build every breaker declared in `config`.
    pub fn from_config(
        config: &AppConfig,
        predicates: PredicateRegistry,
        metrics: Arc<dyn CircuitBreakerMetrics>,
    ) -> Result<Self, BuildError> {
        let registry = Self::new(config.defaults.clone(), predicates, metrics);
        registry.apply(config)?;
        Ok(registry)
    }

    /// Built-in predicates, no metrics.
    pub fn with_defaults(config: &AppConfig) -> Result<Self, BuildError> {
        Self::from_config(config, PredicateRegistry::default(), Arc::new(NoopMetrics))
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| entry.value().clone())
    }

    /// The breaker named `name`, creating it from the defaults if needed.
    pub fn get_or_create(&self, name: &str) -> Result<Arc<CircuitBreaker>, BuildError> {
        if let Some(existing) = self.get(name) {
            return Ok(existing);
        }
        let defaults = self.defaults.load_full();
        match self.breakers.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let breaker = Arc::new(self.build(name, defaults.as_ref().clone())?);
                entry.insert(breaker.clone());
                self.on_demand.insert(name.to_string());
                tracing::info!(breaker = %name, "Circuit breaker created from defaults");
                Ok(breaker)
            }
        }
    }

    /// Drop the breaker named `name`. Existing handles keep working.
    pub fn remove(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.on_demand.remove(name);
        self.breakers.remove(name).map(|(_, breaker)| breaker)
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Snapshots of every breaker, sorted by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self.breakers.iter().map(|entry| entry.value().snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Reconcile with `config`.
    ///
    /// Every new breaker is built before anything is swapped in, so a bad
    /// entry leaves the registry untouched. Declared breakers absent from
    /// `config` are removed; on-demand breakers stay whatever the new
    /// defaults are.
    pub fn apply(&self, config: &AppConfig) -> Result<ReloadSummary, BuildError> {
        let mut staged = Vec::new();
        for declared in &config.breakers {
            let unchanged = self
                .get(&declared.name)
                .map(|existing| existing.config() == &declared.settings)
                .unwrap_or(false);
            if !unchanged {
                staged.push(Arc::new(self.build(&declared.name, declared.settings.clone())?));
            }
        }

        let mut summary = ReloadSummary::default();
        for declared in &config.breakers {
            self.on_demand.remove(&declared.name);
        }
        for breaker in staged {
            let name = breaker.name().to_string();
            match self.breakers.insert(name.clone(), breaker) {
                Some(_) => summary.replaced.push(name),
                None => summary.added.push(name),
            }
        }

        self.defaults.store(Arc::new(config.defaults.clone()));
        self.breakers.retain(|name, _| {
            let declared = config.breakers.iter().any(|b| &b.name == name);
            if declared || self.on_demand.contains(name) {
                true
            } else {
                summary.removed.push(name.clone());
                false
            }
        });

        summary.added.sort();
        summary.replaced.sort();
        summary.removed.sort();
        tracing::info!(
            added = summary.added.len(),
            replaced = summary.replaced.len(),
            removed = summary.removed.len(),
            "Circuit breaker configuration applied"
        );
        Ok(summary)
    }

    fn build(&self, name: &str, config: CircuitBreakerConfig) -> Result<CircuitBreaker, BuildError> {
        CircuitBreaker::builder(name, config)
            .predicates(self.predicates.clone())
            .metrics(self.metrics.clone())
            .clock(self.clock.clone())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, BreakerConfig};
    use crate::resilience::state::State;

    #[derive(Debug, thiserror::Error)]
    #[error("down")]
    struct Down;

    fn config() -> AppConfig {
        parse_config(
            r#"
            [defaults]
            sliding_window_size = 4
            minimum_number_of_calls = 2

            [[breakers]]
            name = "inventory"
            failure_rate_threshold = 30
            sliding_window_size = 10
            minimum_number_of_calls = 8

            [[breakers]]
            name = "payments"
            sliding_window_size = 2
            minimum_number_of_calls = 2
            "#,
        )
        .unwrap()
    }

    fn trip(breaker: &CircuitBreaker) {
        while breaker.state() != State::Open {
            breaker.try_acquire();
            breaker.release_on_error(&Down);
        }
    }

    #[test]
    fn test_builds_declared_breakers() {
        let registry = CircuitBreakerRegistry::with_defaults(&config()).unwrap();
        assert_eq!(registry.len(), 2);
        let inventory = registry.get("inventory").unwrap();
        assert_eq!(inventory.config().failure_rate_threshold, 30);
        assert!(registry.get("shipping").is_none());

        let names: Vec<_> = registry.snapshots().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["inventory", "payments"]);
    }

    #[test]
    fn test_get_or_create_uses_defaults_once() {
        let registry = CircuitBreakerRegistry::with_defaults(&config()).unwrap();
        let a = registry.get_or_create("shipping").unwrap();
        let b = registry.get_or_create("shipping").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.config().sliding_window_size, 4);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_apply_keeps_unchanged_and_replaces_changed() {
        let registry = CircuitBreakerRegistry::with_defaults(&config()).unwrap();
        trip(&registry.get("payments").unwrap());
        trip(&registry.get("inventory").unwrap());
        registry.get_or_create("shipping").unwrap();

        let mut next = config();
        next.breakers.retain(|b| b.name != "payments");
        next.breakers[0].settings.failure_rate_threshold = 40;
        next.breakers.push(BreakerConfig {
            name: "search".into(),
            settings: CircuitBreakerConfig::default(),
        });

        let summary = registry.apply(&next).unwrap();
        assert_eq!(summary.added, vec!["search"]);
        assert_eq!(summary.replaced, vec!["inventory"]);
        assert_eq!(summary.removed, vec!["payments"]);

        assert_eq!(registry.get("inventory").unwrap().state(), State::Closed);
        assert!(registry.get("payments").is_none());
        assert!(registry.get("shipping").is_some());
    }

    #[test]
    fn test_on_demand_breaker_survives_repeated_default_changes() {
        let registry = CircuitBreakerRegistry::with_defaults(&config()).unwrap();
        let shipping = registry.get_or_create("shipping").unwrap();
        trip(&shipping);

        for window in [6, 8, 12] {
            let mut next = config();
            next.defaults.sliding_window_size = window;
            let summary = registry.apply(&next).unwrap();
            assert!(summary.removed.is_empty(), "window={window}");
        }

        let kept = registry.get("shipping").unwrap();
        assert!(Arc::ptr_eq(&shipping, &kept));
        assert_eq!(kept.state(), State::Open);
        assert_eq!(kept.config().sliding_window_size, 4);
    }

    #[test]
    fn test_undeclared_breaker_with_default_settings_is_removed() {
        let mut declared = config();
        declared.breakers.push(BreakerConfig {
            name: "search".into(),
            settings: declared.defaults.clone(),
        });
        let registry = CircuitBreakerRegistry::with_defaults(&declared).unwrap();
        assert!(registry.get("search").is_some());

        let mut next = config();
        next.breakers.clear();
        let summary = registry.apply(&next).unwrap();
        assert_eq!(summary.removed, vec!["inventory", "payments", "search"]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_declaring_an_on_demand_name_makes_it_removable() {
        let registry = CircuitBreakerRegistry::with_defaults(&config()).unwrap();
        registry.get_or_create("shipping").unwrap();

        let mut next = config();
        next.breakers.push(BreakerConfig {
            name: "shipping".into(),
            settings: next.defaults.clone(),
        });
        registry.apply(&next).unwrap();

        let summary = registry.apply(&config()).unwrap();
        assert_eq!(summary.removed, vec!["shipping"]);
        assert!(registry.get("shipping").is_none());
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let registry = CircuitBreakerRegistry::with_defaults(&config()).unwrap();
        let before = registry.get("inventory").unwrap();

        let mut next = config();
        next.breakers[0].settings.failure_rate_threshold = 10;
        next.breakers[1].settings.failure_predicate = "unknown".into();

        assert!(matches!(registry.apply(&next), Err(BuildError::UnknownPredicate { .. })));
        assert!(Arc::ptr_eq(&before, &registry.get("inventory").unwrap()));
    }

    #[test]
    fn test_unknown_predicate_fails_construction() {
        let mut config = config();
        config.breakers[0].settings.failure_predicate = "ignore-timeouts".into();
        let err = CircuitBreakerRegistry::with_defaults(&config).unwrap_err();
        assert!(matches!(err, BuildError::UnknownPredicate { name, .. } if name == "inventory"));
    }
}
