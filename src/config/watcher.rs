//! Live reload of breaker configuration.
//!
//! Editors often write a file in several steps, so change events are
//! debounced before the file is read. A reload that fails to load, validate,
//! or build leaves the registry as it was.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::AppConfig;
use crate::lifecycle::Shutdown;
use crate::resilience::error::BuildError;
use crate::resilience::registry::{CircuitBreakerRegistry, ReloadSummary};

/// Quiet period after the last change event before reloading.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Watches a configuration file and applies changes to a registry.
pub struct ConfigWatcher {
    path: PathBuf,
    applied: AppConfig,
    debounce: Duration,
}

impl ConfigWatcher {
    /// `applied` is the configuration the registry was built from.
    pub fn new(path: &Path, applied: AppConfig) -> Self {
        Self {
            path: path.to_path_buf(),
            applied,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Re-read the file and apply it if it differs from the last applied
    /// configuration. `Ok(None)` means nothing changed.
    pub fn reload(
        &mut self,
        registry: &CircuitBreakerRegistry,
    ) -> Result<Option<ReloadSummary>, ReloadError> {
        let config = load_config(&self.path)?;
        if config == self.applied {
            return Ok(None);
        }
        let summary = registry.apply(&config)?;
        self.applied = config;
        Ok(Some(summary))
    }

    /// Start watching. Reloads stop when `shutdown` fires; the returned
    /// handle must be kept alive until then.
    pub fn spawn(
        mut self,
        registry: Arc<CircuitBreakerRegistry>,
        shutdown: &Shutdown,
    ) -> Result<RecommendedWatcher, notify::Error> {
        let (tx, mut changes) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    let _ = tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(
            path = ?self.path,
            debounce_ms = self.debounce.as_millis() as u64,
            "Config watcher started"
        );

        let mut stop = shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(()) = changes.recv() => {}
                    _ = stop.recv() => break,
                }
                // wait for the writes to settle
                loop {
                    tokio::select! {
                        Some(()) = changes.recv() => {}
                        _ = tokio::time::sleep(self.debounce) => break,
                    }
                }

                match self.reload(&registry) {
                    Ok(Some(summary)) => tracing::info!(
                        path = ?self.path,
                        added = ?summary.added,
                        replaced = ?summary.replaced,
                        removed = ?summary.removed,
                        "Breaker configuration reloaded"
                    ),
                    Ok(None) => {
                        tracing::debug!(path = ?self.path, "Config file touched without changes")
                    }
                    Err(e) => tracing::error!(
                        path = ?self.path,
                        error = %e,
                        "Rejected reloaded configuration, keeping current breakers"
                    ),
                }
            }
        });

        Ok(watcher)
    }
}
