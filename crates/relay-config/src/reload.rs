/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! `ReloadableConfig` is the Config Store's live handle: `load()`
//! happens once at startup, `current()` hands out the last good
//! snapshot to any reader, and `reload()` re-reads the file plus
//! environment and atomically swaps `current()` only if the result
//! validates. `watch()` exposes the same swap as a `tokio::sync::watch`
//! stream so subscribers (the Event Source, in particular) can diff
//! subscription sets on every successful reload instead of polling.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;

use crate::settings::{ConfigChange, Settings};

/// Handle shared by every component that needs to read, and
/// optionally reload, the current configuration.
#[derive(Clone)]
pub struct ReloadableConfig {
    file: Option<PathBuf>,
    tx: Arc<watch::Sender<Arc<Settings>>>,
}

impl ReloadableConfig {
    /// Loads the initial configuration and creates the watch channel
    /// subscribers will receive subsequent reloads on.
    pub fn load(file: Option<PathBuf>) -> Result<Self, config::ConfigError> {
        let initial = Settings::load(file.as_deref().and_then(|p| p.to_str()))?;
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Ok(Self {
            file,
            tx: Arc::new(tx),
        })
    }

    /// The last good configuration. Never blocks; always returns
    /// immediately since a valid configuration is guaranteed once
    /// `load` has succeeded.
    pub fn current(&self) -> Arc<Settings> {
        self.tx.borrow().clone()
    }

    /// A receiver that yields every successfully validated
    /// configuration going forward, starting from the current one.
    pub fn watch(&self) -> watch::Receiver<Arc<Settings>> {
        self.tx.subscribe()
    }

    /// Re-reads the file plus environment overrides. On successful
    /// validation, atomically swaps `current()` and notifies
    /// `watch()` subscribers; returns the field-level diff against the
    /// previous configuration. On failure, `current()` is left
    /// untouched and the error is returned.
    pub fn reload(&self) -> Result<Vec<ConfigChange>, config::ConfigError> {
        let previous = self.current();
        let candidate = Settings::load(self.file.as_deref().and_then(|p| p.to_str()))?;
        let changes = previous.diff(&candidate);
        self.tx.send_replace(Arc::new(candidate));
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn reload_without_changes_returns_empty_diff() {
        std::env::remove_var("CHAIN_ID");
        let config = ReloadableConfig::load(None).unwrap();
        let changes = config.reload().unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    #[serial]
    fn reload_picks_up_env_change_and_notifies_watchers() {
        std::env::remove_var("CHAIN_ID");
        let config = ReloadableConfig::load(None).unwrap();
        let mut rx = config.watch();
        assert_eq!(rx.borrow().network.chain_id, 1);

        std::env::set_var("CHAIN_ID", "7");
        let changes = config.reload().unwrap();
        assert!(changes.iter().any(|c| c.key == "network.chainId"));
        assert_eq!(config.current().network.chain_id, 7);
        assert!(rx.has_changed().unwrap());

        std::env::remove_var("CHAIN_ID");
    }

    #[test]
    #[serial]
    fn failed_reload_leaves_current_untouched() {
        std::env::remove_var("LOG_LEVEL");
        let config = ReloadableConfig::load(None).unwrap();
        std::env::set_var("LOG_LEVEL", "not-a-level");
        assert!(config.reload().is_err());
        assert_eq!(config.current().monitoring.log_level, "info");
        std::env::remove_var("LOG_LEVEL");
    }
}
