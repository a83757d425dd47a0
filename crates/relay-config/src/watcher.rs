/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Configuration file watcher for hot-reload support.
//!
//! Watches the configuration file's parent directory (some editors
//! replace files atomically rather than writing in place) and
//! triggers a debounced `ReloadableConfig::reload()` on every
//! modify/create event.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info, warn};

use crate::reload::ReloadableConfig;

/// Configuration for the file watcher task.
#[derive(Debug, Clone)]
pub struct ConfigWatcherConfig {
    pub config_file_path: PathBuf,
    pub debounce: Duration,
}

/// Starts the configuration file watcher as a background task. The
/// returned handle resolves when the watcher's channel disconnects;
/// dropping the watcher's parent runtime stops it.
pub fn start_config_watcher(
    config: ReloadableConfig,
    watcher_config: ConfigWatcherConfig,
) -> tokio::task::JoinHandle<()> {
    info!(
        path = %watcher_config.config_file_path.display(),
        debounce_secs = watcher_config.debounce.as_secs(),
        "starting config file watcher"
    );

    tokio::spawn(async move {
        if let Err(e) = run_config_watcher(config, watcher_config).await {
            error!(error = %e, "config file watcher exited with an error");
        }
    })
}

async fn run_config_watcher(
    config: ReloadableConfig,
    watcher_config: ConfigWatcherConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = watcher_config.config_file_path.clone();
    let debounce = watcher_config.debounce;

    let (tx, rx) = mpsc::channel();

    let mut watcher: RecommendedWatcher =
        notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                if event.kind.is_modify() || event.kind.is_create() {
                    let _ = tx.send(());
                }
            }
        })?;

    let watch_path = watch_dir(&config_path);
    watcher.watch(watch_path, RecursiveMode::NonRecursive)?;

    info!(path = %config_path.display(), "config file watcher started");

    let mut last_reload: Option<Instant> = None;

    loop {
        match rx.recv_timeout(Duration::from_secs(60)) {
            Ok(()) => {
                let should_reload = match last_reload {
                    Some(last) => last.elapsed() >= debounce,
                    None => true,
                };

                if !should_reload {
                    debug!("debouncing config file change");
                    continue;
                }

                tokio::time::sleep(debounce).await;
                while rx.try_recv().is_ok() {}

                debug!("config file change detected, reloading");
                last_reload = Some(Instant::now());

                match config.reload() {
                    Ok(changes) if changes.is_empty() => {
                        debug!("config file changed but no configuration changes detected");
                    }
                    Ok(changes) => {
                        info!(count = changes.len(), "configuration reloaded from file change");
                        for change in &changes {
                            info!(key = %change.key, old = %change.old_value, new = %change.new_value, "config changed");
                        }
                    }
                    Err(e) => {
                        relay_metrics::config_reload_failed_total().inc();
                        error!(error = %e, "failed to reload configuration from file change");
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                warn!("config file watcher channel disconnected");
                break;
            }
        }
    }

    Ok(())
}

fn watch_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_dir_falls_back_to_path_with_no_parent() {
        let p = Path::new("relay.json");
        assert_eq!(watch_dir(p), Path::new(""));
    }

    #[test]
    fn watch_dir_uses_parent_when_present() {
        let p = Path::new("/etc/relay/relay.json");
        assert_eq!(watch_dir(p), Path::new("/etc/relay"));
    }
}
