/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Background retention sweep for the dead-letter store.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info};

use crate::dal::DeadLetterDAL;

/// Configuration for the dead-letter retention sweep.
pub struct CleanupConfig {
    /// How often to run the sweep, in seconds.
    pub interval_seconds: u64,
    /// Entries older than this are deleted.
    pub retention_days: i64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 900,
            retention_days: 30,
        }
    }
}

/// Starts the dead-letter retention sweep. Runs until `shutdown` fires,
/// at which point the current tick (if any) is allowed to finish.
pub fn start_cleanup_task(
    dal: Arc<DeadLetterDAL>,
    config: CleanupConfig,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    info!(
        interval_seconds = config.interval_seconds,
        retention_days = config.retention_days,
        "starting dead-letter retention sweep"
    );

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(config.interval_seconds));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match dal.cleanup_older_than(config.retention_days) {
                        Ok(deleted) if deleted > 0 => {
                            info!(deleted, "swept expired dead-letter entries");
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "dead-letter retention sweep failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("dead-letter retention sweep stopping");
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_documented_defaults() {
        let config = CleanupConfig::default();
        assert_eq!(config.interval_seconds, 900);
        assert_eq!(config.retention_days, 30);
    }
}
