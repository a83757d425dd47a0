/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Narrows the Config Store's full `Settings` snapshot down to the
//! `subscriptions` list the Event Source and dispatcher care about,
//! so neither has to depend on `relay-config` directly.

use std::sync::Arc;

use relay_config::ReloadableConfig;
use relay_types::Subscription;
use tokio::sync::watch;

/// Spawns a forwarding task that re-derives the subscription list on
/// every successful config reload and publishes it on the returned
/// channel. Runs for the life of the process; config reloads are rare
/// enough that this costs nothing between them.
pub fn spawn(config: &ReloadableConfig) -> watch::Receiver<Arc<Vec<Subscription>>> {
    let initial = Arc::new(config.current().subscriptions.clone());
    let (tx, rx) = watch::channel(initial);

    let mut settings_rx = config.watch();
    tokio::spawn(async move {
        loop {
            if settings_rx.changed().await.is_err() {
                return;
            }
            let subscriptions = Arc::new(settings_rx.borrow().subscriptions.clone());
            if tx.send(subscriptions).is_err() {
                return;
            }
        }
    });

    rx
}
