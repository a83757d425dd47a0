/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Top-level shutdown signal: a `watch::Sender<bool>` so every
//! background task (Event Source, Processor, dead-letter sweep,
//! metrics flush) observes the same signal instead of only the HTTP
//! server's own graceful-shutdown hook.

use tokio::signal;
use tokio::sync::watch;
use tracing::info;

/// Waits for SIGINT/ctrl-c, then flips `shutdown` to `true`. Intended
/// to be raced against `axum::serve(...).with_graceful_shutdown(...)`
/// so the HTTP server and every other background task stop together.
pub async fn wait_for_signal(shutdown: watch::Sender<bool>) {
    signal::ctrl_c().await.expect("failed to listen for ctrl_c");
    info!("shutdown signal received, stopping");
    let _ = shutdown.send(true);
}
