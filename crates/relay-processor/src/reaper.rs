/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Background lease reaper. §4.5: a lease that expires without
//! resolution must revert its delivery to `pending` and increment a
//! `lease_expired` counter. `lease()` only ever selects rows already
//! `pending`, so a `processing` row abandoned by a crashed worker
//! would otherwise stay invisible forever — this sweep is the only
//! thing that brings it back.

use std::sync::Arc;
use std::time::Duration;

use relay_queue::DeliveriesDAL;
use tokio::time::interval;
use tracing::{error, info};

/// How often the reaper checks for expired leases.
const DEFAULT_REAP_INTERVAL_SECONDS: u64 = 30;

/// Starts the periodic lease reaper. Runs until `shutdown` fires; the
/// in-flight tick (if any) is allowed to finish before exit.
pub fn start_reaper_task(
    deliveries: Arc<DeliveriesDAL>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    info!(interval_seconds = DEFAULT_REAP_INTERVAL_SECONDS, "starting lease reaper");

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(DEFAULT_REAP_INTERVAL_SECONDS));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    reap_once(&deliveries);
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("lease reaper stopping");
                        break;
                    }
                }
            }
        }
    })
}

fn reap_once(deliveries: &DeliveriesDAL) {
    match deliveries.reap_expired_leases() {
        Ok(reaped) if reaped > 0 => {
            relay_metrics::lease_expired_total().inc_by(reaped as u64);
            info!(reaped, "reclaimed expired delivery leases");
        }
        Ok(_) => {}
        Err(e) => error!(error = %e, "lease reap sweep failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reap_interval_is_thirty_seconds() {
        assert_eq!(DEFAULT_REAP_INTERVAL_SECONDS, 30);
    }
}
