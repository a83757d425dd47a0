/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Turns a [`MatchedEvent`] into one [`NewDelivery`] per matched
//! `(subscription, webhook)` pair and enqueues it. Runs between the
//! Event Source and the Queue Processor, consuming the dispatch
//! channel the Event Source feeds.

use std::collections::HashMap;
use std::sync::Arc;

use relay_chain::MatchedEvent;
use relay_queue::{DeliveriesDAL, QueueError};
use relay_types::{NewDelivery, Subscription};
use tokio::sync::{mpsc, watch};
use tracing::{error, warn};
use uuid::Uuid;

/// Namespace for deriving a deterministic delivery id from
/// `(dedup_key, webhook_id)`, so re-observing the same confirmed log
/// after a restart enqueues the same row instead of a duplicate.
const DELIVERY_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6a, 0x4c, 0x3b, 0x1d, 0x9e, 0x77, 0x4f, 0x02, 0x8a, 0x55, 0xc1, 0x0b, 0x2e, 0x6f, 0x94, 0xd3,
]);

/// Runs until `subscriptions`/the dispatch channel close or `shutdown`
/// fires. Looks up each matched `sub_id` in the latest subscription
/// snapshot, formats the event for every one of that subscription's
/// webhooks, and enqueues the result.
pub async fn run(
    mut events: mpsc::Receiver<MatchedEvent>,
    subscriptions: watch::Receiver<Arc<Vec<Subscription>>>,
    deliveries: Arc<DeliveriesDAL>,
    default_max_attempts: u32,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(matched) = event else { return };
                dispatch_one(&matched, &subscriptions.borrow(), &deliveries, default_max_attempts);
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

fn dispatch_one(
    matched: &MatchedEvent,
    subscriptions: &[Subscription],
    deliveries: &DeliveriesDAL,
    default_max_attempts: u32,
) {
    let by_id: HashMap<Uuid, &Subscription> = subscriptions.iter().map(|s| (s.sub_id, s)).collect();

    for sub_id in &matched.matched_subscriptions {
        let Some(subscription) = by_id.get(sub_id) else {
            warn!(%sub_id, "matched subscription no longer present in current snapshot, skipping");
            continue;
        };

        for webhook in &subscription.webhooks {
            let payload = relay_format::format(&matched.event, webhook.format);
            let max_attempts = webhook.retry_attempts.max(default_max_attempts) as i32;

            let delivery = NewDelivery {
                id: delivery_id(&matched.event, webhook.webhook_id),
                subscription_id: subscription.sub_id,
                webhook_id: webhook.webhook_id,
                event: serde_json::to_value(&matched.event).unwrap_or(serde_json::Value::Null),
                payload,
                status: relay_types::DELIVERY_STATUS_PENDING.to_string(),
                attempts: 0,
                max_attempts,
                next_visible_at: chrono::Utc::now(),
                lease_expires_at: None,
                last_error: None,
                created_at: chrono::Utc::now(),
            };

            if let Err(e) = enqueue(deliveries, &delivery) {
                error!(webhook_id = %webhook.webhook_id, error = %e, "failed to enqueue delivery");
            }
        }
    }
}

fn enqueue(deliveries: &DeliveriesDAL, delivery: &NewDelivery) -> Result<(), QueueError> {
    deliveries.enqueue(delivery)
}

fn delivery_id(event: &relay_types::BlockchainEvent, webhook_id: Uuid) -> Uuid {
    let (block, tx, log_index) = event.dedup_key();
    let key = format!("{block}:{tx}:{log_index}:{webhook_id}");
    Uuid::new_v5(&DELIVERY_ID_NAMESPACE, key.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use relay_types::ArgMap;

    fn sample_event() -> relay_types::BlockchainEvent {
        relay_types::BlockchainEvent {
            contract_address: "0x1234567890123456789012345678901234567890".to_string(),
            event_name: "Transfer".to_string(),
            block_number: 10,
            tx_hash: "0xabc".to_string(),
            log_index: 0,
            args: ArgMap::new(),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn delivery_id_is_deterministic_for_same_event_and_webhook() {
        let event = sample_event();
        let webhook_id = Uuid::new_v4();
        assert_eq!(delivery_id(&event, webhook_id), delivery_id(&event, webhook_id));
    }

    #[test]
    fn delivery_id_differs_across_webhooks() {
        let event = sample_event();
        let a = delivery_id(&event, Uuid::new_v4());
        let b = delivery_id(&event, Uuid::new_v4());
        assert_ne!(a, b);
    }
}
