/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Queue Processor
//!
//! Leases a batch of visible deliveries, spawns one task per delivery
//! bounded by a `tokio::sync::Semaphore` sized to
//! `options.maxConcurrentWebhooks`, sends each through the HTTP
//! Sender, and resolves the outcome via `classify_outcome`.

use std::sync::Arc;
use std::time::Duration;

use relay_deadletter::DeadLetterDAL;
use relay_queue::DeliveriesDAL;
use relay_retry::RetryPolicy;
use relay_sender::HttpSender;
use relay_types::{NewDeadLetterEntry, WebhookEndpoint};
use tokio::sync::{watch, Semaphore};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::outcome::{classify_outcome, DeliveryDecision};

/// Resolves a `webhook_id` to the endpoint it should be delivered to.
/// Implemented by the caller against the live configuration snapshot.
pub trait EndpointLookup: Send + Sync {
    fn endpoint(&self, webhook_id: Uuid) -> Option<WebhookEndpoint>;
}

/// Tuning knobs for one Processor instance.
#[derive(Debug, Clone, Copy)]
pub struct ProcessorConfig {
    pub max_concurrent_webhooks: usize,
    pub lease_batch_size: i64,
    pub poll_interval_ms: u64,
    pub shutdown_drain_ms: u64,
}

/// Runs the lease/send/resolve loop until `shutdown` fires, then drains
/// in-flight work up to `shutdown_drain_ms` before returning.
pub async fn run(
    config: ProcessorConfig,
    deliveries: Arc<DeliveriesDAL>,
    dead_letters: Arc<DeadLetterDAL>,
    sender: Arc<HttpSender>,
    endpoints: Arc<dyn EndpointLookup>,
    mut shutdown: watch::Receiver<bool>,
) {
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_webhooks));
    let retry_policy = RetryPolicy::default();
    let mut ticker = tokio::time::interval(Duration::from_millis(config.poll_interval_ms));
    let mut in_flight = tokio::task::JoinSet::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let available = semaphore.available_permits() as i64;
                let batch_size = available.min(config.lease_batch_size);
                if batch_size <= 0 {
                    continue;
                }
                match deliveries.lease(batch_size) {
                    Ok(leased) => {
                        for delivery in leased {
                            let Some(endpoint) = endpoints.endpoint(delivery.webhook_id) else {
                                warn!(webhook_id = %delivery.webhook_id, "no endpoint for leased delivery, releasing");
                                let _ = deliveries.schedule_retry(delivery.id, chrono::Utc::now(), "endpoint not found");
                                continue;
                            };
                            let permit = semaphore.clone().acquire_owned().await.expect("semaphore closed");
                            let deliveries = deliveries.clone();
                            let dead_letters = dead_letters.clone();
                            let sender = sender.clone();
                            let retry_policy = retry_policy;
                            in_flight.spawn(async move {
                                let _permit = permit;
                                process_one(delivery, endpoint, &deliveries, &dead_letters, &sender, &retry_policy).await;
                            });
                        }
                    }
                    Err(e) => error!(error = %e, "failed to lease deliveries"),
                }
                while in_flight.try_join_next().is_some() {}
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!(pending = in_flight.len(), "processor draining in-flight deliveries before shutdown");
    let drain = tokio::time::timeout(Duration::from_millis(config.shutdown_drain_ms), async {
        while in_flight.join_next().await.is_some() {}
    });
    if drain.await.is_err() {
        warn!("shutdown drain deadline exceeded, releasing remaining leases");
        in_flight.shutdown().await;
        if let Err(e) = deliveries.release_all_leases() {
            error!(error = %e, "failed to release leases on shutdown");
        }
    }
}

async fn process_one(
    delivery: relay_types::Delivery,
    endpoint: WebhookEndpoint,
    deliveries: &DeliveriesDAL,
    dead_letters: &DeadLetterDAL,
    sender: &HttpSender,
    retry_policy: &RetryPolicy,
) {
    let outcome = sender.send(&endpoint, &delivery.payload).await;

    relay_metrics::webhook_response_time_ms()
        .with_label_values(&[&delivery.webhook_id.to_string()])
        .observe(outcome.response_time_ms as f64);
    if !outcome.success {
        relay_metrics::webhook_delivery_failure_total()
            .with_label_values(&[&delivery.webhook_id.to_string()])
            .inc();
    }

    let attempts_after = delivery.attempts + 1;
    match classify_outcome(&outcome, attempts_after, delivery.max_attempts) {
        DeliveryDecision::Complete => {
            if let Err(e) = deliveries.complete(delivery.id) {
                error!(delivery_id = %delivery.id, error = %e, "failed to mark delivery completed");
            }
            relay_metrics::webhook_deliveries_total()
                .with_label_values(&["completed", &delivery.webhook_id.to_string()])
                .inc();
        }
        DeliveryDecision::Retry => {
            let error_message = outcome.error.unwrap_or_else(|| "unknown error".to_string());
            if let Err(e) = deliveries.fail(delivery.id, &error_message) {
                error!(delivery_id = %delivery.id, error = %e, "failed to record delivery failure");
            }
            let when = retry_policy.next(attempts_after as u32, chrono::Utc::now());
            if let Err(e) = deliveries.schedule_retry(delivery.id, when, &error_message) {
                error!(delivery_id = %delivery.id, error = %e, "failed to schedule retry");
            }
        }
        DeliveryDecision::Dead(reason) => {
            promote_to_dead(delivery, reason, &outcome.error, deliveries, dead_letters).await;
        }
    }
}

async fn promote_to_dead(
    delivery: relay_types::Delivery,
    reason: &str,
    last_error: &Option<String>,
    deliveries: &DeliveriesDAL,
    dead_letters: &DeadLetterDAL,
) {
    match deliveries.promote_to_dead(delivery.id, reason) {
        Ok(dead) => {
            let entry = NewDeadLetterEntry {
                id: dead.id,
                subscription_id: dead.subscription_id,
                webhook_id: dead.webhook_id,
                event: dead.event,
                payload: dead.payload,
                failure_reason: reason.to_string(),
                last_error: last_error.clone(),
                attempts: dead.attempts,
                max_attempts: dead.max_attempts,
                failed_at: chrono::Utc::now(),
            };
            if let Err(e) = dead_letters.add(&entry) {
                error!(delivery_id = %delivery.id, error = %e, "failed to write dead-letter entry");
            }
            relay_metrics::dlq_entries_total()
                .with_label_values(&[&delivery.webhook_id.to_string()])
                .inc();
            relay_metrics::webhook_deliveries_total()
                .with_label_values(&["dead", &delivery.webhook_id.to_string()])
                .inc();
        }
        Err(e) => error!(delivery_id = %delivery.id, error = %e, "failed to promote delivery to dead-letter"),
    }
}
