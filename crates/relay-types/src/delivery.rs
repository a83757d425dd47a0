/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Deliveries Module
//!
//! A `Delivery` is one durable, leaseable unit of work: a matched
//! event, already formatted for a specific webhook endpoint, waiting
//! to be sent. The `deliveries` table is the durable queue described
//! in the Delivery Queue component: rows transition
//! `pending -> processing -> (completed | pending again | dead)`.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use utoipa::ToSchema;
use uuid::Uuid;

/// Awaiting a free lease slot.
pub const DELIVERY_STATUS_PENDING: &str = "pending";
/// Leased by a worker; invisible to `lease()` until `lease_expires_at`.
pub const DELIVERY_STATUS_PROCESSING: &str = "processing";
/// Terminal success.
pub const DELIVERY_STATUS_COMPLETED: &str = "completed";
/// Transient failure recorded; row returns to `pending` at `next_visible_at`.
pub const DELIVERY_STATUS_FAILED: &str = "failed";
/// Terminal failure; promoted out to the dead-letter store.
pub const DELIVERY_STATUS_DEAD: &str = "dead";

/// All statuses a `Delivery` row may carry, in the order the pipeline
/// moves through them.
pub const VALID_DELIVERY_STATUSES: &[&str] = &[
    DELIVERY_STATUS_PENDING,
    DELIVERY_STATUS_PROCESSING,
    DELIVERY_STATUS_COMPLETED,
    DELIVERY_STATUS_FAILED,
    DELIVERY_STATUS_DEAD,
];

/// A durable row in the delivery queue.
#[derive(
    Queryable, Selectable, Identifiable, AsChangeset, Debug, Clone, Serialize, Deserialize, ToSchema,
)]
#[diesel(table_name = crate::schema::deliveries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[schema(example = json!({
    "id": "123e4567-e89b-12d3-a456-426614174000",
    "subscription_id": "223e4567-e89b-12d3-a456-426614174000",
    "webhook_id": "323e4567-e89b-12d3-a456-426614174000",
    "event": {"event_name": "Transfer"},
    "payload": {"event": "Transfer"},
    "status": "pending",
    "attempts": 0,
    "max_attempts": 8,
    "next_visible_at": "2023-01-01T00:00:00Z",
    "lease_expires_at": null,
    "last_error": null,
    "created_at": "2023-01-01T00:00:00Z"
}))]
pub struct Delivery {
    /// Unique identifier for the delivery.
    pub id: Uuid,
    /// Subscription that produced this delivery.
    pub subscription_id: Uuid,
    /// Endpoint this delivery is addressed to.
    pub webhook_id: Uuid,
    /// The originating `BlockchainEvent`, stored as it was observed.
    pub event: Json,
    /// The formatted request body, already shaped for `webhook_id`'s format.
    pub payload: Json,
    /// One of [`VALID_DELIVERY_STATUSES`].
    pub status: String,
    /// Number of delivery attempts made so far.
    pub attempts: i32,
    /// Attempts allowed before promotion to the dead-letter store.
    pub max_attempts: i32,
    /// Earliest time this row becomes visible to `lease()`.
    pub next_visible_at: DateTime<Utc>,
    /// Lease expiry; `None` when not currently leased.
    pub lease_expires_at: Option<DateTime<Utc>>,
    /// Most recent error message, if any attempt has failed.
    pub last_error: Option<String>,
    /// When this delivery was enqueued.
    pub created_at: DateTime<Utc>,
}

impl Delivery {
    /// Whether this row has reached a terminal state and will never be
    /// leased again.
    pub fn is_terminal(&self) -> bool {
        self.status == DELIVERY_STATUS_COMPLETED || self.status == DELIVERY_STATUS_DEAD
    }
}

/// A new delivery to enqueue.
#[derive(Insertable, Debug, Clone, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = crate::schema::deliveries)]
#[schema(example = json!({
    "id": "123e4567-e89b-12d3-a456-426614174000",
    "subscription_id": "223e4567-e89b-12d3-a456-426614174000",
    "webhook_id": "323e4567-e89b-12d3-a456-426614174000",
    "event": {"event_name": "Transfer"},
    "payload": {"event": "Transfer"},
    "max_attempts": 8
}))]
pub struct NewDelivery {
    /// Caller-supplied id so `enqueue` can be idempotent via
    /// `ON CONFLICT (id) DO NOTHING` keyed on the event dedup key.
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub webhook_id: Uuid,
    pub event: Json,
    pub payload: Json,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub attempts: i32,
    pub max_attempts: i32,
    #[serde(default = "Utc::now")]
    pub next_visible_at: DateTime<Utc>,
    #[serde(default)]
    pub lease_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_status() -> String {
    DELIVERY_STATUS_PENDING.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_and_dead_are_terminal() {
        let mut d = sample();
        d.status = DELIVERY_STATUS_COMPLETED.to_string();
        assert!(d.is_terminal());
        d.status = DELIVERY_STATUS_DEAD.to_string();
        assert!(d.is_terminal());
    }

    #[test]
    fn pending_processing_failed_are_not_terminal() {
        let mut d = sample();
        for s in [
            DELIVERY_STATUS_PENDING,
            DELIVERY_STATUS_PROCESSING,
            DELIVERY_STATUS_FAILED,
        ] {
            d.status = s.to_string();
            assert!(!d.is_terminal());
        }
    }

    fn sample() -> Delivery {
        Delivery {
            id: Uuid::nil(),
            subscription_id: Uuid::nil(),
            webhook_id: Uuid::nil(),
            event: serde_json::json!({}),
            payload: serde_json::json!({}),
            status: DELIVERY_STATUS_PENDING.to_string(),
            attempts: 0,
            max_attempts: 8,
            next_visible_at: Utc::now(),
            lease_expires_at: None,
            last_error: None,
            created_at: Utc::now(),
        }
    }
}
