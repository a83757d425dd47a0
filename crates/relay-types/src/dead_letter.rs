/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Dead-Letter Store Module
//!
//! A `DeadLetterEntry` records a delivery the pipeline has permanently
//! given up on: either `max_attempts` was exhausted against a
//! retriable failure, or the failure was classified non-retriable on
//! the first attempt. Entries are inspectable, statable, and
//! replayable back into the delivery queue by an operator.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use utoipa::ToSchema;
use uuid::Uuid;

/// A terminally failed delivery, retained for inspection and replay.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = crate::schema::dead_letter_queue)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[schema(example = json!({
    "id": "123e4567-e89b-12d3-a456-426614174000",
    "subscription_id": "223e4567-e89b-12d3-a456-426614174000",
    "webhook_id": "323e4567-e89b-12d3-a456-426614174000",
    "event": {"event_name": "Transfer"},
    "payload": {"event": "Transfer"},
    "failure_reason": "max_attempts_exhausted",
    "last_error": "connection refused",
    "attempts": 8,
    "max_attempts": 8,
    "failed_at": "2023-01-01T00:00:00Z"
}))]
pub struct DeadLetterEntry {
    /// Unique identifier; reused from the originating delivery's id.
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub webhook_id: Uuid,
    pub event: Json,
    pub payload: Json,
    /// Short, stable reason code, e.g. `max_attempts_exhausted` or the
    /// non-retriable classification that ended the delivery early.
    pub failure_reason: String,
    /// The last error message observed before promotion.
    pub last_error: Option<String>,
    /// Attempts made before promotion.
    pub attempts: i32,
    /// The delivery's configured attempt ceiling, carried so a replay
    /// via `retry` can recreate the same budget rather than resetting
    /// it to a process-wide default.
    pub max_attempts: i32,
    /// When this entry was promoted into the dead-letter store.
    pub failed_at: DateTime<Utc>,
}

/// A new dead-letter entry, built from an exhausted or permanently
/// failed `Delivery`.
#[derive(Insertable, Debug, Clone, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = crate::schema::dead_letter_queue)]
#[schema(example = json!({
    "id": "123e4567-e89b-12d3-a456-426614174000",
    "subscription_id": "223e4567-e89b-12d3-a456-426614174000",
    "webhook_id": "323e4567-e89b-12d3-a456-426614174000",
    "event": {"event_name": "Transfer"},
    "payload": {"event": "Transfer"},
    "failure_reason": "max_attempts_exhausted",
    "attempts": 8,
    "max_attempts": 8
}))]
pub struct NewDeadLetterEntry {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub webhook_id: Uuid,
    pub event: Json,
    pub payload: Json,
    pub failure_reason: String,
    #[serde(default)]
    pub last_error: Option<String>,
    pub attempts: i32,
    pub max_attempts: i32,
    #[serde(default = "Utc::now")]
    pub failed_at: DateTime<Utc>,
}

/// Aggregate stats over the dead-letter store, used by the admin
/// stats endpoint: total, last-24h, last-7d,
/// and the top-N failure reasons by count.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeadLetterStats {
    pub total_entries: i64,
    /// Entries whose `failed_at` falls within the last 24 hours.
    pub last_24h: i64,
    /// Entries whose `failed_at` falls within the last 7 days.
    pub last_7d: i64,
    /// Entry count grouped by `webhook_id`.
    pub by_webhook: std::collections::BTreeMap<Uuid, i64>,
    /// The `top_n` failure reasons by count, most frequent first.
    pub top_failure_reasons: Vec<FailureReasonCount>,
    pub oldest_failed_at: Option<DateTime<Utc>>,
    pub newest_failed_at: Option<DateTime<Utc>>,
}

/// One entry in [`DeadLetterStats::top_failure_reasons`].
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FailureReasonCount {
    pub reason: String,
    pub count: i64,
}
