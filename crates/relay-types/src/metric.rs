/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Metrics Persistence Module
//!
//! The `metrics` table is a periodic flush target for the in-process
//! prometheus registry: counters persist across flushes and gauges /
//! histograms are cleared after a successful flush (see the Tracker &
//! Metrics component). This module only models the persisted row; the
//! live registry lives in `relay-metrics`.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use utoipa::ToSchema;
use uuid::Uuid;

/// The kind of prometheus collector a persisted metric row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// A single persisted metrics sample.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = crate::schema::metrics)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[schema(example = json!({
    "id": "123e4567-e89b-12d3-a456-426614174000",
    "metric_name": "webhook_deliveries_total",
    "metric_value": 42.0,
    "labels": {"status": "completed"},
    "timestamp": "2023-01-01T00:00:00Z"
}))]
pub struct MetricRow {
    pub id: Uuid,
    /// e.g. `events_processed_total`, `webhook_response_time_ms`.
    pub metric_name: String,
    pub metric_value: f64,
    /// Label set, e.g. `{"status": "completed", "webhook_id": "..."}`.
    pub labels: Json,
    pub timestamp: DateTime<Utc>,
}

/// A new metrics row to insert during a flush.
#[derive(Insertable, Debug, Clone, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = crate::schema::metrics)]
#[schema(example = json!({
    "id": "123e4567-e89b-12d3-a456-426614174000",
    "metric_name": "webhook_deliveries_total",
    "metric_value": 42.0,
    "labels": {"status": "completed"}
}))]
pub struct NewMetricRow {
    pub id: Uuid,
    pub metric_name: String,
    pub metric_value: f64,
    pub labels: Json,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}
