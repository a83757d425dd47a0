/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Delivery Tracker & Metrics
//!
//! A process-wide `prometheus::Registry` instruments every pipeline
//! hop. Counters persist across flushes; gauges and histograms are
//! cleared once their snapshot has been durably written to the
//! `metrics` table.

mod flush;
mod registry;

pub use flush::{flush_once, load_historical_metrics, start_flush_task};
pub use registry::{
    config_reload_failed_total, dlq_entries_total, encode_metrics, events_processed_total, lease_expired_total,
    queue_size, webhook_delivery_failure_total, webhook_deliveries_total, webhook_response_time_ms,
};
