/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Periodic translation of the in-process registry into the
//! `metrics` table, and a best-effort historical loader that seeds the
//! registry with persisted gauge/histogram state at startup.
//!
//! Counters persist across flushes; gauges and histograms are cleared
//! after a successful flush.

use std::sync::Arc;
use std::time::Duration;

use diesel::prelude::*;
use prometheus::proto::MetricType;
use relay_queue::ConnectionPool;
use relay_types::schema::metrics;
use relay_types::NewMetricRow;
use serde_json::Value as Json;
use tokio::time::interval;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::registry::{gather, queue_size, webhook_response_time_ms};

/// Converts the current registry snapshot into rows and inserts them.
/// Does not clear anything; callers decide whether to reset gauges
/// and histograms afterward.
pub fn flush_once(pool: &ConnectionPool) -> Result<usize, diesel::result::Error> {
    let rows = snapshot_rows();
    if rows.is_empty() {
        return Ok(0);
    }
    let mut conn = pool
        .get()
        .map_err(|e| diesel::result::Error::QueryBuilderError(Box::new(e)))?;
    diesel::insert_into(metrics::table)
        .values(&rows)
        .execute(&mut conn)
}

fn snapshot_rows() -> Vec<NewMetricRow> {
    let mut rows = Vec::new();

    for family in gather() {
        let name = family.get_name().to_string();
        for metric in family.get_metric() {
            let labels: Json = metric
                .get_label()
                .iter()
                .map(|pair| (pair.get_name().to_string(), Json::String(pair.get_value().to_string())))
                .collect::<serde_json::Map<_, _>>()
                .into();

            match family.get_field_type() {
                MetricType::COUNTER => rows.push(new_row(&name, metric.get_counter().get_value(), labels)),
                MetricType::GAUGE => rows.push(new_row(&name, metric.get_gauge().get_value(), labels)),
                MetricType::HISTOGRAM => {
                    let histogram = metric.get_histogram();
                    rows.push(new_row(&format!("{name}_sum"), histogram.get_sample_sum(), labels.clone()));
                    rows.push(new_row(&format!("{name}_count"), histogram.get_sample_count() as f64, labels));
                }
                _ => {}
            }
        }
    }

    rows
}

fn new_row(metric_name: &str, metric_value: f64, labels: Json) -> NewMetricRow {
    NewMetricRow {
        id: Uuid::new_v4(),
        metric_name: metric_name.to_string(),
        metric_value,
        labels,
        timestamp: chrono::Utc::now(),
    }
}

/// Starts the periodic flush task. On each tick, writes a snapshot
/// then clears the gauge and histogram (counters are left untouched
/// so they keep accumulating). Failures are logged and never fatal.
pub fn start_flush_task(
    pool: Arc<ConnectionPool>,
    interval_seconds: u64,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    info!(interval_seconds, "starting metrics flush task");

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(interval_seconds));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    run_flush_tick(&pool);
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("metrics flush task performing final flush before exit");
                        run_flush_tick(&pool);
                        break;
                    }
                }
            }
        }
    })
}

fn run_flush_tick(pool: &ConnectionPool) {
    match flush_once(pool) {
        Ok(written) if written > 0 => {
            info!(written, "flushed metrics snapshot");
            queue_size().reset();
            webhook_response_time_ms().reset();
        }
        Ok(_) => {}
        Err(e) => error!(error = %e, "metrics flush failed"),
    }
}

/// Best-effort historical metrics loader: seeds `queue_size` from the
/// most recent persisted row for each label set. Failure here is
/// logged and never aborts startup.
pub fn load_historical_metrics(pool: &ConnectionPool) {
    if let Err(e) = try_load_historical_metrics(pool) {
        warn!(error = %e, "historical metrics load failed, starting with a cold registry");
    }
}

fn try_load_historical_metrics(pool: &ConnectionPool) -> Result<(), diesel::result::Error> {
    let mut conn = pool
        .get()
        .map_err(|e| diesel::result::Error::QueryBuilderError(Box::new(e)))?;

    let rows: Vec<relay_types::MetricRow> = metrics::table
        .filter(metrics::metric_name.eq("queue_size"))
        .order(metrics::timestamp.desc())
        .limit(32)
        .load(&mut conn)?;

    for row in rows {
        if let Some(status) = row.labels.get("status").and_then(|v| v.as_str()) {
            queue_size().with_label_values(&[status]).set(row.metric_value);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_rows_includes_seeded_counter() {
        crate::registry::events_processed_total()
            .with_label_values(&["matched"])
            .inc();
        let rows = snapshot_rows();
        assert!(rows.iter().any(|r| r.metric_name == "events_processed_total"));
    }
}
