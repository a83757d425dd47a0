/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! The process-wide metrics registry: one lazily-registered collector
//! per name, following the `OnceLock`-per-metric pattern.

use std::sync::OnceLock;

use prometheus::{CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Count of events observed by the Filter Engine, labeled by
/// `result` (`matched` / `filtered`).
pub fn events_processed_total() -> &'static CounterVec {
    static COUNTER: OnceLock<CounterVec> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let opts = Opts::new("events_processed_total", "Total blockchain events observed by the filter engine");
        let counter = CounterVec::new(opts, &["result"]).expect("failed to create events_processed_total");
        registry()
            .register(Box::new(counter.clone()))
            .expect("failed to register events_processed_total");
        counter
    })
}

/// Terminal delivery outcomes, labeled by `status` (`completed` /
/// `dead`) and `webhook_id`.
pub fn webhook_deliveries_total() -> &'static CounterVec {
    static COUNTER: OnceLock<CounterVec> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let opts = Opts::new("webhook_deliveries_total", "Total webhook deliveries by terminal status");
        let counter =
            CounterVec::new(opts, &["status", "webhook_id"]).expect("failed to create webhook_deliveries_total");
        registry()
            .register(Box::new(counter.clone()))
            .expect("failed to register webhook_deliveries_total");
        counter
    })
}

/// Every attempt that did not return 2xx, labeled by `webhook_id`.
pub fn webhook_delivery_failure_total() -> &'static CounterVec {
    static COUNTER: OnceLock<CounterVec> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let opts = Opts::new("webhook_delivery_failure_total", "Total failed webhook delivery attempts");
        let counter =
            CounterVec::new(opts, &["webhook_id"]).expect("failed to create webhook_delivery_failure_total");
        registry()
            .register(Box::new(counter.clone()))
            .expect("failed to register webhook_delivery_failure_total");
        counter
    })
}

/// Response latency of completed HTTP attempts, labeled by
/// `webhook_id`.
pub fn webhook_response_time_ms() -> &'static HistogramVec {
    static HISTOGRAM: OnceLock<HistogramVec> = OnceLock::new();
    HISTOGRAM.get_or_init(|| {
        let opts = HistogramOpts::new("webhook_response_time_ms", "Webhook HTTP response latency in milliseconds")
            .buckets(vec![10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0]);
        let histogram =
            HistogramVec::new(opts, &["webhook_id"]).expect("failed to create webhook_response_time_ms");
        registry()
            .register(Box::new(histogram.clone()))
            .expect("failed to register webhook_response_time_ms");
        histogram
    })
}

/// Current depth of the delivery queue, labeled by `status`.
pub fn queue_size() -> &'static GaugeVec {
    static GAUGE: OnceLock<GaugeVec> = OnceLock::new();
    GAUGE.get_or_init(|| {
        let opts = Opts::new("queue_size", "Current delivery queue depth by status");
        let gauge = GaugeVec::new(opts, &["status"]).expect("failed to create queue_size");
        registry()
            .register(Box::new(gauge.clone()))
            .expect("failed to register queue_size");
        gauge
    })
}

/// Total dead-lettered deliveries.
pub fn dlq_entries_total() -> &'static CounterVec {
    static COUNTER: OnceLock<CounterVec> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let opts = Opts::new("dlq_entries_total", "Total deliveries promoted to the dead-letter store");
        let counter = CounterVec::new(opts, &["webhook_id"]).expect("failed to create dlq_entries_total");
        registry()
            .register(Box::new(counter.clone()))
            .expect("failed to register dlq_entries_total");
        counter
    })
}

/// Count of leases reclaimed by the reaper after their TTL expired
/// without resolution (§4.5: "leases that expire without resolution
/// revert the delivery to pending … and increment a `lease_expired`
/// counter").
pub fn lease_expired_total() -> &'static prometheus::IntCounter {
    static COUNTER: OnceLock<prometheus::IntCounter> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let opts = Opts::new("lease_expired_total", "Total delivery leases reclaimed after TTL expiry");
        let counter = prometheus::IntCounter::with_opts(opts).expect("failed to create lease_expired_total");
        registry()
            .register(Box::new(counter.clone()))
            .expect("failed to register lease_expired_total");
        counter
    })
}

/// Count of rejected configuration hot-reload attempts.
pub fn config_reload_failed_total() -> &'static prometheus::IntCounter {
    static COUNTER: OnceLock<prometheus::IntCounter> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let opts = Opts::new("config_reload_failed_total", "Total rejected configuration reload attempts");
        let counter = prometheus::IntCounter::with_opts(opts).expect("failed to create config_reload_failed_total");
        registry()
            .register(Box::new(counter.clone()))
            .expect("failed to register config_reload_failed_total");
        counter
    })
}

/// Snapshots every registered metric family, for the periodic flush
/// task to translate into persisted rows.
pub fn gather() -> Vec<prometheus::proto::MetricFamily> {
    registry().gather()
}

/// Encodes every registered metric in Prometheus text exposition
/// format, for the `/metrics` HTTP handler.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("failed to encode metrics");
    String::from_utf8(buffer).expect("metrics encoding produced invalid utf-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_metrics_contains_registered_families() {
        events_processed_total().with_label_values(&["matched"]).inc();
        let text = encode_metrics();
        assert!(text.contains("events_processed_total"));
    }
}
