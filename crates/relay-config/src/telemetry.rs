/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! OpenTelemetry-based distributed tracing, initialized once at
//! process start from `Settings::telemetry` and `Settings::monitoring.log_level`.
//! When telemetry is disabled, only a plain `tracing-subscriber`
//! formatter is installed.

use opentelemetry::trace::TracerProvider;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::Sampler;
use opentelemetry_sdk::{runtime, Resource};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::settings::TelemetryConfig;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("OTLP exporter error: {0}")]
    Exporter(String),
    #[error("failed to set global subscriber: {0}")]
    Subscriber(String),
}

/// Initializes tracing for the process. `service_name` becomes the
/// OTLP `service.name` resource attribute when telemetry is enabled.
pub fn init(
    telemetry: &TelemetryConfig,
    log_level: &str,
    service_name: &str,
) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if !telemetry.enabled {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| TelemetryError::Subscriber(e.to_string()))?;
        return Ok(());
    }

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&telemetry.otlp_endpoint)
        .build()
        .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

    let sampler = if telemetry.sampling_rate >= 1.0 {
        Sampler::AlwaysOn
    } else if telemetry.sampling_rate <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(telemetry.sampling_rate)
    };

    let tracer_provider = opentelemetry_sdk::trace::TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_sampler(sampler)
        .with_resource(Resource::new(vec![
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                service_name.to_string(),
            ),
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            ),
        ]))
        .build();

    let tracer = tracer_provider.tracer(service_name.to_string());
    opentelemetry::global::set_tracer_provider(tracer_provider);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .map_err(|e| TelemetryError::Subscriber(e.to_string()))?;

    Ok(())
}

/// Flushes pending spans. Call during graceful shutdown, after the
/// last traced operation completes.
pub fn shutdown() {
    opentelemetry::global::shutdown_tracer_provider();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_telemetry_skips_otlp_fields() {
        let t = TelemetryConfig {
            enabled: false,
            otlp_endpoint: "http://localhost:4317".to_string(),
            sampling_rate: 0.1,
        };
        assert!(!t.enabled);
    }

    #[test]
    fn sampling_rate_saturates_at_bounds() {
        let high = TelemetryConfig {
            enabled: true,
            otlp_endpoint: String::new(),
            sampling_rate: 1.5,
        };
        assert!(high.sampling_rate >= 1.0);
        let low = TelemetryConfig {
            enabled: true,
            otlp_endpoint: String::new(),
            sampling_rate: -0.5,
        };
        assert!(low.sampling_rate <= 0.0);
    }
}
