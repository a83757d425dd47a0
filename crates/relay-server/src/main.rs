/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Binary entry point. Loads configuration, opens the database pool,
//! wires the Event Source through the dispatcher into the Queue
//! Processor, and serves the health/metrics/admin HTTP surface until
//! a shutdown signal stops every subsystem in turn.

mod admin;
mod endpoints;
mod health;
mod openapi;
mod shutdown;
mod subscriptions;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use clap::Parser;
use relay_chain::{EventSource, EventSourceConfig};
use relay_config::{ConfigWatcherConfig, ReloadableConfig};
use relay_deadletter::{CleanupConfig, DeadLetterDAL};
use relay_processor::ProcessorConfig;
use relay_queue::{create_pool, run_migrations, DeliveriesDAL};
use relay_sender::HttpSender;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

/// How often the HTTP-poll transport re-checks the chain head. Not
/// part of the configuration contract (only `queueProcessingInterval`
/// is), so fixed here rather than overloading an unrelated knob.
const CHAIN_POLL_INTERVAL_MS: u64 = 5_000;
const METRICS_FLUSH_INTERVAL_SECONDS: u64 = 60;
const CONFIG_WATCH_DEBOUNCE: Duration = Duration::from_secs(2);
const DISPATCH_CHANNEL_CAPACITY: usize = 1024;
const DEDUP_WINDOW_CAPACITY: usize = 4096;
const PROCESSOR_SHUTDOWN_DRAIN_MS: u64 = 30_000;

/// Blockchain event webhook relay.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a configuration file layered over the embedded defaults.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match ReloadableConfig::load(cli.config.clone()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration invalid: {e}");
            return ExitCode::from(2);
        }
    };
    let settings = config.current();

    if let Err(e) =
        relay_config::telemetry::init(&settings.telemetry, &settings.monitoring.log_level, "relay-server")
    {
        eprintln!("failed to initialize telemetry: {e}");
        return ExitCode::FAILURE;
    }

    info!(
        chain_id = settings.network.chain_id,
        subscriptions = settings.subscriptions.len(),
        "starting relay-server"
    );

    let pool = match create_pool(&settings.database.url, settings.database.pool_size) {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "failed to create database connection pool");
            return ExitCode::from(3);
        }
    };
    if let Err(e) = run_migrations(&pool) {
        error!(error = %e, "failed to run database migrations");
        return ExitCode::from(3);
    }

    relay_metrics::load_historical_metrics(&pool);

    let deliveries = Arc::new(DeliveriesDAL::new(pool.clone()));
    let dead_letters = Arc::new(DeadLetterDAL::new(pool.clone()));
    let sender = Arc::new(HttpSender::new());

    match deliveries.reap_expired_leases() {
        Ok(reaped) if reaped > 0 => info!(reaped, "recovered leases abandoned by a previous process"),
        Ok(_) => {}
        Err(e) => error!(error = %e, "failed to reap expired leases at startup"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let subscriptions_rx = subscriptions::spawn(&config);
    let endpoint_lookup: Arc<dyn relay_processor::EndpointLookup> =
        Arc::new(endpoints::ConfigEndpointLookup::new(config.watch()));

    let event_source = EventSource::new();
    let chain_status = event_source.status_handle();
    let (dispatch_tx, dispatch_rx) = mpsc::channel(DISPATCH_CHANNEL_CAPACITY);

    let event_source_config = EventSourceConfig {
        rpc_url: settings.network.rpc_url.clone(),
        ws_url: settings.network.ws_url.clone(),
        confirmations: settings.network.confirmations,
        poll_interval_ms: CHAIN_POLL_INTERVAL_MS,
        dedup_window_capacity: DEDUP_WINDOW_CAPACITY,
    };

    let event_source_handle = tokio::spawn({
        let subscriptions_rx = subscriptions_rx.clone();
        let shutdown_rx = shutdown_rx.clone();
        async move {
            event_source.run(event_source_config, subscriptions_rx, dispatch_tx, shutdown_rx).await;
        }
    });

    let dispatcher_handle = tokio::spawn(relay_processor::run_dispatcher(
        dispatch_rx,
        subscriptions_rx.clone(),
        deliveries.clone(),
        settings.options.default_retry_attempts,
        shutdown_rx.clone(),
    ));

    let processor_config = ProcessorConfig {
        max_concurrent_webhooks: settings.options.max_concurrent_webhooks as usize,
        lease_batch_size: settings.options.max_concurrent_webhooks as i64,
        poll_interval_ms: settings.options.queue_processing_interval,
        shutdown_drain_ms: PROCESSOR_SHUTDOWN_DRAIN_MS,
    };
    let processor_handle = tokio::spawn(relay_processor::run_processor(
        processor_config,
        deliveries.clone(),
        dead_letters.clone(),
        sender.clone(),
        endpoint_lookup,
        shutdown_rx.clone(),
    ));

    let reaper_handle = relay_processor::start_reaper_task(deliveries.clone(), shutdown_rx.clone());

    let cleanup_handle =
        relay_deadletter::start_cleanup_task(dead_letters.clone(), CleanupConfig::default(), shutdown_rx.clone());
    let flush_handle = relay_metrics::start_flush_task(
        Arc::new(pool.clone()),
        METRICS_FLUSH_INTERVAL_SECONDS,
        shutdown_rx.clone(),
    );

    if let Some(path) = cli.config.clone() {
        relay_config::start_config_watcher(
            config.clone(),
            ConfigWatcherConfig { config_file_path: path, debounce: CONFIG_WATCH_DEBOUNCE },
        );
    }

    let health_state = health::HealthState { chain_status, db_pool: pool.clone() };
    let admin_state = admin::AdminState { deliveries: deliveries.clone(), dead_letters: dead_letters.clone() };

    let app = Router::new()
        .merge(health::routes().with_state(health_state))
        .merge(admin::routes().with_state(admin_state))
        .merge(openapi::configure_openapi::<()>());

    let addr = format!("0.0.0.0:{}", settings.monitoring.health_check_port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, %addr, "failed to bind http listener");
            return ExitCode::from(3);
        }
    };
    info!(%addr, "relay-server listening");

    tokio::spawn(shutdown::wait_for_signal(shutdown_tx));

    let mut graceful_shutdown = shutdown_rx.clone();
    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = graceful_shutdown.changed().await;
        })
        .await;

    // Shutdown order (spec hard requirement): Event Source stops first
    // (no new deliveries enqueued), then the Processor drains in-flight
    // sends, then dead-letter cleanup finishes its batch, then metrics
    // take a final flush, then the database handle closes.
    if let Err(e) = event_source_handle.await {
        error!(error = %e, "event source task panicked during shutdown");
    }
    if let Err(e) = dispatcher_handle.await {
        error!(error = %e, "dispatcher task panicked during shutdown");
    }
    if let Err(e) = processor_handle.await {
        error!(error = %e, "processor task panicked during shutdown");
    }
    if let Err(e) = reaper_handle.await {
        error!(error = %e, "lease reaper task panicked during shutdown");
    }
    if let Err(e) = cleanup_handle.await {
        error!(error = %e, "dead-letter cleanup task panicked during shutdown");
    }
    if let Err(e) = flush_handle.await {
        error!(error = %e, "metrics flush task panicked during shutdown");
    }
    drop(pool);

    relay_config::telemetry::shutdown();

    match serve_result {
        Ok(()) => ExitCode::from(130),
        Err(e) => {
            error!(error = %e, "http server exited with an error");
            ExitCode::FAILURE
        }
    }
}
