/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Event Source
//!
//! Tails chain logs for the current subscription set and funnels
//! matched, confirmed events to the dispatcher. Prefers a WS log
//! subscription (`network.wsUrl`), falling back to polling
//! `eth_getLogs` over HTTP when no WS endpoint is configured. Both
//! paths converge on the same `BlockchainEvent` construction and
//! confirmation/dedup handling so the rest of the pipeline is
//! oblivious to which transport is active.
//!
//! Reconnects use the same exponential-backoff-with-full-jitter shape
//! as the Retry Scheduler (1s -> 30s, unbounded attempts), rather than
//! a fixed-count reconnect loop.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use ethers::providers::{Http, Middleware, Provider, StreamExt, Ws};
use ethers::types::{Address as EthAddress, Filter as EthFilter, ValueOrArray, H256};
use relay_types::{BlockchainEvent, Subscription};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cursor::{initial_confirmed_head, ConfirmationBuffer};
use crate::decode::{decode_log, topic0};
use crate::dedup::DedupWindow;
use crate::dispatch::matched_subscriptions;
use crate::status::{ChainStatus, ChainStatusHandle};

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("failed to connect to chain endpoint: {0}")]
    Connect(String),
    #[error("subscription failed: {0}")]
    Subscription(String),
    #[error("rpc call failed: {0}")]
    Rpc(String),
}

/// One event matched against the current subscription set, ready for
/// the Queue Processor's dispatcher to fan out into deliveries.
#[derive(Debug, Clone)]
pub struct MatchedEvent {
    pub event: BlockchainEvent,
    pub matched_subscriptions: Vec<Uuid>,
}

/// Static configuration the Event Source needs once at startup; the
/// subscription set itself is read from the live config snapshot on
/// every reload.
#[derive(Debug, Clone)]
pub struct EventSourceConfig {
    pub rpc_url: String,
    pub ws_url: Option<String>,
    pub confirmations: u64,
    pub poll_interval_ms: u64,
    pub dedup_window_capacity: usize,
}

/// Tails the chain and dispatches matched events until shutdown.
pub struct EventSource {
    status: ChainStatusHandle,
}

impl Default for EventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource {
    pub fn new() -> Self {
        Self { status: ChainStatusHandle::default() }
    }

    pub fn status_handle(&self) -> ChainStatusHandle {
        self.status.clone()
    }

    /// Runs until `shutdown` reports `true`. Reconnects with backoff on
    /// any transport failure; never returns early on a transient error.
    pub async fn run(
        &self,
        config: EventSourceConfig,
        subscriptions: watch::Receiver<Arc<Vec<Subscription>>>,
        dispatch_tx: mpsc::Sender<MatchedEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let backoff = relay_retry::RetryPolicy {
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_factor: 0.1,
        };
        let mut attempt: u32 = 0;
        let mut dedup = DedupWindow::new(config.dedup_window_capacity);

        loop {
            if *shutdown.borrow() {
                info!("event source stopping");
                return;
            }

            let outcome = if config.ws_url.is_some() {
                self.run_ws(&config, &subscriptions, &dispatch_tx, &mut dedup, &mut shutdown).await
            } else {
                self.run_http_poll(&config, &subscriptions, &dispatch_tx, &mut dedup, &mut shutdown).await
            };

            if *shutdown.borrow() {
                return;
            }

            match outcome {
                Ok(()) => attempt = 0,
                Err(e) => {
                    self.status.set(ChainStatus::Degraded);
                    let delay_ms = backoff.next_delay_ms(attempt);
                    attempt = attempt.saturating_add(1);
                    warn!(error = %e, attempt, delay_ms, "event source transport failed, reconnecting");

                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }
    }

    async fn run_ws(
        &self,
        config: &EventSourceConfig,
        subscriptions: &watch::Receiver<Arc<Vec<Subscription>>>,
        dispatch_tx: &mpsc::Sender<MatchedEvent>,
        dedup: &mut DedupWindow,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), ChainError> {
        let ws_url = config.ws_url.as_ref().expect("run_ws called without ws_url configured");
        let provider = Provider::<Ws>::connect(ws_url.as_str())
            .await
            .map_err(|e| ChainError::Connect(e.to_string()))?;

        let mut subscriptions = subscriptions.clone();
        let mut filter = build_filter(&subscriptions.borrow());
        let mut log_stream = provider
            .subscribe_logs(&filter)
            .await
            .map_err(|e| ChainError::Subscription(e.to_string()))?;
        let mut block_stream = provider
            .subscribe_blocks()
            .await
            .map_err(|e| ChainError::Subscription(e.to_string()))?;

        let mut confirmed = ConfirmationBuffer::new(config.confirmations);

        self.status.set(ChainStatus::Connected);
        info!(confirmations = config.confirmations, "event source connected over websocket");

        loop {
            tokio::select! {
                maybe_log = log_stream.next() => {
                    let Some(log) = maybe_log else {
                        return Err(ChainError::Subscription("log stream ended".to_string()));
                    };
                    // Buffered here, not dispatched yet: only released
                    // once `block_stream` reports the head has moved
                    // `confirmations` blocks past this log's block, so
                    // a shallower reorg never surfaces it.
                    confirmed.push(log);
                }
                maybe_block = block_stream.next() => {
                    let Some(block) = maybe_block else {
                        return Err(ChainError::Subscription("block stream ended".to_string()));
                    };
                    let Some(head) = block.number else { continue };
                    for log in confirmed.release(head.as_u64()) {
                        self.handle_log(&log, &subscriptions.borrow(), dedup, dispatch_tx).await;
                    }
                }
                changed = subscriptions.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                    // Recompute the filter atomically against the new
                    // subscription set and resubscribe; no cursor gap
                    // since the stream handle is only replaced here.
                    filter = build_filter(&subscriptions.borrow());
                    log_stream = provider
                        .subscribe_logs(&filter)
                        .await
                        .map_err(|e| ChainError::Subscription(e.to_string()))?;
                    info!("event source filter recomputed after subscription change");
                }
                _ = shutdown.changed() => {
                    return Ok(());
                }
            }
        }
    }

    async fn run_http_poll(
        &self,
        config: &EventSourceConfig,
        subscriptions: &watch::Receiver<Arc<Vec<Subscription>>>,
        dispatch_tx: &mpsc::Sender<MatchedEvent>,
        dedup: &mut DedupWindow,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), ChainError> {
        let provider: Provider<Http> =
            Provider::try_from(config.rpc_url.as_str()).map_err(|e| ChainError::Connect(e.to_string()))?;

        let mut subscriptions = subscriptions.clone();
        let mut ticker = tokio::time::interval(Duration::from_millis(config.poll_interval_ms));

        // Cursor starts at head-minus-confirmations; there is no
        // backfill of anything older at startup.
        let head = provider.get_block_number().await.map_err(|e| ChainError::Rpc(e.to_string()))?;
        let mut last_confirmed = initial_confirmed_head(head.as_u64(), config.confirmations);

        self.status.set(ChainStatus::Connected);
        info!(confirmations = config.confirmations, cursor = last_confirmed, "event source polling over http");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let head = match provider.get_block_number().await {
                        Ok(head) => head.as_u64(),
                        Err(e) => return Err(ChainError::Rpc(e.to_string())),
                    };
                    let target = initial_confirmed_head(head, config.confirmations);
                    if target > last_confirmed {
                        let filter = build_filter(&subscriptions.borrow())
                            .from_block(last_confirmed + 1)
                            .to_block(target);
                        match provider.get_logs(&filter).await {
                            Ok(mut logs) => {
                                logs.sort_by_key(|l| {
                                    (l.block_number.map(|n| n.as_u64()).unwrap_or(0),
                                     l.log_index.map(|i| i.as_u64()).unwrap_or(0))
                                });
                                for log in &logs {
                                    self.handle_log(log, &subscriptions.borrow(), dedup, dispatch_tx).await;
                                }
                                last_confirmed = target;
                            }
                            Err(e) => return Err(ChainError::Rpc(e.to_string())),
                        }
                    }
                }
                changed = subscriptions.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                }
                _ = shutdown.changed() => {
                    return Ok(());
                }
            }
        }
    }

    async fn handle_log(
        &self,
        log: &ethers::types::Log,
        subscriptions: &[Subscription],
        dedup: &mut DedupWindow,
        dispatch_tx: &mpsc::Sender<MatchedEvent>,
    ) {
        let Some(topic0) = log.topics.first() else { return };
        let Some(signature) = signature_for_topic(subscriptions, topic0) else { return };

        let event = match decode_log(&signature, log) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "failed to decode log, skipping");
                return;
            }
        };

        if !dedup.observe(event.dedup_key()) {
            return;
        }

        let matched = matched_subscriptions(&event, subscriptions);
        if matched.is_empty() {
            return;
        }

        if dispatch_tx.send(MatchedEvent { event, matched_subscriptions: matched }).await.is_err() {
            error!("dispatch channel closed, dropping matched event");
        }
    }
}

fn signature_for_topic(subscriptions: &[Subscription], topic: &H256) -> Option<String> {
    subscriptions.iter().flat_map(|s| s.event_signatures.iter()).find(|sig| &topic0(sig) == topic).cloned()
}

/// Builds the chain-side log filter from the current subscription set:
/// every declared contract address, OR-ed across every declared event
/// signature's topic0.
fn build_filter(subscriptions: &[Subscription]) -> EthFilter {
    let addresses: Vec<EthAddress> = subscriptions
        .iter()
        .flat_map(|s| s.contract_addresses.iter())
        .filter_map(|a| a.parse().ok())
        .collect();

    let topics: BTreeSet<H256> = subscriptions
        .iter()
        .flat_map(|s| s.event_signatures.iter())
        .map(|sig| topic0(sig))
        .collect();

    let mut filter = EthFilter::new();
    if !addresses.is_empty() {
        filter = filter.address(ValueOrArray::Array(addresses));
    }
    if !topics.is_empty() {
        filter = filter.topic0(topics.into_iter().collect::<Vec<_>>());
    }
    filter
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_types::{FilterMap, WebhookEndpoint, WebhookFormat};
    use url::Url;

    fn sample_subscription() -> Subscription {
        Subscription {
            sub_id: Uuid::new_v4(),
            contract_addresses: vec!["0x1234567890123456789012345678901234567890".to_string()],
            event_signatures: vec!["Transfer(address,address,uint256)".to_string()],
            filter: FilterMap::new(),
            webhooks: vec![WebhookEndpoint {
                webhook_id: Uuid::new_v4(),
                url: Url::parse("https://example.com/hook").unwrap(),
                format: WebhookFormat::Generic,
                headers: Default::default(),
                timeout_ms: 5000,
                retry_attempts: 3,
            }],
        }
    }

    #[test]
    fn signature_for_topic_finds_declared_signature() {
        let subs = vec![sample_subscription()];
        let topic = topic0("Transfer(address,address,uint256)");
        assert_eq!(signature_for_topic(&subs, &topic), Some("Transfer(address,address,uint256)".to_string()));
    }

    #[test]
    fn signature_for_topic_is_none_for_unrelated_topic() {
        let subs = vec![sample_subscription()];
        let topic = topic0("Approval(address,address,uint256)");
        assert_eq!(signature_for_topic(&subs, &topic), None);
    }

    #[test]
    fn build_filter_includes_declared_addresses() {
        let subs = vec![sample_subscription()];
        let filter = build_filter(&subs);
        let json = serde_json::to_string(&filter).unwrap();
        assert!(json.to_lowercase().contains("0x1234567890123456789012345678901234567890"));
    }
}
