/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Queue Processor
//!
//! Two cooperating halves: [`dispatch::run`] turns a matched chain
//! event into one [`relay_types::NewDelivery`] per `(subscription,
//! webhook)` pair and enqueues it, and [`worker::run`] leases batches
//! of visible deliveries, invokes the HTTP Sender, and resolves each
//! outcome via the pure [`outcome::classify_outcome`] function into a
//! complete/retry/dead-letter decision.

mod dispatch;
mod outcome;
mod reaper;
mod worker;

pub use dispatch::run as run_dispatcher;
pub use outcome::{classify_outcome, DeliveryDecision};
pub use reaper::start_reaper_task;
pub use worker::{run as run_processor, EndpointLookup, ProcessorConfig};
