/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Relay Types
//!
//! Core domain types shared by every crate in the webhook relay: the
//! typed event-argument envelope, the blockchain event value type, the
//! durable `Delivery` / `DeadLetterEntry` database models and their
//! diesel schema, and the `Metric` row used by the persisted metrics
//! flush.

pub mod argvalue;
pub mod dead_letter;
pub mod delivery;
pub mod event;
pub mod metric;
pub mod schema;
pub mod subscription;

pub use argvalue::{ArgMap, ArgValue, FilterPredicate};
pub use dead_letter::{DeadLetterEntry, DeadLetterStats, FailureReasonCount, NewDeadLetterEntry};
pub use delivery::{
    Delivery, NewDelivery, DELIVERY_STATUS_COMPLETED, DELIVERY_STATUS_DEAD,
    DELIVERY_STATUS_FAILED, DELIVERY_STATUS_PENDING, DELIVERY_STATUS_PROCESSING,
    VALID_DELIVERY_STATUSES,
};
pub use event::BlockchainEvent;
pub use metric::{MetricKind, MetricRow, NewMetricRow};
pub use subscription::{FilterMap, Subscription, WebhookEndpoint, WebhookFormat};
