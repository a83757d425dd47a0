/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Delivery Queue
//!
//! The durable boundary of the pipeline: `deliveries` rows move
//! `pending -> processing -> (completed | pending again | dead)`,
//! leased in batches under `FOR UPDATE SKIP LOCKED` so no two workers
//! ever hold the same row at once.

pub mod db;
pub mod deliveries;

pub use db::{create_pool, run_migrations, ConnectionPool, PooledConn};
pub use deliveries::{DeliveriesDAL, QueueError, QueueStats};
