/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Dead-Letter Store
//!
//! Holds deliveries the pipeline has permanently given up on, either
//! because `max_attempts` was exhausted against a retriable failure or
//! because the first failure was classified non-retriable. Entries are
//! inspectable and replayable back into the delivery queue by an
//! operator, and aged out by a background retention sweep.

mod cleanup;
mod dal;

pub use cleanup::{start_cleanup_task, CleanupConfig};
pub use dal::{DeadLetterDAL, DlqError};
