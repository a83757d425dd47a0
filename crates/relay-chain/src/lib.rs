/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Event Source
//!
//! Tails EVM chain logs, decodes them against the declared event
//! signatures of the current subscription set, deduplicates within an
//! in-process confirmation window, and dispatches matched events.
//! Connectivity state is exposed for the health HTTP surface.

mod cursor;
mod decode;
mod dedup;
mod dispatch;
mod source;
mod status;

pub use cursor::{initial_confirmed_head, ConfirmationBuffer};
pub use decode::{decode_log, topic0, DecodeError};
pub use dispatch::matched_subscriptions;
pub use source::{ChainError, EventSource, EventSourceConfig, MatchedEvent};
pub use status::{ChainStatus, ChainStatusHandle};
