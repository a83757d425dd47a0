/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! The value type produced by the Event Source for every matched log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::argvalue::ArgMap;

/// A single decoded, confirmed log entry from the chain.
///
/// Immutable once produced. `(block_number, tx_hash, log_index)`
/// uniquely identifies an event within the confirmation dedup window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockchainEvent {
    /// Contract address the log was emitted from, `0x`-prefixed lowercase hex.
    pub contract_address: String,
    /// Decoded event name, e.g. "Transfer".
    pub event_name: String,
    /// Block number the log was included in.
    pub block_number: u64,
    /// Transaction hash, `0x`-prefixed lowercase hex.
    pub tx_hash: String,
    /// Log index within the block.
    pub log_index: u32,
    /// Decoded event arguments, keyed by parameter name.
    pub args: ArgMap,
    /// When this relay observed the event (not the block timestamp).
    pub observed_at: DateTime<Utc>,
}

impl BlockchainEvent {
    /// The dedup key used by the Event Source's confirmation-window
    /// deduplication.
    pub fn dedup_key(&self) -> (u64, String, u32) {
        (self.block_number, self.tx_hash.clone(), self.log_index)
    }

    /// Looks up an argument by dotted path (e.g. `"args.from"` with the
    /// leading `args.` already stripped by the caller, or a nested
    /// `"metadata.from"`-style path once embedded in a formatter
    /// output). Only single-segment paths are meaningful against the
    /// flat argument map; nested traversal is the Filter Engine's
    /// concern and lives in `relay-filter`.
    pub fn arg(&self, name: &str) -> Option<&crate::argvalue::ArgValue> {
        self.args.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argvalue::ArgValue;

    fn sample_event() -> BlockchainEvent {
        let mut args = ArgMap::new();
        args.insert("from".to_string(), ArgValue::Address("0xaaaa".to_string()));
        args.insert("to".to_string(), ArgValue::Address("0xbbbb".to_string()));
        args.insert("value".to_string(), ArgValue::BigInt("1000".to_string()));
        BlockchainEvent {
            contract_address: "0x1234567890123456789012345678901234567890".to_string(),
            event_name: "Transfer".to_string(),
            block_number: 100,
            tx_hash: "0xdead".to_string(),
            log_index: 0,
            args,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn dedup_key_is_block_tx_log_index() {
        let e = sample_event();
        assert_eq!(e.dedup_key(), (100, "0xdead".to_string(), 0));
    }

    #[test]
    fn arg_lookup_by_name() {
        let e = sample_event();
        assert_eq!(
            e.arg("from"),
            Some(&ArgValue::Address("0xaaaa".to_string()))
        );
        assert_eq!(e.arg("missing"), None);
    }
}
