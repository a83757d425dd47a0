/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Per-chain confirmation buffer: a log is only released to the
//! decoder once it is `confirmations` blocks deep, so a reorg
//! shallower than that depth is never surfaced to a subscriber. Used
//! by both the WS (log-push + block-head) and HTTP-poll (head-bounded
//! range query) transports in [`crate::source`].

use std::collections::BTreeMap;

use ethers::types::Log;

/// Buffers logs by block number until the chain head has advanced far
/// enough past them.
pub struct ConfirmationBuffer {
    confirmations: u64,
    pending: BTreeMap<u64, Vec<Log>>,
}

impl ConfirmationBuffer {
    pub fn new(confirmations: u64) -> Self {
        Self {
            confirmations,
            pending: BTreeMap::new(),
        }
    }

    /// Queues `log` for release once its block is confirmed.
    pub fn push(&mut self, log: Log) {
        let block = log.block_number.map(|n| n.as_u64()).unwrap_or(0);
        self.pending.entry(block).or_default().push(log);
    }

    /// Given the current chain head, drains and returns every buffered
    /// log whose block is now `confirmations` deep, oldest block
    /// first and in log-index order within a block. Shallower entries
    /// remain buffered for a future call.
    pub fn release(&mut self, head: u64) -> Vec<Log> {
        let threshold = head.saturating_sub(self.confirmations);
        let ready_blocks: Vec<u64> = self.pending.range(..=threshold).map(|(block, _)| *block).collect();

        let mut released = Vec::new();
        for block in ready_blocks {
            if let Some(mut logs) = self.pending.remove(&block) {
                logs.sort_by_key(|log| log.log_index.map(|i| i.as_u64()).unwrap_or(0));
                released.append(&mut logs);
            }
        }
        released
    }

    /// Number of blocks still awaiting confirmation, for diagnostics.
    pub fn pending_blocks(&self) -> usize {
        self.pending.len()
    }
}

/// The first block the HTTP-poll transport should request logs from:
/// `head - confirmations`, with deliberately no backfill below that
/// depth at startup.
pub fn initial_confirmed_head(head: u64, confirmations: u64) -> u64 {
    head.saturating_sub(confirmations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U64;

    fn log_at(block: u64, index: u64) -> Log {
        let mut log = Log::default();
        log.block_number = Some(U64::from(block));
        log.log_index = Some(index.into());
        log
    }

    #[test]
    fn release_holds_back_shallow_blocks() {
        let mut buffer = ConfirmationBuffer::new(5);
        buffer.push(log_at(100, 0));
        assert!(buffer.release(102).is_empty());
        assert_eq!(buffer.pending_blocks(), 1);
    }

    #[test]
    fn release_emits_once_confirmation_depth_reached() {
        let mut buffer = ConfirmationBuffer::new(5);
        buffer.push(log_at(100, 0));
        let released = buffer.release(105);
        assert_eq!(released.len(), 1);
        assert_eq!(buffer.pending_blocks(), 0);
    }

    #[test]
    fn release_orders_by_block_then_log_index() {
        let mut buffer = ConfirmationBuffer::new(0);
        buffer.push(log_at(101, 1));
        buffer.push(log_at(100, 2));
        buffer.push(log_at(100, 0));
        let released = buffer.release(101);
        let keys: Vec<(u64, u64)> = released
            .iter()
            .map(|l| (l.block_number.unwrap().as_u64(), l.log_index.unwrap().as_u64()))
            .collect();
        assert_eq!(keys, vec![(100, 0), (100, 2), (101, 1)]);
    }

    #[test]
    fn initial_confirmed_head_never_goes_negative() {
        assert_eq!(initial_confirmed_head(3, 10), 0);
        assert_eq!(initial_confirmed_head(100, 10), 90);
    }
}
