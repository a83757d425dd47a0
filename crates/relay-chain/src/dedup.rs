/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! In-process, non-persisted dedup window over recently observed
//! `(block, tx, log_index)` triples. A restart resumes from
//! head-minus-confirmations rather than replaying this window (see
//! the Open Question decision recorded in DESIGN.md), so it only
//! needs to survive one process's uptime.

use std::collections::{HashSet, VecDeque};

type DedupKey = (u64, String, u32);

/// A bounded FIFO of recently seen dedup keys.
pub struct DedupWindow {
    capacity: usize,
    order: VecDeque<DedupKey>,
    seen: HashSet<DedupKey>,
}

impl DedupWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    /// Returns `true` and records `key` if it has not been seen yet;
    /// returns `false` if `key` is a duplicate within the window.
    pub fn observe(&mut self, key: DedupKey) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.seen.insert(key);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_is_accepted() {
        let mut window = DedupWindow::new(4);
        assert!(window.observe((1, "0xabc".to_string(), 0)));
    }

    #[test]
    fn repeated_observation_is_rejected() {
        let mut window = DedupWindow::new(4);
        let key = (1, "0xabc".to_string(), 0);
        assert!(window.observe(key.clone()));
        assert!(!window.observe(key));
    }

    #[test]
    fn window_evicts_oldest_beyond_capacity() {
        let mut window = DedupWindow::new(2);
        assert!(window.observe((1, "0xa".to_string(), 0)));
        assert!(window.observe((2, "0xb".to_string(), 0)));
        assert!(window.observe((3, "0xc".to_string(), 0)));
        // (1, 0xa, 0) has been evicted, so it is accepted again.
        assert!(window.observe((1, "0xa".to_string(), 0)));
    }
}
