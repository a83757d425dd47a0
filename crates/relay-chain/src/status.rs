/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Shared chain connectivity state, read by the health HTTP handler
//! the same way an agent's connectivity status type exposes broker
//! connectivity.

use std::sync::{Arc, RwLock};

/// Coarse connectivity state of the Event Source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainStatus {
    /// Actively tailing logs, either via WS subscription or HTTP polling.
    Connected,
    /// Reconnecting after a transport failure; stale reads are possible.
    Degraded,
}

/// A shared, cheaply-cloned handle to the current [`ChainStatus`].
#[derive(Clone)]
pub struct ChainStatusHandle(Arc<RwLock<ChainStatus>>);

impl Default for ChainStatusHandle {
    fn default() -> Self {
        Self(Arc::new(RwLock::new(ChainStatus::Degraded)))
    }
}

impl ChainStatusHandle {
    pub fn get(&self) -> ChainStatus {
        *self.0.read().expect("chain status lock poisoned")
    }

    pub fn set(&self, status: ChainStatus) {
        *self.0.write().expect("chain status lock poisoned") = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_degraded_until_connected() {
        let handle = ChainStatusHandle::default();
        assert_eq!(handle.get(), ChainStatus::Degraded);
        handle.set(ChainStatus::Connected);
        assert_eq!(handle.get(), ChainStatus::Connected);
    }
}
