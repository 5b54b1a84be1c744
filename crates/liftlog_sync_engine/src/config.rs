//! Configuration for the sync orchestrator.

use std::time::Duration;

/// Configuration for sync orchestration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Pause before servicing a queued trigger, so bursts of triggers do
    /// not thrash the stores.
    pub drain_delay: Duration,
    /// Interval between automatic syncs started by `start_periodic`.
    pub periodic_interval: Duration,
    /// Capacity of the queued-trigger FIFO.
    pub max_queued_triggers: usize,
}

impl SyncConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            drain_delay: Duration::from_millis(500),
            periodic_interval: Duration::from_secs(15 * 60),
            max_queued_triggers: 8,
        }
    }

    /// Sets the queued-trigger drain delay.
    pub fn with_drain_delay(mut self, delay: Duration) -> Self {
        self.drain_delay = delay;
        self
    }

    /// Sets the periodic sync interval.
    pub fn with_periodic_interval(mut self, interval: Duration) -> Self {
        self.periodic_interval = interval;
        self
    }

    /// Sets the queued-trigger capacity.
    pub fn with_max_queued_triggers(mut self, capacity: usize) -> Self {
        self.max_queued_triggers = capacity;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
