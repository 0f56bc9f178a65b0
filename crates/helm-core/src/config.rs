//! Console configuration model.
//!
//! Every knob has a default so a missing `config.toml`, or a file that only
//! sets some keys, still yields a complete configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and capacity settings for the console core.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ConsoleConfig {
    /// How long an unclaimed pending event is kept before it is purged.
    pub pending_ttl_ms: u64,
    /// Interval of the periodic sweep (pending buffer and idle placeholders).
    pub sweep_interval_ms: u64,
    /// Delay after a terminal status before a lingering placeholder is cleared.
    pub stream_safety_net_ms: u64,
    /// A placeholder with no chunk for this long is cleared by the sweep.
    pub stream_idle_timeout_ms: u64,
    /// Quiet period before a queued preference write hits storage.
    pub preference_debounce_ms: u64,
    /// Resolution of the recording elapsed-time clock.
    pub recording_tick_ms: u64,
    /// Capacity of the view-update broadcast channel.
    pub view_bus_capacity: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            pending_ttl_ms: 30_000,
            sweep_interval_ms: 10_000,
            stream_safety_net_ms: 300,
            stream_idle_timeout_ms: 60_000,
            preference_debounce_ms: 500,
            recording_tick_ms: 1_000,
            view_bus_capacity: 256,
        }
    }
}

impl ConsoleConfig {
    pub fn pending_ttl(&self) -> Duration {
        Duration::from_millis(self.pending_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn stream_safety_net(&self) -> Duration {
        Duration::from_millis(self.stream_safety_net_ms)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_idle_timeout_ms)
    }

    pub fn preference_debounce(&self) -> Duration {
        Duration::from_millis(self.preference_debounce_ms)
    }

    pub fn recording_tick(&self) -> Duration {
        Duration::from_millis(self.recording_tick_ms)
    }
}
