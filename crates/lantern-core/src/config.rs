//! Mesh configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Mesh layer configuration
///
/// The defaults match the timing used on battery-powered field hardware;
/// [`MeshConfig::local_test`] shrinks them so tests finish quickly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Maximum number of routing table entries
    pub max_nodes: usize,
    /// Number of remembered broadcast ids for duplicate suppression
    pub broadcast_history: usize,
    /// Number of outbound queue slots
    pub send_queue_slots: usize,
    /// Routing entries not refreshed within this window are evicted
    pub inactivity_timeout_ms: u64,
    /// Topology sync interval right after boot or a disruption
    pub sync_interval_initial_ms: u64,
    /// Topology sync interval once the mesh has settled
    pub sync_interval_steady_ms: u64,
    /// Quiet time before switching to the steady sync interval
    pub sync_settle_ms: u64,
    /// Upper bound on clear-channel retries before a message is dropped
    pub channel_busy_timeout_ms: u64,
    /// Watchdog bound on time spent in the transmitting state
    pub transmit_watchdog_ms: u64,
    /// Bounded wait for exclusive routing-state access
    pub lock_wait_ms: u64,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            max_nodes: 48,
            broadcast_history: 10,
            send_queue_slots: 2,
            inactivity_timeout_ms: 120_000,
            sync_interval_initial_ms: 30_000,
            sync_interval_steady_ms: 60_000,
            sync_settle_ms: 300_000,
            channel_busy_timeout_ms: 5_000,
            transmit_watchdog_ms: 2_000,
            lock_wait_ms: 1_000,
        }
    }
}

impl MeshConfig {
    /// Create a configuration for local testing with short timers
    pub fn local_test() -> Self {
        Self {
            max_nodes: 8,
            broadcast_history: 4,
            send_queue_slots: 2,
            inactivity_timeout_ms: 200,
            sync_interval_initial_ms: 50,
            sync_interval_steady_ms: 100,
            sync_settle_ms: 500,
            channel_busy_timeout_ms: 100,
            transmit_watchdog_ms: 100,
            lock_wait_ms: 100,
        }
    }

    /// Inactivity timeout as a `Duration`
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_millis(self.inactivity_timeout_ms)
    }

    /// Bounded lock wait as a `Duration`
    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    /// Channel-access retry bound as a `Duration`
    pub fn channel_busy_timeout(&self) -> Duration {
        Duration::from_millis(self.channel_busy_timeout_ms)
    }

    /// Transmit watchdog bound as a `Duration`
    pub fn transmit_watchdog(&self) -> Duration {
        Duration::from_millis(self.transmit_watchdog_ms)
    }
}
