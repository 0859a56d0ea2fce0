//! Topology sync schedule
//!
//! Nodes flood a snapshot of their routing table on an adaptive interval:
//! short right after boot or any disruption so a changing mesh converges
//! quickly, relaxing to a longer steady-state interval once a grace period
//! passes without disruption.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use lantern_core::{MeshConfig, NodeId};
use lantern_proto::WireMessage;
use lantern_routing::RoutingState;

/// Adaptive interval tracker for the sync driver
pub struct SyncSchedule {
    current: Duration,
    initial: Duration,
    steady: Duration,
    settle: Duration,
    quiet_since: Instant,
}

impl SyncSchedule {
    /// Create a schedule starting at the short post-boot interval
    pub fn new(config: &MeshConfig) -> Self {
        let initial = Duration::from_millis(config.sync_interval_initial_ms);
        Self {
            current: initial,
            initial,
            steady: Duration::from_millis(config.sync_interval_steady_ms),
            settle: Duration::from_millis(config.sync_settle_ms),
            quiet_since: Instant::now(),
        }
    }

    /// The interval currently in force
    pub fn interval(&self) -> Duration {
        self.current
    }

    /// Record a topology disruption: back to the short interval
    pub fn disrupted(&mut self) {
        if self.current != self.initial {
            debug!("Topology disrupted, sync interval back to initial");
        }
        self.current = self.initial;
        self.quiet_since = Instant::now();
    }

    /// Relax to the steady interval once the grace period has passed
    pub fn maybe_relax(&mut self) {
        if self.current != self.steady && self.quiet_since.elapsed() >= self.settle {
            debug!("Mesh settled, sync interval relaxed to steady");
            self.current = self.steady;
            self.quiet_since = Instant::now();
        }
    }
}

/// Build the outbound snapshot frame from the current routing table
pub fn build_snapshot(local_id: NodeId, state: &RoutingState) -> WireMessage {
    WireMessage::TopologySnapshot {
        from: local_id,
        entries: state.table().snapshot(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MeshConfig {
        MeshConfig {
            sync_interval_initial_ms: 30_000,
            sync_interval_steady_ms: 60_000,
            sync_settle_ms: 300_000,
            ..MeshConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_relaxes_after_settle_period() {
        let mut schedule = SyncSchedule::new(&config());
        assert_eq!(schedule.interval(), Duration::from_secs(30));

        schedule.maybe_relax();
        assert_eq!(schedule.interval(), Duration::from_secs(30));

        tokio::time::advance(Duration::from_secs(301)).await;
        schedule.maybe_relax();
        assert_eq!(schedule.interval(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disruption_resets_to_initial() {
        let mut schedule = SyncSchedule::new(&config());
        tokio::time::advance(Duration::from_secs(301)).await;
        schedule.maybe_relax();
        assert_eq!(schedule.interval(), Duration::from_secs(60));

        schedule.disrupted();
        assert_eq!(schedule.interval(), Duration::from_secs(30));

        // The grace period starts over after the disruption
        tokio::time::advance(Duration::from_secs(150)).await;
        schedule.maybe_relax();
        assert_eq!(schedule.interval(), Duration::from_secs(30));
        tokio::time::advance(Duration::from_secs(151)).await;
        schedule.maybe_relax();
        assert_eq!(schedule.interval(), Duration::from_secs(60));
    }
}
