//! Routing table
//!
//! Authoritative map of known nodes keyed by node id. Each entry records the
//! first hop towards the node (0 for direct neighbors), the hop count, and
//! when the node was last corroborated. Capacity is fixed; when the table is
//! full the entry that has gone longest without a refresh is evicted to make
//! room. Conflict resolution on sightings:
//!
//! 1. a direct entry is never downgraded by a multi-hop sighting
//! 2. a direct sighting replaces any routed entry
//! 3. among routed sightings the lower hop count wins, ties keep the
//!    existing route

use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use lantern_core::NodeId;
use lantern_proto::SnapshotEntry;

/// A live routing table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    /// The node this entry routes to
    pub node_id: NodeId,
    /// Next hop towards the node, 0 when direct
    pub first_hop: NodeId,
    /// Hop count to the node
    pub hops: u8,
    /// Last corroborating sighting
    pub last_seen: Instant,
}

impl RouteEntry {
    /// Whether the node is a direct radio neighbor
    pub fn is_direct(&self) -> bool {
        self.first_hop == 0
    }
}

/// A resolved route, as handed to the forwarding engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// Destination node
    pub node_id: NodeId,
    /// Next hop towards it, 0 when direct
    pub first_hop: NodeId,
}

impl Route {
    /// Whether the destination is reachable without a relay
    pub fn is_direct(&self) -> bool {
        self.first_hop == 0
    }
}

/// Capacity-bounded routing table with freshness-based eviction
pub struct RoutingTable {
    /// Entries in refresh order, least recently refreshed last
    entries: LruCache<NodeId, RouteEntry>,
}

impl RoutingTable {
    /// Create a table holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            entries: LruCache::new(cap),
        }
    }

    /// Record a sighting of `id` reachable via `first_hop` in `hops` hops.
    ///
    /// Returns true when the table changed structurally (insert, replace or
    /// capacity eviction), false when the sighting was absorbed.
    pub fn add_node(&mut self, id: NodeId, first_hop: NodeId, hops: u8) -> bool {
        if let Some(existing) = self.entries.peek(&id).copied() {
            if existing.is_direct() {
                if first_hop == 0 {
                    // Refresh the direct entry, promoting it to freshest
                    if let Some(entry) = self.entries.get_mut(&id) {
                        entry.last_seen = Instant::now();
                    }
                }
                trace!(node = %format_args!("{:08X}", id), "Already known as direct");
                return false;
            }
            if first_hop != 0 && existing.hops <= hops {
                trace!(
                    node = %format_args!("{:08X}", id),
                    existing = existing.hops,
                    offered = hops,
                    "Existing route is as good or better"
                );
                return false;
            }
            // Direct sighting of a routed node, or a strictly better route
            self.entries.pop(&id);
        }

        let entry = RouteEntry {
            node_id: id,
            first_hop,
            hops,
            last_seen: Instant::now(),
        };
        if let Some((evicted, _)) = self.entries.push(id, entry) {
            if evicted != id {
                debug!(
                    evicted = %format_args!("{:08X}", evicted),
                    "Table full, dropped oldest entry"
                );
            }
        }
        debug!(
            node = %format_args!("{:08X}", id),
            first_hop = %format_args!("{:08X}", first_hop),
            hops,
            "Route added"
        );
        true
    }

    /// Remove the entry for `id`, if any
    pub fn delete_route(&mut self, id: NodeId) -> bool {
        self.entries.pop(&id).is_some()
    }

    /// Remove every entry routed through `via`.
    ///
    /// Called when `via` itself disappears: its descendants are unreachable
    /// until a fresh snapshot re-confirms them.
    pub fn clear_subs(&mut self, via: NodeId) -> usize {
        let stale: Vec<NodeId> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.first_hop == via)
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            self.entries.pop(id);
            debug!(
                node = %format_args!("{:08X}", id),
                via = %format_args!("{:08X}", via),
                "Removed unreachable descendant"
            );
        }
        stale.len()
    }

    /// Evict entries not refreshed within `timeout`, cascading to the
    /// descendants of evicted direct neighbors.
    ///
    /// Returns true when nothing was evicted.
    pub fn clean_map(&mut self, timeout: Duration) -> bool {
        let expired: Vec<(NodeId, NodeId)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.last_seen.elapsed() > timeout)
            .map(|(id, entry)| (*id, entry.first_hop))
            .collect();

        let mut up_to_date = true;
        for (id, first_hop) in expired {
            // A cascade from an earlier eviction may have removed it already
            if first_hop == 0 {
                self.clear_subs(id);
            }
            if self.entries.pop(&id).is_some() {
                warn!(
                    node = %format_args!("{:08X}", id),
                    first_hop = %format_args!("{:08X}", first_hop),
                    "Node timed out"
                );
                up_to_date = false;
            }
        }
        up_to_date
    }

    /// Resolve a route to `id` without touching its freshness
    pub fn get_route(&self, id: NodeId) -> Option<Route> {
        self.entries.peek(&id).map(|entry| Route {
            node_id: entry.node_id,
            first_hop: entry.first_hop,
        })
    }

    /// Build the entry list for an outbound topology snapshot
    pub fn snapshot(&self) -> Vec<SnapshotEntry> {
        self.entries
            .iter()
            .map(|(id, entry)| SnapshotEntry {
                node_id: *id,
                hops: entry.hops,
            })
            .collect()
    }

    /// All live entries, freshest first
    pub fn entries(&self) -> Vec<RouteEntry> {
        self.entries.iter().map(|(_, entry)| *entry).collect()
    }

    /// Number of known nodes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Backdate an entry's last sighting, test hook for timeout paths
    #[cfg(test)]
    pub(crate) fn backdate(&mut self, id: NodeId, by: Duration) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.last_seen = Instant::now() - by;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_duplicate_node_ids() {
        let mut table = RoutingTable::new(8);
        table.add_node(0x10, 0, 0);
        table.add_node(0x10, 0x20, 3);
        table.add_node(0x10, 0, 0);
        let count = table
            .entries()
            .iter()
            .filter(|entry| entry.node_id == 0x10)
            .count();
        assert_eq!(count, 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_direct_always_wins() {
        let mut table = RoutingTable::new(8);
        assert!(table.add_node(0x10, 0, 0));
        // A multi-hop claim must not displace the direct entry
        assert!(!table.add_node(0x10, 0x20, 2));
        let route = table.get_route(0x10).unwrap();
        assert!(route.is_direct());
    }

    #[test]
    fn test_direct_sighting_replaces_routed_entry() {
        let mut table = RoutingTable::new(8);
        assert!(table.add_node(0x10, 0x20, 2));
        assert!(table.add_node(0x10, 0, 0));
        assert!(table.get_route(0x10).unwrap().is_direct());
    }

    #[test]
    fn test_lower_hop_count_replaces() {
        let mut table = RoutingTable::new(8);
        assert!(table.add_node(0x10, 0xA0, 3));
        assert!(table.add_node(0x10, 0xB0, 1));
        assert_eq!(table.get_route(0x10).unwrap().first_hop, 0xB0);
    }

    #[test]
    fn test_higher_or_equal_hop_count_ignored() {
        let mut table = RoutingTable::new(8);
        assert!(table.add_node(0x10, 0xB0, 1));
        assert!(!table.add_node(0x10, 0xA0, 3));
        assert!(!table.add_node(0x10, 0xA0, 1));
        assert_eq!(table.get_route(0x10).unwrap().first_hop, 0xB0);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut table = RoutingTable::new(3);
        table.add_node(0x01, 0, 0);
        table.add_node(0x02, 0, 0);
        table.add_node(0x03, 0, 0);
        // Refresh 0x01 so 0x02 is now the stalest
        table.add_node(0x01, 0, 0);
        table.add_node(0x04, 0, 0);
        assert_eq!(table.len(), 3);
        assert!(table.get_route(0x02).is_none());
        assert!(table.get_route(0x01).is_some());
    }

    #[test]
    fn test_delete_route_single_entry() {
        let mut table = RoutingTable::new(8);
        table.add_node(0x10, 0, 0);
        table.add_node(0x11, 0x10, 1);

        assert!(table.delete_route(0x10));
        assert!(table.get_route(0x10).is_none());
        // Deletion does not cascade; the descendant keeps its entry
        assert!(table.get_route(0x11).is_some());
        assert!(!table.delete_route(0x10));
    }

    #[test]
    fn test_clear_subs_scope() {
        let mut table = RoutingTable::new(8);
        table.add_node(0x10, 0, 0);
        table.add_node(0x11, 0x10, 1);
        table.add_node(0x12, 0x10, 2);
        table.add_node(0x20, 0, 0);
        table.add_node(0x21, 0x20, 1);

        assert_eq!(table.clear_subs(0x10), 2);
        assert!(table.get_route(0x11).is_none());
        assert!(table.get_route(0x12).is_none());
        // Unrelated entries survive
        assert!(table.get_route(0x10).is_some());
        assert!(table.get_route(0x20).is_some());
        assert!(table.get_route(0x21).is_some());
    }

    #[test]
    fn test_clean_map_evicts_expired_and_cascades() {
        let timeout = Duration::from_millis(100);
        let mut table = RoutingTable::new(8);
        table.add_node(0x10, 0, 0);
        table.add_node(0x11, 0x10, 1);
        table.add_node(0x20, 0, 0);

        // Only the direct neighbor 0x10 has gone stale
        table.backdate(0x10, Duration::from_millis(500));

        assert!(!table.clean_map(timeout));
        assert!(table.get_route(0x10).is_none());
        // Its descendant goes with it even though it was fresh
        assert!(table.get_route(0x11).is_none());
        assert!(table.get_route(0x20).is_some());
    }

    #[test]
    fn test_clean_map_fresh_table_reports_up_to_date() {
        let mut table = RoutingTable::new(8);
        table.add_node(0x10, 0, 0);
        assert!(table.clean_map(Duration::from_secs(120)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_snapshot_lists_all_entries() {
        let mut table = RoutingTable::new(8);
        table.add_node(0x10, 0, 0);
        table.add_node(0x11, 0x10, 2);
        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().any(|e| e.node_id == 0x10 && e.hops == 0));
        assert!(snapshot.iter().any(|e| e.node_id == 0x11 && e.hops == 2));
    }
}
