//! Shared routing state
//!
//! Single owner of the routing table, name directory and broadcast
//! bookkeeping. The mesh worker, the console query path and the outbound
//! send path all reach these tables through [`SharedRouting`], which wraps
//! the state in a mutex acquired with a bounded wait: a caller that cannot
//! get in within the bound skips its operation and reports, it never parks
//! forever.

use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use lantern_core::{format_node_id, MeshConfig, NodeId, NodeInfo};

use crate::broadcast::{BroadcastHistory, BroadcastIdAllocator};
use crate::error::{Result, RoutingError};
use crate::names::NameDirectory;
use crate::table::{Route, RoutingTable};

/// The tables a node keeps about the mesh
pub struct RoutingState {
    table: RoutingTable,
    names: NameDirectory,
    history: BroadcastHistory,
    allocator: BroadcastIdAllocator,
}

impl RoutingState {
    /// Create empty state sized from the configuration
    pub fn new(local_id: NodeId, config: &MeshConfig) -> Self {
        Self {
            table: RoutingTable::new(config.max_nodes),
            names: NameDirectory::new(config.max_nodes),
            history: BroadcastHistory::new(config.broadcast_history),
            allocator: BroadcastIdAllocator::new(local_id),
        }
    }

    /// Record a sighting, lazily labelling new nodes with their hex id.
    ///
    /// Returns true when the routing table changed structurally.
    pub fn add_node(&mut self, id: NodeId, first_hop: NodeId, hops: u8) -> bool {
        let changed = self.table.add_node(id, first_hop, hops);
        if changed && self.names.lookup_by_id(id).is_none() {
            // Directory-full is not a routing failure, the node just stays
            // unlabelled until space frees up
            let _ = self.names.add_or_update(id, &format_node_id(id));
        }
        changed
    }

    /// Routing table access
    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Mutable routing table access
    pub fn table_mut(&mut self) -> &mut RoutingTable {
        &mut self.table
    }

    /// Name directory access
    pub fn names(&self) -> &NameDirectory {
        &self.names
    }

    /// Mutable name directory access
    pub fn names_mut(&mut self) -> &mut NameDirectory {
        &mut self.names
    }

    /// Resolve a route to `id`
    pub fn get_route(&self, id: NodeId) -> Option<Route> {
        self.table.get_route(id)
    }

    /// Mint a broadcast id for a locally originated flood.
    ///
    /// The id is recorded in the history so our own flood is not re-relayed
    /// when a neighbor echoes it back.
    pub fn next_broadcast_id(&mut self) -> u32 {
        let id = self.allocator.next_id();
        self.history.check_and_record(id);
        id
    }

    /// Duplicate check for an inbound broadcast id, recording new ids
    pub fn is_old_broadcast(&mut self, id: u32) -> bool {
        self.history.check_and_record(id)
    }

    /// Resolve an `@` address hint to a node id: alias first, then as a
    /// hex node id.
    pub fn resolve_hint(&self, hint: &str) -> Option<NodeId> {
        if let Some(id) = self.names.lookup_by_alias(hint) {
            return Some(id);
        }
        u32::from_str_radix(hint, 16).ok().filter(|id| *id != 0)
    }

    /// Routing entries joined with their aliases, for listings
    pub fn node_infos(&self) -> Vec<NodeInfo> {
        self.table
            .entries()
            .iter()
            .map(|entry| NodeInfo {
                node_id: entry.node_id,
                first_hop: entry.first_hop,
                hops: entry.hops,
                alias: self.names.lookup_by_id(entry.node_id).map(str::to_string),
                age_ms: entry.last_seen.elapsed().as_millis() as u64,
            })
            .collect()
    }
}

/// Bounded-wait shared handle to [`RoutingState`]
#[derive(Clone)]
pub struct SharedRouting {
    inner: Arc<Mutex<RoutingState>>,
    lock_wait: Duration,
}

impl SharedRouting {
    /// Wrap state with the configured acquisition bound
    pub fn new(state: RoutingState, lock_wait: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
            lock_wait,
        }
    }

    /// Acquire exclusive access, waiting at most the configured bound
    pub fn lock(&self) -> Result<MutexGuard<'_, RoutingState>> {
        match self.inner.try_lock_for(self.lock_wait) {
            Some(guard) => {
                trace!("Routing state acquired");
                Ok(guard)
            }
            None => Err(RoutingError::LockTimeout {
                duration_ms: self.lock_wait.as_millis() as u64,
            }),
        }
    }
}
