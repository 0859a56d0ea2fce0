//! Broadcast identifiers
//!
//! Broadcast ids combine a fixed per-node prefix (the high 24 bits of the
//! node id) with a monotonically increasing low byte that wraps. A small
//! ring of recently seen ids keeps a flood from circulating forever: every
//! relay records each id once and drops repeats.

use lantern_core::NodeId;

/// The fixed per-node portion of a broadcast id
pub fn broadcast_prefix(node_id: NodeId) -> u32 {
    node_id & 0xFFFF_FF00
}

/// Mints broadcast ids for locally originated floods
#[derive(Debug)]
pub struct BroadcastIdAllocator {
    current: u32,
}

impl BroadcastIdAllocator {
    /// Create an allocator seeded from the local node id
    pub fn new(node_id: NodeId) -> Self {
        Self {
            current: broadcast_prefix(node_id),
        }
    }

    /// Mint the next broadcast id, wrapping the low byte
    pub fn next_id(&mut self) -> u32 {
        let counter = (self.current.wrapping_add(1)) & 0x0000_00FF;
        self.current = (self.current & 0xFFFF_FF00) | counter;
        self.current
    }
}

/// Fixed-capacity ring of recently seen broadcast ids
pub struct BroadcastHistory {
    ids: Vec<u32>,
    next: usize,
}

impl BroadcastHistory {
    /// Create a ring remembering the last `capacity` ids
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: vec![0; capacity.max(1)],
            next: 0,
        }
    }

    /// Check whether `id` was seen recently, recording it if not.
    ///
    /// Returns true for a repeat (the flood must stop here), false for a
    /// new id (now remembered, overwriting the oldest slot).
    pub fn check_and_record(&mut self, id: u32) -> bool {
        if self.ids.contains(&id) {
            return true;
        }
        self.ids[self.next] = id;
        self.next = (self.next + 1) % self.ids.len();
        false
    }
}
