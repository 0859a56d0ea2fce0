//! Lantern Routing - Distributed routing state for the Lantern mesh
//!
//! This crate owns the three tables a mesh node keeps about the world:
//!
//! - **table**: [`RoutingTable`] mapping node ids to next hops with
//!   freshness-based eviction
//! - **names**: [`NameDirectory`] of human-readable aliases
//! - **broadcast**: [`BroadcastHistory`] ring for duplicate suppression and
//!   the [`BroadcastIdAllocator`]
//! - **state**: [`RoutingState`]/[`SharedRouting`], the single guarded owner
//!   of all three
//!
//! All mutation flows through [`RoutingState`]; callers acquire it through
//! [`SharedRouting`] with a bounded wait so nothing in the system can block
//! on routing access indefinitely.

pub mod broadcast;
pub mod error;
pub mod names;
pub mod state;
pub mod table;

pub use broadcast::{broadcast_prefix, BroadcastHistory, BroadcastIdAllocator};
pub use error::{Result, RoutingError};
pub use names::NameDirectory;
pub use state::{RoutingState, SharedRouting};
pub use table::{Route, RouteEntry, RoutingTable};
