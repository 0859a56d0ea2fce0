//! Lantern Core - Shared types for the Lantern mesh
//!
//! This crate holds the pieces every other lantern crate needs:
//!
//! - **config**: [`MeshConfig`] with all timing and capacity knobs
//! - **event**: [`MeshEvent`] emitted by the mesh service
//! - **node**: [`NodeId`] formatting helpers and [`NodeInfo`] listings
//! - **store**: [`AliasStore`] trait for persisted nicknames
//! - **error**: core error types

pub mod config;
pub mod error;
pub mod event;
pub mod node;
pub mod store;

// Re-exports for convenience
pub use config::MeshConfig;
pub use error::{CoreError, Result};
pub use event::MeshEvent;
pub use node::{format_node_id, parse_node_id, NodeId, NodeInfo};
pub use store::{clamp_alias, AliasStore, MAX_ALIAS_LEN};
