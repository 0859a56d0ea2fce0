//! Core error types

use thiserror::Error;

/// Errors shared across the lantern crates
#[derive(Error, Debug)]
pub enum CoreError {
    /// Node id text that is not up to eight hex digits
    #[error("Invalid node id: {0}")]
    InvalidNodeId(String),

    /// Node id 0 is reserved for the direct-neighbor marker
    #[error("Node id 0 is reserved")]
    ReservedNodeId,
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
