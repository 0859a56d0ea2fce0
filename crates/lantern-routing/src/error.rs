//! Routing error types

use thiserror::Error;

/// Errors raised by routing-state operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// Exclusive access to the routing state could not be acquired in time.
    /// The operation is skipped for this cycle, never retried in place.
    #[error("Routing state lock not acquired within {duration_ms}ms")]
    LockTimeout { duration_ms: u64 },

    /// No route entry exists for the node
    #[error("No route found for {0:08X}")]
    RouteNotFound(u32),

    /// Name directory is full and rejects new inserts
    #[error("Name directory full: {max} entries")]
    DirectoryFull { max: usize },
}

/// Result type for routing operations
pub type Result<T> = std::result::Result<T, RoutingError>;
