//! Mesh error types
//!
//! Nothing here is process-fatal: every failure degrades to "this message
//! or cycle is lost, the mesh keeps running".

use thiserror::Error;

use lantern_proto::CodecError;
use lantern_routing::RoutingError;

/// Errors raised by the mesh service and its components
#[derive(Error, Debug)]
pub enum MeshError {
    // ===== Queueing =====
    /// All outbound queue slots are occupied; the send attempt fails and
    /// is never retried automatically
    #[error("Send queue full")]
    QueueFull,

    // ===== Routing =====
    /// No route could be resolved for a forward or addressed send
    #[error("No route found for {0:08X}")]
    RouteNotFound(u32),

    /// Exclusive routing-state access timed out; the operation is skipped
    /// for this cycle
    #[error("Routing state lock not acquired within {duration_ms}ms")]
    LockTimeout { duration_ms: u64 },

    // ===== Channel access =====
    /// The channel never cleared within the retry bound; the message is
    /// dropped, not requeued
    #[error("Channel busy for {duration_ms}ms, message dropped")]
    ChannelBusyTimeout { duration_ms: u64 },

    /// The watchdog caught a transmit that never completed; the radio was
    /// force-reset to listening
    #[error("Transmit stuck for {duration_ms}ms, radio reset")]
    TransmitStuck { duration_ms: u64 },

    // ===== Framing =====
    /// Malformed frame, discarded
    #[error("Framing error: {0}")]
    Codec(#[from] CodecError),

    // ===== Driver =====
    /// Radio driver failure
    #[error("Radio error: {0}")]
    Radio(String),

    /// Internal channel failure (service shut down)
    #[error("Channel error: {0}")]
    Channel(String),
}

impl From<RoutingError> for MeshError {
    fn from(err: RoutingError) -> Self {
        match err {
            RoutingError::LockTimeout { duration_ms } => MeshError::LockTimeout { duration_ms },
            RoutingError::RouteNotFound(id) => MeshError::RouteNotFound(id),
            RoutingError::DirectoryFull { max } => {
                MeshError::Channel(format!("name directory full ({} entries)", max))
            }
        }
    }
}

/// Result type for mesh operations
pub type Result<T> = std::result::Result<T, MeshError>;
