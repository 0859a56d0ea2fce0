//! Codec error types

use thiserror::Error;

/// Framing errors raised while decoding radio frames
///
/// None of these are fatal; a malformed frame is discarded and the radio
/// keeps listening.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Frame does not start with the `LoR` magic
    #[error("Invalid magic: expected {expected:02X?}, got {got:02X?}")]
    BadMagic { expected: [u8; 3], got: [u8; 3] },

    /// Frame is shorter than its declared shape
    #[error("Truncated frame: {len} bytes, need at least {need}")]
    Truncated { len: usize, need: usize },

    /// Unknown frame kind byte
    #[error("Invalid frame kind: 0x{0:02X}")]
    InvalidKind(u8),

    /// Topology snapshot does not end with the sentinel entry
    #[error("Topology snapshot from {from:08X} is missing the end sentinel")]
    MissingSentinel { from: u32 },

    /// Routed payload exceeds the wire maximum
    #[error("Payload too large: {len} bytes (max: {max})")]
    PayloadTooLarge { len: usize, max: usize },

    /// Snapshot carries more entries than a frame can hold
    #[error("Too many snapshot entries: {len} (max: {max})")]
    TooManyEntries { len: usize, max: usize },
}

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;
