//! Lantern Proto - Wire format for the Lantern mesh
//!
//! The radio carries three frame shapes sharing a 3-byte magic prefix:
//! routed data frames (direct, forward, broadcast) and topology snapshots.
//! Frames are fixed-layout little-endian structures sized for a 256-byte
//! class LoRa payload; encoding and decoding are pure and allocate at most
//! one maximum-size buffer.

pub mod error;
pub mod wire;

pub use error::{CodecError, Result};
pub use wire::{
    AppType, MessageKind, SnapshotEntry, WireMessage, MAGIC, MAX_FRAME_LEN, MAX_PAYLOAD,
    MAX_SNAPSHOT_ENTRIES, ROUTED_HEADER_LEN, SENTINEL, SNAPSHOT_HEADER_LEN,
};
