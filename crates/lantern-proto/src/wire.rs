//! Wire frame layout and codec
//!
//! Every frame starts with a common 12-byte header:
//!
//! ```text
//! +-------+----------+----------+------+
//! | "LoR" | from u32 | dest u32 | kind |
//! |  3 B  |   LE     |   LE     | 1 B  |
//! +-------+----------+----------+------+
//! ```
//!
//! Routed frames (direct, forward, broadcast) append the originator id and
//! an application payload whose first byte is the app type tag. Topology
//! snapshots append 5-byte `(node_id, hops)` entries terminated by a fixed
//! sentinel entry; a snapshot without the sentinel is discarded.

use bytes::{BufMut, Bytes, BytesMut};
use lantern_core::NodeId;

use crate::error::{CodecError, Result};

/// Frame magic prefix
pub const MAGIC: [u8; 3] = *b"LoR";

/// Sentinel entry closing a topology snapshot
pub const SENTINEL: [u8; 5] = [0xAA, 0x55, 0x00, 0xFF, 0xAA];

/// Common header: magic + from + dest + kind
pub const SNAPSHOT_HEADER_LEN: usize = 12;

/// Routed header: common header + origin
pub const ROUTED_HEADER_LEN: usize = 16;

/// Maximum routed payload, app type tag included
pub const MAX_PAYLOAD: usize = 242;

/// Maximum snapshot entries, sentinel excluded
pub const MAX_SNAPSHOT_ENTRIES: usize = 48;

/// Size of the largest encodable frame
pub const MAX_FRAME_LEN: usize = ROUTED_HEADER_LEN + MAX_PAYLOAD;

/// Wire-level frame kind byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    /// Free queue slot marker, never valid on the wire
    Invalid = 0,
    /// Payload for a direct neighbor
    Direct = 1,
    /// Payload for a relay hop to pass on
    Forward = 2,
    /// Flooded payload, dest carries the broadcast id
    Broadcast = 3,
    /// Topology snapshot flood
    TopologySnapshot = 4,
}

impl MessageKind {
    /// Parse a kind byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(MessageKind::Invalid),
            1 => Some(MessageKind::Direct),
            2 => Some(MessageKind::Forward),
            3 => Some(MessageKind::Broadcast),
            4 => Some(MessageKind::TopologySnapshot),
            _ => None,
        }
    }
}

/// Application-level payload type tag (first payload byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AppType {
    /// Chat text, optionally `@`-addressed
    Chat = 0x31,
    /// Position report
    Location = 0x32,
    /// Nickname announcement
    Name = 0x33,
}

impl AppType {
    /// Parse an app type tag
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x31 => Some(AppType::Chat),
            0x32 => Some(AppType::Location),
            0x33 => Some(AppType::Name),
            _ => None,
        }
    }

    /// Kinds that are always flooded rather than routed
    pub fn is_always_broadcast(&self) -> bool {
        matches!(self, AppType::Location | AppType::Name)
    }
}

/// One `(node_id, hops)` entry of a topology snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// Advertised node id
    pub node_id: NodeId,
    /// Hop count from the advertising node
    pub hops: u8,
}

/// A decoded radio frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// A routed data frame (direct, forward or broadcast)
    Routed {
        /// Direct, Forward or Broadcast
        kind: MessageKind,
        /// Sending (previous-hop) node
        from: NodeId,
        /// Next-hop node, or the broadcast id for broadcasts
        dest: NodeId,
        /// Node that originated the payload
        origin: NodeId,
        /// Application payload, first byte is the app type tag
        payload: Bytes,
    },
    /// A flooded topology snapshot
    TopologySnapshot {
        /// Advertising node
        from: NodeId,
        /// Known routes of the advertising node, sentinel excluded
        entries: Vec<SnapshotEntry>,
    },
}

impl WireMessage {
    /// Sending node of the frame
    pub fn from(&self) -> NodeId {
        match self {
            WireMessage::Routed { from, .. } => *from,
            WireMessage::TopologySnapshot { from, .. } => *from,
        }
    }

    /// Wire kind byte of the frame
    pub fn kind(&self) -> MessageKind {
        match self {
            WireMessage::Routed { kind, .. } => *kind,
            WireMessage::TopologySnapshot { .. } => MessageKind::TopologySnapshot,
        }
    }

    /// Encode the frame into a fresh buffer
    pub fn encode(&self) -> Result<Bytes> {
        match self {
            WireMessage::Routed {
                kind,
                from,
                dest,
                origin,
                payload,
            } => {
                if payload.len() > MAX_PAYLOAD {
                    return Err(CodecError::PayloadTooLarge {
                        len: payload.len(),
                        max: MAX_PAYLOAD,
                    });
                }
                if !matches!(
                    kind,
                    MessageKind::Direct | MessageKind::Forward | MessageKind::Broadcast
                ) {
                    return Err(CodecError::InvalidKind(*kind as u8));
                }
                let mut buf = BytesMut::with_capacity(ROUTED_HEADER_LEN + payload.len());
                buf.put_slice(&MAGIC);
                buf.put_u32_le(*from);
                buf.put_u32_le(*dest);
                buf.put_u8(*kind as u8);
                buf.put_u32_le(*origin);
                buf.put_slice(payload);
                Ok(buf.freeze())
            }
            WireMessage::TopologySnapshot { from, entries } => {
                if entries.len() > MAX_SNAPSHOT_ENTRIES {
                    return Err(CodecError::TooManyEntries {
                        len: entries.len(),
                        max: MAX_SNAPSHOT_ENTRIES,
                    });
                }
                let mut buf =
                    BytesMut::with_capacity(SNAPSHOT_HEADER_LEN + (entries.len() + 1) * 5);
                buf.put_slice(&MAGIC);
                buf.put_u32_le(*from);
                buf.put_u32_le(0); // snapshots are neighbor floods, dest unused
                buf.put_u8(MessageKind::TopologySnapshot as u8);
                for entry in entries {
                    buf.put_u32_le(entry.node_id);
                    buf.put_u8(entry.hops);
                }
                buf.put_slice(&SENTINEL);
                Ok(buf.freeze())
            }
        }
    }

    /// Decode a frame from received radio bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < SNAPSHOT_HEADER_LEN {
            return Err(CodecError::Truncated {
                len: data.len(),
                need: SNAPSHOT_HEADER_LEN,
            });
        }
        if data[..3] != MAGIC {
            return Err(CodecError::BadMagic {
                expected: MAGIC,
                got: [data[0], data[1], data[2]],
            });
        }
        let from = u32::from_le_bytes([data[3], data[4], data[5], data[6]]);
        let dest = u32::from_le_bytes([data[7], data[8], data[9], data[10]]);
        let kind = MessageKind::from_u8(data[11]).ok_or(CodecError::InvalidKind(data[11]))?;

        match kind {
            MessageKind::Direct | MessageKind::Forward | MessageKind::Broadcast => {
                if data.len() < ROUTED_HEADER_LEN {
                    return Err(CodecError::Truncated {
                        len: data.len(),
                        need: ROUTED_HEADER_LEN,
                    });
                }
                let origin = u32::from_le_bytes([data[12], data[13], data[14], data[15]]);
                let payload = &data[ROUTED_HEADER_LEN..];
                if payload.len() > MAX_PAYLOAD {
                    return Err(CodecError::PayloadTooLarge {
                        len: payload.len(),
                        max: MAX_PAYLOAD,
                    });
                }
                Ok(WireMessage::Routed {
                    kind,
                    from,
                    dest,
                    origin,
                    payload: Bytes::copy_from_slice(payload),
                })
            }
            MessageKind::TopologySnapshot => {
                let body = &data[SNAPSHOT_HEADER_LEN..];
                if body.len() < SENTINEL.len() || body.len() % 5 != 0 {
                    return Err(CodecError::Truncated {
                        len: data.len(),
                        need: SNAPSHOT_HEADER_LEN + SENTINEL.len(),
                    });
                }
                if body[body.len() - SENTINEL.len()..] != SENTINEL {
                    return Err(CodecError::MissingSentinel { from });
                }
                let entries = body[..body.len() - SENTINEL.len()]
                    .chunks_exact(5)
                    .map(|chunk| SnapshotEntry {
                        node_id: u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
                        hops: chunk[4],
                    })
                    .collect();
                Ok(WireMessage::TopologySnapshot { from, entries })
            }
            MessageKind::Invalid => Err(CodecError::InvalidKind(kind as u8)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat_payload(text: &str) -> Bytes {
        let mut buf = BytesMut::with_capacity(text.len() + 1);
        buf.put_u8(AppType::Chat as u8);
        buf.put_slice(text.as_bytes());
        buf.freeze()
    }

    #[test]
    fn test_routed_round_trip() {
        let msg = WireMessage::Routed {
            kind: MessageKind::Direct,
            from: 0x1E2F8C8F,
            dest: 0x2DDF3A8F,
            origin: 0xBF6CED4E,
            payload: chat_payload("hello mesh"),
        };
        let encoded = msg.encode().unwrap();
        assert_eq!(&encoded[..3], b"LoR");
        assert_eq!(WireMessage::decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn test_routed_round_trip_max_payload() {
        let payload = Bytes::from(vec![0x31; MAX_PAYLOAD]);
        let msg = WireMessage::Routed {
            kind: MessageKind::Broadcast,
            from: 1,
            dest: 0x100,
            origin: 1,
            payload,
        };
        let encoded = msg.encode().unwrap();
        assert_eq!(encoded.len(), MAX_FRAME_LEN);
        assert_eq!(WireMessage::decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn test_payload_over_limit_rejected() {
        let msg = WireMessage::Routed {
            kind: MessageKind::Direct,
            from: 1,
            dest: 2,
            origin: 1,
            payload: Bytes::from(vec![0; MAX_PAYLOAD + 1]),
        };
        assert!(matches!(
            msg.encode(),
            Err(CodecError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let msg = WireMessage::TopologySnapshot {
            from: 0x2DDF3A8F,
            entries: vec![
                SnapshotEntry {
                    node_id: 0xBF6CED4E,
                    hops: 0,
                },
                SnapshotEntry {
                    node_id: 0xBF6C660E,
                    hops: 2,
                },
            ],
        };
        let encoded = msg.encode().unwrap();
        assert_eq!(encoded.len(), SNAPSHOT_HEADER_LEN + 3 * 5);
        assert_eq!(WireMessage::decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn test_empty_snapshot_still_carries_sentinel() {
        let msg = WireMessage::TopologySnapshot {
            from: 7,
            entries: Vec::new(),
        };
        let encoded = msg.encode().unwrap();
        assert_eq!(&encoded[SNAPSHOT_HEADER_LEN..], &SENTINEL);
        assert_eq!(WireMessage::decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn test_snapshot_missing_sentinel_rejected() {
        let msg = WireMessage::TopologySnapshot {
            from: 0x1234,
            entries: vec![SnapshotEntry {
                node_id: 0x5678,
                hops: 1,
            }],
        };
        let mut encoded = msg.encode().unwrap().to_vec();
        // Corrupt the sentinel in place
        let len = encoded.len();
        encoded[len - 1] = 0x00;
        assert_eq!(
            WireMessage::decode(&encoded),
            Err(CodecError::MissingSentinel { from: 0x1234 })
        );
    }

    #[test]
    fn test_bad_magic_rejected() {
        let msg = WireMessage::Routed {
            kind: MessageKind::Direct,
            from: 1,
            dest: 2,
            origin: 1,
            payload: chat_payload("x"),
        };
        let mut encoded = msg.encode().unwrap().to_vec();
        encoded[0] = b'X';
        assert!(matches!(
            WireMessage::decode(&encoded),
            Err(CodecError::BadMagic { .. })
        ));
    }

    #[test]
    fn test_truncated_frame_rejected() {
        assert!(matches!(
            WireMessage::decode(b"LoR\x01\x00"),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_invalid_kind_rejected() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&MAGIC);
        frame.extend_from_slice(&1u32.to_le_bytes());
        frame.extend_from_slice(&2u32.to_le_bytes());
        frame.push(9);
        assert_eq!(
            WireMessage::decode(&frame),
            Err(CodecError::InvalidKind(9))
        );
    }

    #[test]
    fn test_app_type_tags() {
        assert_eq!(AppType::from_u8(0x31), Some(AppType::Chat));
        assert_eq!(AppType::from_u8(0x40), None);
        assert!(AppType::Name.is_always_broadcast());
        assert!(AppType::Location.is_always_broadcast());
        assert!(!AppType::Chat.is_always_broadcast());
    }
}
