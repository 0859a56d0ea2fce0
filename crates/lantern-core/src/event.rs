//! Mesh events
//!
//! Events emitted by the mesh service for consumption by the application
//! layer (console, displays, peer transports).

use crate::node::NodeId;
use bytes::Bytes;

/// Events emitted by the mesh service
#[derive(Debug, Clone)]
pub enum MeshEvent {
    /// Mesh service started
    Started {
        /// Local node id
        node_id: NodeId,
    },

    /// Mesh service stopped
    Stopped,

    /// Application payload arrived for this node
    DataReceived {
        /// Node that originated the payload
        origin: NodeId,
        /// Application payload, first byte is the app type tag
        payload: Bytes,
        /// Received signal strength in dBm
        rssi: i16,
        /// Signal-to-noise ratio in dB
        snr: i8,
    },

    /// The routing table gained, lost or replaced entries
    TopologyChanged,

    /// An inbound frame was dropped because the previous one was still
    /// being processed
    InboundOverrun,

    /// The transmit watchdog force-reset the radio
    TransmitStuckRecovered,
}
