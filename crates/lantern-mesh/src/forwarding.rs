//! Forwarding engine
//!
//! Per-frame decision logic. Inbound frames mutate the routing state,
//! get re-emitted through the send queue, reach the application as events,
//! or any combination of the three. Outbound application requests resolve
//! their destination here before entering the queue.
//!
//! All routing-state mutation in the system flows through this module;
//! the transports and console only ever see events and the send API.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use lantern_core::{format_node_id, MeshEvent, NodeId};
use lantern_proto::{AppType, MessageKind, WireMessage, MAX_PAYLOAD};
use lantern_routing::{broadcast_prefix, SharedRouting};

use crate::error::{MeshError, Result};
use crate::radio::SignalQuality;
use crate::scheduler::SendQueue;

/// Counters surfaced by the forwarding engine
#[derive(Debug, Clone, Default)]
pub struct ForwardingStats {
    /// Payloads delivered to the application
    pub delivered: u64,
    /// Broadcasts re-flooded to neighbors
    pub refloods: u64,
    /// Messages relayed on behalf of other nodes
    pub forwards: u64,
    /// Duplicate broadcasts absorbed
    pub duplicate_broadcasts: u64,
    /// Own broadcasts heard back and absorbed
    pub self_echoes: u64,
    /// Forwards dropped for want of a route
    pub no_route_drops: u64,
}

/// Decision logic between the codec, the routing state and the send queue
pub struct ForwardingEngine {
    local_id: NodeId,
    routing: SharedRouting,
    queue: SendQueue,
    events: broadcast::Sender<MeshEvent>,
    stats: ForwardingStats,
}

impl ForwardingEngine {
    /// Create an engine bound to the node's routing state and send queue
    pub fn new(
        local_id: NodeId,
        routing: SharedRouting,
        queue: SendQueue,
        events: broadcast::Sender<MeshEvent>,
    ) -> Self {
        Self {
            local_id,
            routing,
            queue,
            events,
            stats: ForwardingStats::default(),
        }
    }

    /// Counter snapshot
    pub fn stats(&self) -> ForwardingStats {
        self.stats.clone()
    }

    /// Dispatch one decoded inbound frame
    pub fn handle_frame(&mut self, message: WireMessage, quality: SignalQuality) -> Result<()> {
        match message {
            WireMessage::TopologySnapshot { from, entries } => {
                self.handle_snapshot(from, &entries)
            }
            WireMessage::Routed {
                kind: MessageKind::Direct,
                dest,
                origin,
                payload,
                ..
            } => {
                if dest != self.local_id {
                    // Routing discipline says this should not happen
                    debug!(
                        dest = %format_node_id(dest),
                        "Direct frame for somebody else, ignoring"
                    );
                    return Ok(());
                }
                self.deliver(origin, payload, quality)
            }
            WireMessage::Routed {
                kind: MessageKind::Forward,
                from,
                dest,
                origin,
                payload,
            } => {
                if dest != self.local_id {
                    return Ok(());
                }
                self.relay(from, origin, payload)
            }
            WireMessage::Routed {
                kind: MessageKind::Broadcast,
                from,
                dest,
                origin,
                payload,
            } => self.handle_broadcast(from, dest, origin, payload, quality),
            WireMessage::Routed { kind, .. } => {
                // Invalid/TopologySnapshot kinds cannot reach here from the codec
                warn!(kind = ?kind, "Unexpected routed kind");
                Ok(())
            }
        }
    }

    /// Merge a neighbor's topology snapshot into the routing table
    fn handle_snapshot(&mut self, from: NodeId, entries: &[lantern_proto::SnapshotEntry]) -> Result<()> {
        let mut state = self.routing.lock()?;

        // The sender reached us in one hop, so it is a direct neighbor;
        // everything previously learned through it is stale until this
        // snapshot re-confirms it
        let mut changed = state.add_node(from, 0, 0);
        state.table_mut().clear_subs(from);

        for entry in entries {
            if entry.node_id == self.local_id {
                continue;
            }
            changed |= state.add_node(entry.node_id, from, entry.hops.saturating_add(1));
        }
        drop(state);

        trace!(
            from = %format_node_id(from),
            entries = entries.len(),
            changed,
            "Snapshot merged"
        );
        if changed {
            let _ = self.events.send(MeshEvent::TopologyChanged);
        }
        Ok(())
    }

    /// Relay a frame for which this node is the designated hop
    fn relay(&mut self, recipient: NodeId, origin: NodeId, payload: Bytes) -> Result<()> {
        let route = {
            let state = self.routing.lock()?;
            state.get_route(recipient)
        };
        let route = match route {
            Some(route) => route,
            None => {
                self.stats.no_route_drops += 1;
                warn!(
                    recipient = %format_node_id(recipient),
                    "No route for relay, message dropped"
                );
                return Err(MeshError::RouteNotFound(recipient));
            }
        };

        let rewritten = if route.is_direct() {
            info!(
                recipient = %format_node_id(recipient),
                "Relaying final leg direct"
            );
            WireMessage::Routed {
                kind: MessageKind::Direct,
                from: self.local_id,
                dest: recipient,
                origin,
                payload,
            }
        } else {
            info!(
                recipient = %format_node_id(recipient),
                via = %format_node_id(route.first_hop),
                "Relaying onward"
            );
            WireMessage::Routed {
                kind: MessageKind::Forward,
                from: recipient,
                dest: route.first_hop,
                origin,
                payload,
            }
        };

        self.queue.enqueue(&rewritten)?;
        self.stats.forwards += 1;
        Ok(())
    }

    /// Flood handling: suppress echoes and repeats, re-flood and deliver
    /// new broadcasts exactly once
    fn handle_broadcast(
        &mut self,
        from: NodeId,
        broadcast_id: u32,
        origin: NodeId,
        payload: Bytes,
        quality: SignalQuality,
    ) -> Result<()> {
        if broadcast_prefix(broadcast_id) == broadcast_prefix(self.local_id) {
            // Heard our own flood come back around
            self.stats.self_echoes += 1;
            debug!("Own broadcast echoed back, dismissing");
            return Ok(());
        }

        {
            let mut state = self.routing.lock()?;
            if state.is_old_broadcast(broadcast_id) {
                self.stats.duplicate_broadcasts += 1;
                debug!(id = broadcast_id, "Old broadcast, dismissing");
                return Ok(());
            }
        }

        // Pass the flood on unchanged; a full queue costs us the re-flood
        // but never the local delivery
        let reflood = WireMessage::Routed {
            kind: MessageKind::Broadcast,
            from,
            dest: broadcast_id,
            origin,
            payload: payload.clone(),
        };
        match self.queue.enqueue(&reflood) {
            Ok(()) => self.stats.refloods += 1,
            Err(err) => warn!(error = %err, "Cannot re-flood broadcast"),
        }

        self.deliver(origin, payload, quality)
    }

    /// Hand a payload to the application, learning announced names on the way
    fn deliver(&mut self, origin: NodeId, payload: Bytes, quality: SignalQuality) -> Result<()> {
        if payload.first().copied().and_then(AppType::from_u8) == Some(AppType::Name) {
            if let Ok(alias) = std::str::from_utf8(&payload[1..]) {
                // Name learning is best-effort; delivery must not hinge
                // on the routing lock
                match self.routing.lock() {
                    Ok(mut state) => {
                        if let Err(err) = state.names_mut().add_or_update(origin, alias) {
                            warn!(error = %err, "Announced name not stored");
                        } else {
                            info!(
                                node = %format_node_id(origin),
                                alias,
                                "Learned node name"
                            );
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "Routing state busy, name not recorded");
                    }
                }
            }
        }

        self.stats.delivered += 1;
        let _ = self.events.send(MeshEvent::DataReceived {
            origin,
            payload,
            rssi: quality.rssi,
            snr: quality.snr,
        });
        Ok(())
    }

    /// Build and queue an outbound message.
    ///
    /// Location and name announcements always flood. Chat payloads starting
    /// with `@<alias-or-hex-id> ` are routed when the hint resolves and a
    /// route is known, and fall back to flooding otherwise.
    pub fn send_message(&mut self, app_type: AppType, body: &[u8]) -> Result<()> {
        if body.len() + 1 > MAX_PAYLOAD {
            return Err(MeshError::Codec(
                lantern_proto::CodecError::PayloadTooLarge {
                    len: body.len() + 1,
                    max: MAX_PAYLOAD,
                },
            ));
        }
        let mut payload = BytesMut::with_capacity(body.len() + 1);
        payload.put_u8(app_type as u8);
        payload.put_slice(body);
        let payload = payload.freeze();

        if app_type.is_always_broadcast() {
            return self.send_broadcast(payload);
        }

        let target = match Self::address_hint(body) {
            Some(hint) => match self.routing.lock() {
                Ok(state) => state.resolve_hint(hint).and_then(|id| {
                    state.get_route(id).map(|route| (id, route.first_hop))
                }),
                Err(err) => {
                    // Busy routing state: degrade to a flood rather than
                    // losing the message
                    warn!(error = %err, "Routing state busy, sending as broadcast");
                    None
                }
            },
            None => None,
        };

        match target {
            Some((recipient, 0)) => {
                debug!(dest = %format_node_id(recipient), "Queueing direct");
                self.queue.enqueue(&WireMessage::Routed {
                    kind: MessageKind::Direct,
                    from: self.local_id,
                    dest: recipient,
                    origin: self.local_id,
                    payload,
                })
            }
            Some((recipient, first_hop)) => {
                debug!(
                    dest = %format_node_id(recipient),
                    via = %format_node_id(first_hop),
                    "Queueing forward"
                );
                self.queue.enqueue(&WireMessage::Routed {
                    kind: MessageKind::Forward,
                    from: recipient,
                    dest: first_hop,
                    origin: self.local_id,
                    payload,
                })
            }
            None => self.send_broadcast(payload),
        }
    }

    fn send_broadcast(&mut self, payload: Bytes) -> Result<()> {
        let broadcast_id = {
            let mut state = self.routing.lock()?;
            state.next_broadcast_id()
        };
        debug!(id = broadcast_id, "Queueing broadcast");
        self.queue.enqueue(&WireMessage::Routed {
            kind: MessageKind::Broadcast,
            from: self.local_id,
            dest: broadcast_id,
            origin: self.local_id,
            payload,
        })
    }

    /// Extract the `@name` hint from the start of a chat body
    fn address_hint(body: &[u8]) -> Option<&str> {
        let text = std::str::from_utf8(body).ok()?;
        let rest = text.strip_prefix('@')?;
        let hint = rest.split_whitespace().next()?;
        if hint.is_empty() {
            None
        } else {
            Some(hint)
        }
    }
}
