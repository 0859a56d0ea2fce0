//! Mesh service
//!
//! One worker task owns the whole mesh: it consumes staged inbound frames,
//! drives the send scheduler, and runs the topology sync tick. Producers
//! interact through a [`MeshHandle`] (command channel) and observe the mesh
//! through a broadcast stream of [`MeshEvent`]s, mirroring how the rest of
//! the application never touches the tables directly.

use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use lantern_core::{format_node_id, MeshConfig, MeshEvent, NodeId, NodeInfo};
use lantern_proto::{AppType, WireMessage};
use lantern_routing::{RoutingState, SharedRouting};

use crate::error::{MeshError, Result};
use crate::forwarding::{ForwardingEngine, ForwardingStats};
use crate::radio::{InboundFrame, InboundMailbox, Radio};
use crate::scheduler::{SchedulerStats, SendQueue, SendScheduler};
use crate::sync::{build_snapshot, SyncSchedule};

/// Commands accepted by the mesh worker
enum MeshCommand {
    /// Build and queue an outbound message
    Send {
        app_type: AppType,
        body: Bytes,
        reply: oneshot::Sender<Result<()>>,
    },
    /// List the known nodes with their aliases
    ListNodes {
        reply: oneshot::Sender<Result<Vec<NodeInfo>>>,
    },
    /// Fetch the service counters
    Stats { reply: oneshot::Sender<MeshStats> },
    /// Stop the worker
    Shutdown,
}

/// Counters aggregated across the service
#[derive(Debug, Clone, Default)]
pub struct MeshStats {
    /// Send scheduler counters
    pub scheduler: SchedulerStats,
    /// Forwarding engine counters
    pub forwarding: ForwardingStats,
    /// Inbound frames lost to the single-slot mailbox
    pub inbound_dropped: u64,
    /// Frames discarded as malformed
    pub invalid_frames: u64,
}

/// Handle for talking to a running [`MeshService`]
#[derive(Clone)]
pub struct MeshHandle {
    command_tx: mpsc::Sender<MeshCommand>,
    local_id: NodeId,
}

impl MeshHandle {
    /// The local node id
    pub fn local_id(&self) -> NodeId {
        self.local_id
    }

    /// Build and queue an outbound message
    pub async fn send(&self, app_type: AppType, body: impl Into<Bytes>) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.command_tx
            .send(MeshCommand::Send {
                app_type,
                body: body.into(),
                reply,
            })
            .await
            .map_err(|_| MeshError::Channel("mesh service gone".into()))?;
        response
            .await
            .map_err(|_| MeshError::Channel("mesh service dropped reply".into()))?
    }

    /// List known nodes with aliases and freshness
    pub async fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
        let (reply, response) = oneshot::channel();
        self.command_tx
            .send(MeshCommand::ListNodes { reply })
            .await
            .map_err(|_| MeshError::Channel("mesh service gone".into()))?;
        response
            .await
            .map_err(|_| MeshError::Channel("mesh service dropped reply".into()))?
    }

    /// Fetch the service counters
    pub async fn stats(&self) -> Result<MeshStats> {
        let (reply, response) = oneshot::channel();
        self.command_tx
            .send(MeshCommand::Stats { reply })
            .await
            .map_err(|_| MeshError::Channel("mesh service gone".into()))?;
        response
            .await
            .map_err(|_| MeshError::Channel("mesh service dropped reply".into()))
    }

    /// Ask the worker to stop
    pub async fn shutdown(&self) -> Result<()> {
        self.command_tx
            .send(MeshCommand::Shutdown)
            .await
            .map_err(|_| MeshError::Channel("mesh service gone".into()))
    }
}

/// The mesh worker: routing state, forwarding, scheduling and sync in one task
pub struct MeshService {
    local_id: NodeId,
    config: MeshConfig,
    routing: SharedRouting,
    engine: ForwardingEngine,
    scheduler: SendScheduler,
    queue: SendQueue,
    radio: Arc<dyn Radio>,
    mailbox: Arc<InboundMailbox>,
    command_rx: mpsc::Receiver<MeshCommand>,
    event_tx: broadcast::Sender<MeshEvent>,
    invalid_frames: u64,
    reported_overruns: u64,
}

impl MeshService {
    /// Create a service around a radio driver and its inbound mailbox
    pub fn new(
        local_id: NodeId,
        config: MeshConfig,
        radio: Arc<dyn Radio>,
        mailbox: Arc<InboundMailbox>,
    ) -> (Self, MeshHandle, broadcast::Receiver<MeshEvent>) {
        let routing = SharedRouting::new(RoutingState::new(local_id, &config), config.lock_wait());
        let (scheduler, queue) = SendScheduler::new(&config);
        let (event_tx, event_rx) = broadcast::channel(256);
        let (command_tx, command_rx) = mpsc::channel(64);

        let engine = ForwardingEngine::new(local_id, routing.clone(), queue.clone(), event_tx.clone());

        let handle = MeshHandle {
            command_tx,
            local_id,
        };
        let service = Self {
            local_id,
            config,
            routing,
            engine,
            scheduler,
            queue,
            radio,
            mailbox,
            command_rx,
            event_tx,
            invalid_frames: 0,
            reported_overruns: 0,
        };
        (service, handle, event_rx)
    }

    /// Run the worker until shutdown
    pub async fn run(mut self) -> Result<()> {
        info!(node = %format_node_id(self.local_id), "Starting mesh service");
        self.radio.standby().await?;
        self.radio.start_receive().await?;
        let _ = self.event_tx.send(MeshEvent::Started {
            node_id: self.local_id,
        });

        let mut schedule = SyncSchedule::new(&self.config);
        let mut next_sync = Instant::now() + schedule.interval();
        let mailbox = self.mailbox.clone();

        loop {
            tokio::select! {
                frame = mailbox.recv() => {
                    self.handle_inbound(frame);
                }

                maybe_index = self.scheduler.next_pending() => {
                    match maybe_index {
                        Some(index) => self.transmit(index).await,
                        None => break,
                    }
                }

                maybe_cmd = self.command_rx.recv() => {
                    match maybe_cmd {
                        Some(cmd) => {
                            if !self.handle_command(cmd) {
                                break;
                            }
                        }
                        None => break,
                    }
                }

                _ = tokio::time::sleep_until(next_sync) => {
                    self.sync_tick(&mut schedule);
                    schedule.maybe_relax();
                    next_sync = Instant::now() + schedule.interval();
                }
            }
        }

        let _ = self.event_tx.send(MeshEvent::Stopped);
        info!("Mesh service stopped");
        Ok(())
    }

    /// Decode a staged frame and hand it to the forwarding engine
    fn handle_inbound(&mut self, frame: InboundFrame) {
        let dropped = self.mailbox.dropped();
        if dropped > self.reported_overruns {
            self.reported_overruns = dropped;
            let _ = self.event_tx.send(MeshEvent::InboundOverrun);
        }

        debug!(
            len = frame.data.len(),
            rssi = frame.quality.rssi,
            snr = frame.quality.snr,
            "Frame received"
        );
        let message = match WireMessage::decode(&frame.data) {
            Ok(message) => message,
            Err(err) => {
                self.invalid_frames += 1;
                warn!(error = %err, "Invalid package discarded");
                return;
            }
        };
        if let Err(err) = self.engine.handle_frame(message, frame.quality) {
            // Lost message or skipped cycle, the mesh keeps running
            warn!(error = %err, "Inbound frame not fully handled");
        }
    }

    /// Drive one queued message through the radio
    async fn transmit(&mut self, index: usize) {
        let radio = self.radio.clone();
        match self.scheduler.transmit_slot(index, radio.as_ref()).await {
            Ok(()) => {}
            Err(MeshError::TransmitStuck { duration_ms }) => {
                error!(duration_ms, "loraState stuck in TX, recovered");
                let _ = self.event_tx.send(MeshEvent::TransmitStuckRecovered);
            }
            Err(err) => warn!(error = %err, "Transmit failed"),
        }
    }

    /// One topology sync tick: clean stale routes, flood the snapshot
    fn sync_tick(&mut self, schedule: &mut SyncSchedule) {
        let snapshot = match self.routing.lock() {
            Ok(mut state) => {
                if !state
                    .table_mut()
                    .clean_map(self.config.inactivity_timeout())
                {
                    schedule.disrupted();
                    let _ = self.event_tx.send(MeshEvent::TopologyChanged);
                }
                build_snapshot(self.local_id, &state)
            }
            Err(err) => {
                // Skip this tick, the next one retries naturally
                error!(error = %err, "Cannot access map for clean up and syncing");
                return;
            }
        };

        debug!("Sending mesh map");
        if let Err(err) = self.queue.enqueue(&snapshot) {
            error!(error = %err, "Cannot send map");
        }
    }

    /// Returns false when the worker should stop
    fn handle_command(&mut self, command: MeshCommand) -> bool {
        match command {
            MeshCommand::Send {
                app_type,
                body,
                reply,
            } => {
                let result = self.engine.send_message(app_type, &body);
                let _ = reply.send(result);
                true
            }
            MeshCommand::ListNodes { reply } => {
                let result = self
                    .routing
                    .lock()
                    .map(|state| state.node_infos())
                    .map_err(MeshError::from);
                let _ = reply.send(result);
                true
            }
            MeshCommand::Stats { reply } => {
                let _ = reply.send(MeshStats {
                    scheduler: self.queue.stats(),
                    forwarding: self.engine.stats(),
                    inbound_dropped: self.mailbox.dropped(),
                    invalid_frames: self.invalid_frames,
                });
                true
            }
            MeshCommand::Shutdown => false,
        }
    }
}
