//! Send scheduler
//!
//! Bounded outbound queue plus the channel-access state machine. Producers
//! (the forwarding engine, the sync driver, application sends) enqueue into
//! a fixed set of slots; a FIFO of slot indices preserves transmit order.
//! The worker loop is the only consumer and the only writer to the radio
//! transmit path.
//!
//! State machine per message: `Idle -> ChannelCheck -> Transmitting -> Idle`,
//! with receive-listening as the resting sub-state of `Idle`. A message
//! whose clear-channel assessment never succeeds within the bound is
//! dropped, not retried. A watchdog bounds the time spent in
//! `Transmitting` and force-resets the radio to listening when a driver
//! fails to signal completion.

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, warn};

use lantern_core::MeshConfig;
use lantern_proto::WireMessage;

use crate::error::{MeshError, Result};
use crate::radio::Radio;

/// Interval between clear-channel probes while waiting for the air to free
const CAD_PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// Scheduler state, tracked for logging and fault reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerState {
    /// Resting, radio is listening
    Idle,
    /// Probing for a clear channel
    ChannelCheck,
    /// Frame handed to the radio, watchdog armed
    Transmitting,
}

/// Counters surfaced by the scheduler
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    /// Messages accepted into a slot
    pub enqueued: u64,
    /// Messages that made it onto the air
    pub transmitted: u64,
    /// Enqueue attempts rejected because every slot was occupied
    pub queue_full_rejections: u64,
    /// Messages dropped because the channel never cleared in time
    pub dropped_channel_busy: u64,
    /// Transmits the watchdog had to abort
    pub watchdog_resets: u64,
}

/// Producer-side handle: enqueue encoded frames into the slot array
#[derive(Clone)]
pub struct SendQueue {
    slots: Arc<Mutex<Vec<Option<Bytes>>>>,
    fifo_tx: mpsc::Sender<usize>,
    stats: Arc<Mutex<SchedulerStats>>,
}

impl SendQueue {
    /// Encode `message` and place it into a free slot.
    ///
    /// Fails with [`MeshError::QueueFull`] when every slot is occupied or
    /// the index FIFO cannot accept the slot within its bound; on FIFO
    /// failure the slot is freed again, never leaked.
    pub fn enqueue(&self, message: &WireMessage) -> Result<()> {
        let frame = message.encode()?;
        let index = {
            let mut slots = self.slots.lock();
            match slots.iter().position(Option::is_none) {
                Some(index) => {
                    slots[index] = Some(frame);
                    index
                }
                None => {
                    self.stats.lock().queue_full_rejections += 1;
                    warn!("Send queue is full");
                    return Err(MeshError::QueueFull);
                }
            }
        };

        if self.fifo_tx.try_send(index).is_err() {
            // FIFO congested or closed: release the slot so it is not leaked
            self.slots.lock()[index] = None;
            self.stats.lock().queue_full_rejections += 1;
            error!("Send queue FIFO is busy");
            return Err(MeshError::QueueFull);
        }

        self.stats.lock().enqueued += 1;
        debug!(slot = index, "Message queued");
        Ok(())
    }

    /// Snapshot of the scheduler counters
    pub fn stats(&self) -> SchedulerStats {
        self.stats.lock().clone()
    }

    /// Number of currently occupied slots
    pub fn pending(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.is_some()).count()
    }

    /// Take every occupied slot's frame, test hook for inspecting output
    #[cfg(test)]
    pub(crate) fn drain_frames(&self) -> Vec<Bytes> {
        self.slots.lock().iter_mut().filter_map(Option::take).collect()
    }
}

/// Consumer side: owned by the single mesh worker
pub struct SendScheduler {
    slots: Arc<Mutex<Vec<Option<Bytes>>>>,
    fifo_rx: mpsc::Receiver<usize>,
    stats: Arc<Mutex<SchedulerStats>>,
    state: SchedulerState,
    channel_busy_timeout: Duration,
    transmit_watchdog: Duration,
}

impl SendScheduler {
    /// Create the scheduler and its producer handle
    pub fn new(config: &MeshConfig) -> (Self, SendQueue) {
        let slots = Arc::new(Mutex::new(vec![None; config.send_queue_slots.max(1)]));
        let stats = Arc::new(Mutex::new(SchedulerStats::default()));
        let (fifo_tx, fifo_rx) = mpsc::channel(config.send_queue_slots.max(1));

        let queue = SendQueue {
            slots: slots.clone(),
            fifo_tx,
            stats: stats.clone(),
        };
        let scheduler = Self {
            slots,
            fifo_rx,
            stats,
            state: SchedulerState::Idle,
            channel_busy_timeout: config.channel_busy_timeout(),
            transmit_watchdog: config.transmit_watchdog(),
        };
        (scheduler, queue)
    }

    /// Wait for the next pending slot index. `None` once every producer
    /// handle is gone.
    pub async fn next_pending(&mut self) -> Option<usize> {
        self.fifo_rx.recv().await
    }

    /// Drive one message through the channel-access state machine.
    pub async fn transmit_slot(&mut self, index: usize, radio: &dyn Radio) -> Result<()> {
        self.state = SchedulerState::ChannelCheck;
        let deadline = Instant::now() + self.channel_busy_timeout;
        while !radio.channel_clear().await {
            if Instant::now() >= deadline {
                // Channel never cleared: drop the message, free the slot
                self.slots.lock()[index] = None;
                self.stats.lock().dropped_channel_busy += 1;
                self.state = SchedulerState::Idle;
                error!(
                    "CAD failed after {}ms, message dropped",
                    self.channel_busy_timeout.as_millis()
                );
                return Err(MeshError::ChannelBusyTimeout {
                    duration_ms: self.channel_busy_timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(CAD_PROBE_INTERVAL).await;
        }

        // Dequeue: copy out and mark the slot free before transmitting
        let frame = match self.slots.lock()[index].take() {
            Some(frame) => frame,
            None => {
                // Slot raced empty (dropped elsewhere); nothing to send
                self.state = SchedulerState::Idle;
                return Ok(());
            }
        };

        debug!(slot = index, len = frame.len(), "Transmitting");
        self.state = SchedulerState::Transmitting;

        let sent = timeout(self.transmit_watchdog, radio.transmit(&frame)).await;

        // Back to listening no matter how the transmit went
        let _ = radio.standby().await;
        let _ = radio.start_receive().await;
        self.state = SchedulerState::Idle;

        match sent {
            Ok(Ok(())) => {
                self.stats.lock().transmitted += 1;
                Ok(())
            }
            Ok(Err(err)) => {
                warn!(error = %err, "Radio transmit failed");
                Err(err)
            }
            Err(_) => {
                self.stats.lock().watchdog_resets += 1;
                error!(
                    "Transmit stuck for {}ms, radio force-reset",
                    self.transmit_watchdog.as_millis()
                );
                Err(MeshError::TransmitStuck {
                    duration_ms: self.transmit_watchdog.as_millis() as u64,
                })
            }
        }
    }
}
