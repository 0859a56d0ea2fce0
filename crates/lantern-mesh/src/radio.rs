//! Radio driver seam
//!
//! The mesh core never touches hardware directly; it drives a [`Radio`]
//! implementation and consumes frames the driver publishes into an
//! [`InboundMailbox`]. The mailbox is a single-slot landing area with
//! try-publish semantics: the driver's receive-complete path runs in an
//! interrupt-like context and must never block, so when the worker has not
//! consumed the previous frame yet the new one is dropped and counted.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;
use tracing::{error, trace};

use crate::error::Result;

/// Link quality sampled when a frame arrived
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalQuality {
    /// Received signal strength in dBm
    pub rssi: i16,
    /// Signal-to-noise ratio in dB
    pub snr: i8,
}

/// A received frame staged for the worker
#[derive(Debug, Clone)]
pub struct InboundFrame {
    /// Raw frame bytes as read from the radio
    pub data: Bytes,
    /// Link quality at reception
    pub quality: SignalQuality,
}

/// Driver interface for a half-duplex packet radio
///
/// Implementations wrap real hardware or, in tests, a simulated shared
/// medium. The core is the only caller of the transmit-side methods.
#[async_trait]
pub trait Radio: Send + Sync {
    /// Transmit a frame. Completes when the radio reports the frame sent.
    async fn transmit(&self, frame: &[u8]) -> Result<()>;

    /// Enter receive-listening mode
    async fn start_receive(&self) -> Result<()>;

    /// Leave receive mode, radio idles
    async fn standby(&self) -> Result<()>;

    /// Clear-channel assessment: true when nobody is transmitting
    async fn channel_clear(&self) -> bool;

    /// Link quality of the most recent reception
    fn signal_quality(&self) -> SignalQuality;
}

/// Single-slot staging area between the radio's receive path and the
/// mesh worker
///
/// There is deliberately no queue of pending inbound frames: one slot
/// bounds both memory and latency, and a radio faster than the worker
/// loses frames loudly instead of buffering unboundedly.
#[derive(Default)]
pub struct InboundMailbox {
    slot: Mutex<Option<InboundFrame>>,
    ready: Notify,
    dropped: AtomicU64,
}

impl InboundMailbox {
    /// Create an empty mailbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a received frame for the worker.
    ///
    /// Returns false when the previous frame was still unconsumed; the new
    /// frame is dropped and counted.
    pub fn publish(&self, frame: InboundFrame) -> bool {
        {
            let mut slot = self.slot.lock();
            if slot.is_some() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                error!("New frame arrived before the old one was processed");
                return false;
            }
            *slot = Some(frame);
        }
        self.ready.notify_one();
        true
    }

    /// Take the staged frame, if any
    pub fn take(&self) -> Option<InboundFrame> {
        self.slot.lock().take()
    }

    /// Wait for and take the next staged frame
    pub async fn recv(&self) -> InboundFrame {
        loop {
            if let Some(frame) = self.take() {
                trace!(len = frame.data.len(), "Frame consumed from mailbox");
                return frame;
            }
            self.ready.notified().await;
        }
    }

    /// Number of frames dropped because the slot was occupied
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
