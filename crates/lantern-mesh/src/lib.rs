//! Lantern Mesh - Mesh service for the Lantern network
//!
//! This crate ties the routing state and wire codec to a radio driver:
//!
//! - **radio**: the [`Radio`] driver trait and the single-slot
//!   [`InboundMailbox`] the driver publishes received frames into
//! - **scheduler**: [`SendScheduler`], the bounded outbound queue and the
//!   only writer to the radio transmit path
//! - **forwarding**: [`ForwardingEngine`], the per-frame decision logic
//! - **sync**: [`SyncSchedule`], the adaptive topology-sync timer
//! - **service**: [`MeshService`] worker plus the [`MeshHandle`] command API
//!
//! # Architecture
//!
//! ```text
//!  radio rx ──► InboundMailbox ──► ForwardingEngine ──► MeshEvent
//!                                      │    ▲
//!                                      ▼    │
//!                              SendScheduler│SharedRouting
//!                                      │
//!  radio tx ◄──────────────────────────┘
//! ```
//!
//! A single worker task owns the scheduler loop, the inbound dispatch and
//! the topology sync tick; producers only ever enqueue.

pub mod error;
pub mod forwarding;
pub mod radio;
pub mod scheduler;
pub mod service;
pub mod sync;

pub use error::{MeshError, Result};
pub use forwarding::{ForwardingEngine, ForwardingStats};
pub use radio::{InboundFrame, InboundMailbox, Radio, SignalQuality};
pub use scheduler::{SendQueue, SendScheduler, SchedulerStats};
pub use service::{MeshHandle, MeshService, MeshStats};
pub use sync::SyncSchedule;
