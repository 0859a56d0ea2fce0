//! UDP link simulator
//!
//! Stands in for the packet radio during development: every transmit is
//! sent as one datagram to each configured peer address, and received
//! datagrams are staged in the mesh worker's mailbox. Radio range becomes
//! a matter of which peers each node is pointed at, so partial topologies
//! (chains, islands) can be built on one machine.

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{error, trace, warn};

use lantern_mesh::{InboundFrame, InboundMailbox, MeshError, Radio, SignalQuality};
use lantern_proto::MAX_FRAME_LEN;

pub struct UdpRadio {
    socket: Arc<UdpSocket>,
    peers: Vec<SocketAddr>,
}

impl UdpRadio {
    pub fn new(socket: Arc<UdpSocket>, peers: Vec<SocketAddr>) -> Self {
        Self { socket, peers }
    }
}

#[async_trait]
impl Radio for UdpRadio {
    async fn transmit(&self, frame: &[u8]) -> lantern_mesh::Result<()> {
        for peer in &self.peers {
            self.socket
                .send_to(frame, peer)
                .await
                .map_err(|err| MeshError::Radio(err.to_string()))?;
        }
        trace!(len = frame.len(), peers = self.peers.len(), "Frame sent");
        Ok(())
    }

    async fn start_receive(&self) -> lantern_mesh::Result<()> {
        Ok(())
    }

    async fn standby(&self) -> lantern_mesh::Result<()> {
        Ok(())
    }

    async fn channel_clear(&self) -> bool {
        // No carrier sensing on UDP
        true
    }

    fn signal_quality(&self) -> SignalQuality {
        SignalQuality { rssi: -60, snr: 8 }
    }
}

/// Pump received datagrams into the mesh worker's single-slot mailbox
pub fn spawn_receive_pump(
    socket: Arc<UdpSocket>,
    mailbox: Arc<InboundMailbox>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_FRAME_LEN];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, from)) => {
                    if len == 0 || len > MAX_FRAME_LEN {
                        warn!(len, %from, "Datagram with impossible frame length");
                        continue;
                    }
                    let mut rng = rand::thread_rng();
                    let frame = InboundFrame {
                        data: Bytes::copy_from_slice(&buf[..len]),
                        // Simulated link variance so displays look alive
                        quality: SignalQuality {
                            rssi: rng.gen_range(-90..=-40),
                            snr: rng.gen_range(5..=10),
                        },
                    };
                    if !mailbox.publish(frame) {
                        warn!(%from, "Frame lost, worker still busy with the previous one");
                    }
                }
                Err(err) => {
                    error!(error = %err, "UDP receive failed, pump stopping");
                    break;
                }
            }
        }
    })
}
