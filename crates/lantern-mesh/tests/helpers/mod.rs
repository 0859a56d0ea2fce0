//! TestMesh - spawn real mesh services over a simulated shared medium
//!
//! Every node runs the actual [`MeshService`] worker; only the radio is
//! simulated. Links are explicit and directional pairs, so tests can build
//! partial topologies (chains, partitions) and change them mid-test.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use lantern_core::{MeshConfig, MeshEvent, NodeId, NodeInfo};
use lantern_mesh::{
    InboundFrame, InboundMailbox, MeshHandle, MeshService, Radio, SignalQuality,
};

/// The ether: who can hear whom, and where their receive paths live
pub struct SharedMedium {
    endpoints: Mutex<Vec<(NodeId, Arc<InboundMailbox>)>>,
    links: Mutex<HashSet<(NodeId, NodeId)>>,
}

impl SharedMedium {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            endpoints: Mutex::new(Vec::new()),
            links: Mutex::new(HashSet::new()),
        })
    }

    fn attach(&self, id: NodeId, mailbox: Arc<InboundMailbox>) {
        self.endpoints.lock().push((id, mailbox));
    }

    /// Make `a` and `b` hear each other
    pub fn link(&self, a: NodeId, b: NodeId) {
        let mut links = self.links.lock();
        links.insert((a, b));
        links.insert((b, a));
    }

    /// Break the link between `a` and `b`
    pub fn unlink(&self, a: NodeId, b: NodeId) {
        let mut links = self.links.lock();
        links.remove(&(a, b));
        links.remove(&(b, a));
    }

    fn reachable_from(&self, sender: NodeId) -> Vec<Arc<InboundMailbox>> {
        let links = self.links.lock();
        self.endpoints
            .lock()
            .iter()
            .filter(|(id, _)| links.contains(&(sender, *id)))
            .map(|(_, mailbox)| mailbox.clone())
            .collect()
    }
}

/// Radio driver bound to the shared medium
pub struct MediumRadio {
    id: NodeId,
    medium: Arc<SharedMedium>,
}

#[async_trait]
impl Radio for MediumRadio {
    async fn transmit(&self, frame: &[u8]) -> lantern_mesh::Result<()> {
        let data = Bytes::copy_from_slice(frame);
        for mailbox in self.medium.reachable_from(self.id) {
            let staged = InboundFrame {
                data: data.clone(),
                quality: SignalQuality { rssi: -60, snr: 8 },
            };
            // The single-slot mailbox drops frames that arrive while the
            // worker is busy; retry briefly so topology tests stay
            // deterministic instead of racing the worker loop
            for _ in 0..100 {
                if mailbox.publish(staged.clone()) {
                    break;
                }
                sleep(Duration::from_millis(2)).await;
            }
        }
        Ok(())
    }

    async fn start_receive(&self) -> lantern_mesh::Result<()> {
        Ok(())
    }

    async fn standby(&self) -> lantern_mesh::Result<()> {
        Ok(())
    }

    async fn channel_clear(&self) -> bool {
        true
    }

    fn signal_quality(&self) -> SignalQuality {
        SignalQuality { rssi: -60, snr: 8 }
    }
}

/// One spawned node: its handle, its events, and the worker task
pub struct TestNode {
    pub id: NodeId,
    pub handle: MeshHandle,
    pub events: broadcast::Receiver<MeshEvent>,
    task: JoinHandle<()>,
}

/// A set of real mesh services sharing one simulated medium
pub struct TestMesh {
    pub medium: Arc<SharedMedium>,
    pub nodes: Vec<TestNode>,
}

impl TestMesh {
    /// Spawn one service per id. No links exist yet; tests wire the
    /// topology they need with [`SharedMedium::link`].
    pub fn spawn(ids: &[NodeId]) -> Self {
        let medium = SharedMedium::new();
        let mut nodes = Vec::with_capacity(ids.len());

        for &id in ids {
            let mailbox = Arc::new(InboundMailbox::new());
            medium.attach(id, mailbox.clone());
            let radio = Arc::new(MediumRadio {
                id,
                medium: medium.clone(),
            });
            let (service, handle, events) =
                MeshService::new(id, MeshConfig::local_test(), radio, mailbox);
            let task = tokio::spawn(async move {
                if let Err(err) = service.run().await {
                    panic!("mesh worker failed: {err}");
                }
            });
            nodes.push(TestNode {
                id,
                handle,
                events,
                task,
            });
        }

        Self { medium, nodes }
    }

    pub fn node(&self, index: usize) -> &TestNode {
        &self.nodes[index]
    }

    pub fn node_mut(&mut self, index: usize) -> &mut TestNode {
        &mut self.nodes[index]
    }

    /// Poll `node`'s table until it holds an entry for `target`
    pub async fn wait_for_route(&self, node: usize, target: NodeId, secs: u64) -> NodeInfo {
        let handle = self.node(node).handle.clone();
        timeout(Duration::from_secs(secs), async move {
            loop {
                let infos = handle.list_nodes().await.expect("list_nodes failed");
                if let Some(info) = infos.into_iter().find(|info| info.node_id == target) {
                    return info;
                }
                sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!("node {node} never learned a route to {target:08X}")
        })
    }

    /// Poll `node`'s table until `target` is gone
    pub async fn wait_for_eviction(&self, node: usize, target: NodeId, secs: u64) {
        let handle = self.node(node).handle.clone();
        timeout(Duration::from_secs(secs), async move {
            loop {
                let infos = handle.list_nodes().await.expect("list_nodes failed");
                if !infos.iter().any(|info| info.node_id == target) {
                    return;
                }
                sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!("node {node} never evicted {target:08X}")
        })
    }

    /// Stop every worker and wait for the tasks to finish
    pub async fn shutdown(self) {
        for node in &self.nodes {
            let _ = node.handle.shutdown().await;
        }
        for node in self.nodes {
            let _ = timeout(Duration::from_secs(2), node.task).await;
        }
    }
}

/// Send, retrying when the two-slot queue happens to be full with
/// periodic sync traffic
pub async fn send_with_retry(handle: &MeshHandle, app_type: lantern_proto::AppType, body: &[u8]) {
    for _ in 0..50 {
        match handle.send(app_type, body.to_vec()).await {
            Ok(()) => return,
            Err(lantern_mesh::MeshError::QueueFull) => {
                sleep(Duration::from_millis(10)).await;
            }
            Err(err) => panic!("send failed: {err}"),
        }
    }
    panic!("send queue never freed up");
}

/// Wait for the next application payload on an event stream
pub async fn wait_for_data(
    events: &mut broadcast::Receiver<MeshEvent>,
    secs: u64,
) -> (NodeId, Bytes) {
    timeout(Duration::from_secs(secs), async {
        loop {
            match events.recv().await {
                Ok(MeshEvent::DataReceived {
                    origin, payload, ..
                }) => return (origin, payload),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    panic!("event stream closed while waiting for data")
                }
            }
        }
    })
    .await
    .expect("no application payload arrived in time")
}

/// Assert that no application payload shows up within `wait`
pub async fn expect_no_data(events: &mut broadcast::Receiver<MeshEvent>, wait: Duration) {
    let result = timeout(wait, async {
        loop {
            match events.recv().await {
                Ok(MeshEvent::DataReceived { origin, .. }) => return origin,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => std::future::pending().await,
            }
        }
    })
    .await;
    if let Ok(origin) = result {
        panic!("unexpected payload delivered from {origin:08X}");
    }
}
