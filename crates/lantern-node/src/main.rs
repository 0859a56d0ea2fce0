//! Lantern Node - interactive mesh node over the UDP link simulator
//!
//! Runs the full mesh stack with a line console for chat and node
//! management. The radio is simulated with UDP datagrams: each node
//! listens on a port and is told which peer ports it can "hear", so
//! multi-hop topologies can be laid out across local processes.
//!
//! A three-node chain on one machine:
//!
//! ```text
//! lantern-node --listen 4401 --peer 127.0.0.1:4402
//! lantern-node --listen 4402 --peer 127.0.0.1:4401 --peer 127.0.0.1:4403
//! lantern-node --listen 4403 --peer 127.0.0.1:4402
//! ```

mod console;
mod radio;
mod store;

use anyhow::Context;
use clap::Parser;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use lantern_core::{clamp_alias, format_node_id, parse_node_id, AliasStore, MeshConfig};
use lantern_mesh::{InboundMailbox, MeshService};
use lantern_proto::AppType;

use radio::UdpRadio;
use store::JsonAliasStore;

#[derive(Parser)]
#[command(name = "lantern-node")]
#[command(about = "Lantern mesh node with a UDP link simulator")]
struct Args {
    /// Node id as 8 hex digits (random when omitted)
    #[arg(long)]
    id: Option<String>,

    /// Display name for this node
    #[arg(long, short)]
    name: Option<String>,

    /// UDP listen port (0 = auto-assign)
    #[arg(long, default_value_t = 0)]
    listen: u16,

    /// Peer address this node can hear, repeatable (host:port)
    #[arg(long = "peer", short)]
    peers: Vec<String>,

    /// Path of the JSON state file
    #[arg(long, default_value = "lantern-node.json")]
    state: PathBuf,

    /// Enable verbose logging
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let node_id = match &args.id {
        Some(text) => parse_node_id(text).context("bad --id")?,
        None => loop {
            let id: u32 = rand::random();
            if id != 0 {
                break id;
            }
        },
    };
    info!("Starting Lantern node {}", format_node_id(node_id));

    let socket = Arc::new(UdpSocket::bind(("127.0.0.1", args.listen)).await?);
    info!("Listening on udp://{}", socket.local_addr()?);

    let peers: Vec<SocketAddr> = args
        .peers
        .iter()
        .map(|peer| {
            peer.parse()
                .with_context(|| format!("invalid peer address: {peer}"))
        })
        .collect::<anyhow::Result<_>>()?;
    if peers.is_empty() {
        info!("No peers configured, this node is alone until some are added");
    } else {
        info!("In range of {} peer(s)", peers.len());
    }

    let store = Arc::new(JsonAliasStore::new(args.state));
    let alias = match args.name {
        Some(name) => {
            let name = clamp_alias(&name).to_string();
            store.save_alias(&name).await;
            Some(name)
        }
        None => store.load_alias().await,
    };

    let mailbox = Arc::new(InboundMailbox::new());
    radio::spawn_receive_pump(socket.clone(), mailbox.clone());
    let udp_radio = Arc::new(UdpRadio::new(socket, peers));

    let (service, handle, events) =
        MeshService::new(node_id, MeshConfig::default(), udp_radio, mailbox);
    tokio::spawn(async move {
        if let Err(err) = service.run().await {
            error!(error = %err, "Mesh service failed");
        }
    });

    let announce = Arc::new(Mutex::new(alias.clone()));
    if let Some(name) = &alias {
        info!(alias = %name, "Announcing stored name");
        handle
            .send(AppType::Name, name.as_bytes().to_vec())
            .await?;
    }

    let event_task = tokio::spawn(console::run_events(
        events,
        handle.clone(),
        announce.clone(),
    ));

    tokio::select! {
        result = console::run_console(handle.clone(), store, announce) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    handle.shutdown().await.ok();
    let _ = tokio::time::timeout(Duration::from_secs(2), event_task).await;
    Ok(())
}
