//! Line console and event printer
//!
//! The console reads stdin line by line: slash commands manage the node,
//! anything else is a chat message. A leading `@<name-or-id> ` addresses a
//! message to one node; everything else floods.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{info, warn};

use lantern_core::{clamp_alias, format_node_id, AliasStore, MeshEvent, NodeId};
use lantern_mesh::MeshHandle;
use lantern_proto::AppType;

use crate::store::JsonAliasStore;

const HELP: &str = "\
Commands:
  /name <alias>   set and announce this node's name
  /nodes          list known nodes
  /stats          show mesh counters
  /quit           exit
Anything else is sent as chat; prefix with @<name-or-id> to address one node.";

/// Read commands and chat from stdin until `/quit` or EOF
pub async fn run_console(
    handle: MeshHandle,
    store: Arc<JsonAliasStore>,
    announce: Arc<Mutex<Option<String>>>,
) -> anyhow::Result<()> {
    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(arg) = name_argument(line) {
            let alias = clamp_alias(arg);
            if alias.is_empty() {
                println!("usage: /name <alias>");
                continue;
            }
            if !store.save_alias(alias).await {
                warn!("Name not persisted, it will be lost on restart");
            }
            *announce.lock() = Some(alias.to_string());
            match handle.send(AppType::Name, alias.as_bytes().to_vec()).await {
                Ok(()) => println!("you are now \"{alias}\""),
                Err(err) => println!("cannot announce name: {err}"),
            }
        } else if line == "/nodes" {
            print_nodes(&handle).await;
        } else if line == "/stats" {
            match handle.stats().await {
                Ok(stats) => println!("{stats:#?}"),
                Err(err) => println!("cannot fetch stats: {err}"),
            }
        } else if line == "/quit" {
            break;
        } else if line.starts_with('/') {
            println!("unknown command");
            println!("{HELP}");
        } else if let Err(err) = handle.send(AppType::Chat, line.as_bytes().to_vec()).await {
            println!("message not sent: {err}");
        }
    }
    Ok(())
}

/// Argument of a `/name` command; `None` when `line` is some other command
fn name_argument(line: &str) -> Option<&str> {
    match line.strip_prefix("/name") {
        Some("") => Some(""),
        Some(rest) if rest.starts_with(' ') => Some(rest.trim()),
        _ => None,
    }
}

async fn print_nodes(handle: &MeshHandle) {
    let infos = match handle.list_nodes().await {
        Ok(infos) => infos,
        Err(err) => {
            println!("cannot list nodes: {err}");
            return;
        }
    };
    if infos.is_empty() {
        println!("no nodes heard yet");
        return;
    }
    println!("{} node(s):", infos.len());
    for info in infos {
        let label = info
            .alias
            .clone()
            .unwrap_or_else(|| format!("<{}>", format_node_id(info.node_id)));
        let via = if info.is_direct() {
            "direct".to_string()
        } else {
            format!("via {}", format_node_id(info.first_hop))
        };
        let age = humantime::format_duration(Duration::from_secs(info.age_ms / 1000));
        println!(
            "  {}  {:<18} hops={} {}, heard {} ago",
            format_node_id(info.node_id),
            label,
            info.hops,
            via,
            age
        );
    }
}

/// Print mesh events and re-announce the name when the topology shifts,
/// so newly appeared nodes learn who we are
pub async fn run_events(
    mut events: broadcast::Receiver<MeshEvent>,
    handle: MeshHandle,
    announce: Arc<Mutex<Option<String>>>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event stream lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        match event {
            MeshEvent::Started { node_id } => {
                info!(node = %format_node_id(node_id), "Mesh up");
            }
            MeshEvent::Stopped => break,
            MeshEvent::DataReceived {
                origin,
                payload,
                rssi,
                snr,
            } => {
                print_payload(&handle, origin, &payload, rssi, snr).await;
            }
            MeshEvent::TopologyChanged => {
                let alias = announce.lock().clone();
                if let Some(alias) = alias {
                    if let Err(err) = handle.send(AppType::Name, alias.into_bytes()).await {
                        warn!(error = %err, "Name re-announcement not sent");
                    }
                }
            }
            MeshEvent::InboundOverrun => {
                warn!("Receiving faster than processing, frames lost");
            }
            MeshEvent::TransmitStuckRecovered => {
                warn!("Transmitter hung and was reset");
            }
        }
    }
}

async fn print_payload(handle: &MeshHandle, origin: NodeId, payload: &[u8], rssi: i16, snr: i8) {
    let label = match handle.list_nodes().await {
        Ok(infos) => infos
            .into_iter()
            .find(|info| info.node_id == origin)
            .and_then(|info| info.alias),
        Err(_) => None,
    }
    .unwrap_or_else(|| format!("<{}>", format_node_id(origin)));

    match payload.first().copied().and_then(AppType::from_u8) {
        Some(AppType::Chat) => {
            let text = String::from_utf8_lossy(&payload[1..]);
            println!("[{label}] {text}  (rssi {rssi} snr {snr})");
        }
        Some(AppType::Location) => {
            let text = String::from_utf8_lossy(&payload[1..]);
            println!("[{label}] is at {text}");
        }
        Some(AppType::Name) => {
            let text = String::from_utf8_lossy(&payload[1..]);
            println!("[{}] is now known as \"{text}\"", format_node_id(origin));
        }
        None => {
            warn!(
                origin = %format_node_id(origin),
                len = payload.len(),
                "Payload with unknown application tag"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_command_requires_exact_word() {
        assert_eq!(name_argument("/name remy"), Some("remy"));
        assert_eq!(name_argument("/name  padded "), Some("padded"));
        assert_eq!(name_argument("/name"), Some(""));
        assert_eq!(name_argument("/names"), None);
        assert_eq!(name_argument("/namebob"), None);
        assert_eq!(name_argument("/nodes"), None);
    }
}
