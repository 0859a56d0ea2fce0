//! Node identity types
//!
//! Mesh nodes are identified by a 32-bit id derived from the hardware
//! (the radio chip serial on real devices). Id `0` is reserved: the routing
//! table uses it to mean "direct neighbor" in the first-hop field.

use serde::{Deserialize, Serialize};

/// A mesh node identifier. Never zero for a live node.
pub type NodeId = u32;

/// Render a node id the way it appears on consoles and displays.
pub fn format_node_id(id: NodeId) -> String {
    format!("{:08X}", id)
}

/// Parse a node id from its console form, with or without a `0x` prefix.
pub fn parse_node_id(text: &str) -> crate::error::Result<NodeId> {
    let digits = text.trim().trim_start_matches("0x");
    let id = u32::from_str_radix(digits, 16)
        .map_err(|_| crate::error::CoreError::InvalidNodeId(text.to_string()))?;
    if id == 0 {
        return Err(crate::error::CoreError::ReservedNodeId);
    }
    Ok(id)
}

/// A routing-table entry as reported to the application layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Node id
    pub node_id: NodeId,
    /// Next hop towards the node, 0 when it is a direct neighbor
    pub first_hop: NodeId,
    /// Number of hops to reach the node
    pub hops: u8,
    /// Alias from the name directory, if one is known
    pub alias: Option<String>,
    /// Milliseconds since the entry was last refreshed
    pub age_ms: u64,
}

impl NodeInfo {
    /// Whether the node is reachable without an intermediate hop
    pub fn is_direct(&self) -> bool {
        self.first_hop == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_node_id_pads_to_eight() {
        assert_eq!(format_node_id(0x1E2F8C8F), "1E2F8C8F");
        assert_eq!(format_node_id(0x2F), "0000002F");
    }

    #[test]
    fn test_parse_node_id_forms() {
        assert_eq!(parse_node_id("1E2F8C8F").unwrap(), 0x1E2F_8C8F);
        assert_eq!(parse_node_id("0x2F").unwrap(), 0x2F);
        assert!(parse_node_id("not-hex").is_err());
        assert!(parse_node_id("0").is_err());
    }

    #[test]
    fn test_node_info_direct() {
        let info = NodeInfo {
            node_id: 0x1234,
            first_hop: 0,
            hops: 0,
            alias: None,
            age_ms: 0,
        };
        assert!(info.is_direct());
    }
}
