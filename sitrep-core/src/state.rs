use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Short name reported for node numbers missing from the node table
pub const UNKNOWN_NODE: &str = "Unknown";

/// Meshtastic broadcast address
pub const BROADCAST_ADDR: u32 = 0xFFFF_FFFF;

/// A remote (or local) radio participant as surfaced by the radio link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub num: u32,
    pub id: String,
    pub short_name: String,
    pub long_name: String,
    pub last_heard: Option<u64>,
    pub hops_away: Option<u32>,
    pub rssi: Option<i32>,
    pub snr: Option<f32>,
}

impl Node {
    pub fn new(num: u32, short_name: impl Into<String>, long_name: impl Into<String>) -> Self {
        Self {
            num,
            id: node_id(num),
            short_name: short_name.into(),
            long_name: long_name.into(),
            last_heard: None,
            hops_away: None,
            rssi: None,
            snr: None,
        }
    }

    /// Placeholder for a sender we have packets from but no user info yet.
    ///
    /// Mirrors the firmware default of using the last four hex digits as short name.
    pub fn placeholder(num: u32) -> Self {
        let id = node_id(num);
        let short_name = id[id.len() - 4..].to_string();
        let long_name = format!("Meshtastic {short_name}");
        Self {
            id,
            short_name,
            long_name,
            ..Self::new(num, "", "")
        }
    }

    pub fn heard_at(mut self, unix_seconds: u64) -> Self {
        self.last_heard = Some(unix_seconds);
        self
    }

    pub fn with_hops(mut self, hops: u32) -> Self {
        self.hops_away = Some(hops);
        self
    }

    pub fn with_rssi(mut self, rssi: i32) -> Self {
        self.rssi = Some(rssi);
        self
    }

    pub fn with_snr(mut self, snr: f32) -> Self {
        self.snr = Some(snr);
        self
    }
}

/// Canonical `!xxxxxxxx` user id for a node number
pub fn node_id(num: u32) -> String {
    format!("!{num:08x}")
}

/// Known nodes keyed by node number.
///
/// Ordered so that anything iterating it produces the same output for the same table.
#[derive(Debug, Clone, Default)]
pub struct NodeTable {
    nodes: BTreeMap<u32, Node>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Node) -> Option<Node> {
        self.nodes.insert(node.num, node)
    }

    pub fn get(&self, num: u32) -> Option<&Node> {
        self.nodes.get(&num)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Linear scan by short name; first match in node number order wins
    pub fn find_by_short_name(&self, short_name: &str) -> Option<&Node> {
        self.nodes.values().find(|n| n.short_name == short_name)
    }

    pub fn short_name_of(&self, num: u32) -> &str {
        self.nodes
            .get(&num)
            .map(|n| n.short_name.as_str())
            .unwrap_or(UNKNOWN_NODE)
    }

    pub fn long_name_of(&self, num: u32) -> &str {
        self.nodes
            .get(&num)
            .map(|n| n.long_name.as_str())
            .unwrap_or(UNKNOWN_NODE)
    }

    /// Create or rename a node from user info, keeping any telemetry already gathered
    pub fn upsert_user(&mut self, num: u32, id: &str, short_name: &str, long_name: &str) {
        let node = self
            .nodes
            .entry(num)
            .or_insert_with(|| Node::placeholder(num));
        if !id.is_empty() {
            node.id = id.to_string();
        }
        if !short_name.is_empty() {
            node.short_name = short_name.to_string();
        }
        if !long_name.is_empty() {
            node.long_name = long_name.to_string();
        }
    }

    /// Refresh reception telemetry for a sender, creating a placeholder if it is new
    pub fn record_heard(&mut self, num: u32, heard: Reception) {
        let node = self
            .nodes
            .entry(num)
            .or_insert_with(|| Node::placeholder(num));
        node.last_heard = Some(heard.at);
        if heard.rssi.is_some() {
            node.rssi = heard.rssi;
        }
        if heard.snr.is_some() {
            node.snr = heard.snr;
        }
        if heard.hops_away.is_some() {
            node.hops_away = heard.hops_away;
        }
    }
}

/// Reception details of a single packet from a node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reception {
    pub at: u64,
    pub rssi: Option<i32>,
    pub snr: Option<f32>,
    pub hops_away: Option<u32>,
}

/// The identity a report speaks for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub node_num: u32,
    pub short_name: String,
    pub long_name: String,
    pub call_sign: String,
}

impl Station {
    pub fn new(node_num: u32, short_name: impl Into<String>, long_name: impl Into<String>) -> Self {
        let short_name = short_name.into();
        Self {
            node_num,
            call_sign: short_name.clone(),
            short_name,
            long_name: long_name.into(),
        }
    }

    /// Override the call sign used in the report header; `None` keeps the short name
    pub fn with_call_sign(mut self, call_sign: Option<String>) -> Self {
        if let Some(call_sign) = call_sign.filter(|c| !c.is_empty()) {
            self.call_sign = call_sign;
        }
        self
    }
}

/// Cached radio link state from received packets
#[derive(Debug, Clone, Default)]
pub struct LinkState {
    pub my_node_num: Option<u32>,
    pub nodes: NodeTable,
}

impl LinkState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Station identity of the local node, once both its number and user info are known
    pub fn local_station(&self) -> Option<Station> {
        let num = self.my_node_num?;
        let node = self.nodes.get(num)?;
        Some(Station::new(num, &node.short_name, &node.long_name))
    }
}

/// A received packet as seen by the SITREP engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketEvent {
    pub from: u32,
    pub to: u32,
    pub channel: u32,
    pub label: String,
    pub text: Option<String>,
    /// Sender's last-heard time before this packet arrived
    pub previously_heard: Option<u64>,
}

impl PacketEvent {
    pub fn is_broadcast(&self) -> bool {
        self.to == BROADCAST_ADDR
    }
}
