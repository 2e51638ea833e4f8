use crate::state::{Node, NodeTable};
use crate::time::{elapsed_since, seconds_since};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::Display;
use tracing::{debug, info};

/// Recency and hop limits a node must satisfy to count as connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub window_minutes: u64,
    pub max_hops: u32,
}

impl Thresholds {
    /// Single hop and heard within the last 15 minutes
    pub const DIRECT: Self = Self {
        window_minutes: 15,
        max_hops: 1,
    };

    pub fn new(window_minutes: u64, max_hops: u32) -> Self {
        Self {
            window_minutes,
            max_hops,
        }
    }

    pub fn window_secs(&self) -> u64 {
        self.window_minutes.saturating_mul(60)
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::DIRECT
    }
}

/// Liveness verdict for a single node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum NodeStatus {
    Connected,
    #[strum(to_string = "Beyond Hops")]
    BeyondHops,
    Stale,
    #[strum(to_string = "No Telemetry")]
    NoTelemetry,
}

/// Classify one node. Hop distance is checked before recency; either may be absent.
pub fn classify_node(node: &Node, now: DateTime<Utc>, thresholds: Thresholds) -> NodeStatus {
    if let Some(hops) = node.hops_away
        && hops > thresholds.max_hops
    {
        return NodeStatus::BeyondHops;
    }

    match node.last_heard {
        Some(heard) if seconds_since(heard, now) < thresholds.window_secs() => {
            NodeStatus::Connected
        }
        Some(_) => NodeStatus::Stale,
        None => NodeStatus::NoTelemetry,
    }
}

/// Per-node outcome of a classification pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeDetail {
    pub num: u32,
    pub short_name: String,
    pub status: NodeStatus,
    pub detail: String,
}

/// Result of [`classify_connected`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Connectivity {
    pub count: usize,
    pub details: Vec<NodeDetail>,
}

impl Connectivity {
    pub fn connected(&self) -> impl Iterator<Item = &NodeDetail> {
        self.details
            .iter()
            .filter(|d| d.status == NodeStatus::Connected)
    }

    /// `"0"` when nothing is connected, otherwise the count followed by every detail line
    pub fn summary(&self) -> String {
        if self.count == 0 {
            return "0".to_string();
        }
        let listing = self
            .details
            .iter()
            .map(|d| d.detail.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        format!("{count} ({listing})", count = self.count)
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Build the diagnostic line for a node given its status
pub fn describe_node(
    node: &Node,
    status: NodeStatus,
    now: DateTime<Utc>,
    thresholds: Thresholds,
) -> String {
    match status {
        NodeStatus::BeyondHops => format!(
            "{short} - more than {max} hops away ({hops} Hops)",
            short = node.short_name,
            max = thresholds.max_hops,
            hops = node.hops_away.unwrap_or_default(),
        ),
        NodeStatus::Connected => {
            let mut line = format!("{} {} ({})", node.id, node.long_name, node.short_name);
            if let Some(hops) = node.hops_away {
                line.push_str(&format!(" {hops} Hops"));
            }
            if let Some(heard) = node.last_heard {
                line.push_str(&format!(" - {}", elapsed_since(heard, now)));
            }
            push_signal_metrics(&mut line, node);
            line
        }
        NodeStatus::Stale => format!(
            "{short} - last heard more than {minutes} minutes ago",
            short = node.short_name,
            minutes = thresholds.window_minutes,
        ),
        NodeStatus::NoTelemetry if node.hops_away.is_some() => {
            format!("{} - no last heard telemetry", node.short_name)
        }
        NodeStatus::NoTelemetry => {
            format!("{} - no hop or last heard telemetry", node.short_name)
        }
    }
}

/// Append ` RSSI: <n>dBm.` and ` SNR: <n>dB.` for whichever metrics the node has
pub fn push_signal_metrics(line: &mut String, node: &Node) {
    if let Some(rssi) = node.rssi {
        line.push_str(&format!(" RSSI: {rssi}dBm."));
    }
    if let Some(snr) = node.snr {
        line.push_str(&format!(" SNR: {snr}dB."));
    }
}

/// Count the nodes that satisfy `thresholds`, skipping the local node
pub fn classify_connected(
    table: &NodeTable,
    local_node: u32,
    now: DateTime<Utc>,
    thresholds: Thresholds,
) -> Connectivity {
    let mut connectivity = Connectivity::default();

    for node in table.iter().filter(|n| n.num != local_node) {
        let status = classify_node(node, now, thresholds);
        let detail = describe_node(node, status, now, thresholds);
        debug!(
            "Node {id} ({short}): {status} - {detail}",
            id = node.id,
            short = node.short_name
        );

        if status == NodeStatus::Connected {
            connectivity.count += 1;
        }
        connectivity.details.push(NodeDetail {
            num: node.num,
            short_name: node.short_name.clone(),
            status,
            detail,
        });
    }

    info!(
        "SITREP: {count} nodes connected within {minutes} minutes and {hops} hops",
        count = connectivity.count,
        minutes = thresholds.window_minutes,
        hops = thresholds.max_hops
    );
    connectivity
}
