use crate::liveness::{NodeStatus, Thresholds, classify_node, push_signal_metrics};
use crate::state::{Node, NodeTable, PacketEvent};
use crate::time::elapsed_since;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

/// Hop distance at or below which a watched node counts as a direct peer
pub const DIRECT_PEER_HOPS: u32 = 1;

/// Operator-configured nodes of interest, by short name, in report order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchList {
    names: Vec<String>,
}

/// Rendered "Nodes of Interest" section plus its direct peer tally
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WatchReport {
    pub direct_count: usize,
    pub lines: Vec<String>,
}

impl WatchReport {
    /// Lines separated by newlines, each starting on its own line; `None` for an empty list
    pub fn text(&self) -> String {
        if self.lines.is_empty() {
            return "None".to_string();
        }
        format!("\n{}", self.lines.join("\n"))
    }
}

impl WatchList {
    /// Build a watch list, dropping blanks and repeated names
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Vec::new();
        for name in names {
            let name: String = name.into();
            let name = name.trim();
            if !name.is_empty() && !list.iter().any(|n: &String| n == name) {
                list.push(name.to_string());
            }
        }
        Self { names: list }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, short_name: &str) -> bool {
        self.names.iter().any(|n| n == short_name)
    }

    /// Whether a packet was sent by a watched node. Unresolvable senders never match.
    pub fn is_from_watched(&self, table: &NodeTable, packet: &PacketEvent) -> bool {
        let Some(sender) = table.get(packet.from) else {
            debug!("Sender {:08x} not in node table", packet.from);
            return false;
        };
        if self.contains(&sender.short_name) {
            info!("Node of interest detected: {}", sender.short_name);
            return true;
        }
        false
    }

    /// One numbered line per watched name; letters advance only for resolved nodes
    pub fn build_report(
        &self,
        table: &NodeTable,
        local_node: u32,
        now: DateTime<Utc>,
        thresholds: Thresholds,
    ) -> WatchReport {
        let mut report = WatchReport::default();
        let mut resolved = 0usize;

        for (position, short_name) in self.names.iter().enumerate() {
            let number = position + 1;
            let node = table
                .iter()
                .find(|n| n.num != local_node && n.short_name == *short_name);

            let Some(node) = node else {
                debug!("Node of interest {short_name} not found");
                report.lines.push(format!("{number}. - Not Found"));
                continue;
            };

            let label = line_label(resolved);
            resolved += 1;

            if node.hops_away.is_some_and(|h| h <= DIRECT_PEER_HOPS) {
                report.direct_count += 1;
            }

            report.lines.push(format!(
                "{number}. {label}.{short}/{long} - {status}",
                short = node.short_name,
                long = node.long_name,
                status = status_text(node, now, thresholds),
            ));
        }

        report
    }
}

fn status_text(node: &Node, now: DateTime<Utc>, thresholds: Thresholds) -> String {
    let status = classify_node(node, now, thresholds);
    let mut text = match node.last_heard {
        Some(heard) => elapsed_since(heard, now),
        None => "not heard".to_string(),
    };
    if let Some(hops) = node.hops_away {
        text.push_str(&format!(" {hops} Hops."));
    }
    push_signal_metrics(&mut text, node);
    if status != NodeStatus::Connected {
        text.push_str(&format!(" [{status}]"));
    }
    text
}

/// Spreadsheet-style labels: `A`..`Z`, then `AA`, `AB`, ...
pub fn line_label(index: usize) -> String {
    let mut letters = Vec::new();
    let mut remaining = index;
    loop {
        letters.push(char::from(b'A' + (remaining % 26) as u8));
        if remaining < 26 {
            break;
        }
        remaining = remaining / 26 - 1;
    }
    letters.iter().rev().collect()
}
