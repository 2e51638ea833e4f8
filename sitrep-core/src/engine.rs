use crate::report::{Report, ReportBuilder};
use crate::state::{NodeTable, PacketEvent};
use crate::time::format_uptime;
use crate::transmit::{Destination, TextSender, TransmitOutcome, Transmitter};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::str::FromStr;
use strum::{Display, EnumString};
use tracing::{debug, info, warn};

/// Message counter labels for everything the engine sends
pub mod labels {
    pub const PING_PONG: &str = "ping-pong";
    pub const SITREP_REQUESTED: &str = "sitrep-requested";
    pub const SITREP_ROUTINE: &str = "sitrep-routine";
    pub const DIRECT_REPLY: &str = "direct-reply";
    pub const WELCOME: &str = "welcome";
    pub const NEW_NODE_ALERT: &str = "new-node-alert";
    pub const RECONNECT_ALERT: &str = "reconnect-alert";
}

/// Silence after which a watched node coming back is reported to the admin channel
pub const RECONNECT_ALERT_AFTER_SECS: u64 = 86_400;

pub const DIRECT_REPLY_TEXT: &str =
    "Message received. Send 'Ping' to test connectivity or 'Sitrep' to request a report";

/// Text commands understood over the mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum Command {
    Ping,
    Sitrep,
}

impl Command {
    pub fn parse(text: &str) -> Option<Self> {
        Self::from_str(text.trim()).ok()
    }
}

/// What the engine noticed about a packet's sender
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub from_watched: bool,
    pub new_node: bool,
    /// Set when a watched sender was silent for longer than [`RECONNECT_ALERT_AFTER_SECS`]
    pub silent_for: Option<u64>,
}

/// Outbound work produced by an inbound packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Reply {
        text: String,
        channel: u32,
        destination: Destination,
        label: &'static str,
    },
    SendReport {
        channel: u32,
        destination: Destination,
    },
}

/// Ties event observation, command handling and report delivery together
#[derive(Debug)]
pub struct Engine {
    builder: ReportBuilder,
    transmitter: Transmitter,
    known_nodes: Mutex<HashSet<u32>>,
    welcome_new_nodes: bool,
    admin_channel: Option<u32>,
}

impl Engine {
    pub fn new(builder: ReportBuilder, transmitter: Transmitter) -> Self {
        Self {
            builder,
            transmitter,
            known_nodes: Mutex::new(HashSet::new()),
            welcome_new_nodes: false,
            admin_channel: None,
        }
    }

    /// Broadcast operator alerts (new nodes, watched nodes returning) on this channel
    pub fn with_admin_channel(mut self, channel: Option<u32>) -> Self {
        self.admin_channel = channel;
        self
    }

    /// Treat every node already in `table` as seen, so only later arrivals count as new
    pub fn seed_known(&self, table: &NodeTable) {
        let mut known = self.known_nodes.lock();
        known.extend(table.iter().map(|n| n.num));
        debug!("Seeded {count} known nodes", count = known.len());
    }

    pub fn with_welcome(mut self, enabled: bool) -> Self {
        self.welcome_new_nodes = enabled;
        self
    }

    pub fn builder(&self) -> &ReportBuilder {
        &self.builder
    }

    pub fn transmitter(&self) -> &Transmitter {
        &self.transmitter
    }

    /// Check a packet against the watch list and the set of senders seen so far
    pub fn observe(&self, table: &NodeTable, event: &PacketEvent) -> Observation {
        let from_watched = self.builder.watch_list().is_from_watched(table, event);

        let sender = table.get(event.from);
        let new_node = sender.is_some() && self.known_nodes.lock().insert(event.from);
        if new_node {
            info!("New node detected: {}", table.short_name_of(event.from));
        }

        let silent_for = match (from_watched, sender, event.previously_heard) {
            (true, Some(node), Some(previous)) => node
                .last_heard
                .map(|heard| heard.saturating_sub(previous))
                .filter(|gap| *gap > RECONNECT_ALERT_AFTER_SECS),
            _ => None,
        };
        if let Some(gap) = silent_for {
            info!(
                "Node {} has reconnected to the mesh after {}",
                table.short_name_of(event.from),
                format_uptime(gap)
            );
        }

        Observation {
            from_watched,
            new_node,
            silent_for,
        }
    }

    /// Decide the replies owed for a packet. Packets from the local node get none.
    pub fn respond(
        &self,
        table: &NodeTable,
        event: &PacketEvent,
        observation: Observation,
    ) -> Vec<Action> {
        let station = self.builder.station();
        let mut actions = Vec::new();
        if event.from == station.node_num {
            return actions;
        }

        let sender = table.short_name_of(event.from);

        if observation.new_node && self.welcome_new_nodes {
            actions.push(Action::Reply {
                text: format!(
                    "Welcome to the Mesh {sender}! I'll respond to Ping and any Direct Messages!"
                ),
                channel: 0,
                destination: Destination::Node(event.from),
                label: labels::WELCOME,
            });
        }

        if let Some(admin) = self.admin_channel {
            if observation.new_node {
                actions.push(Action::Reply {
                    text: format!("New node detected: {sender}"),
                    channel: admin,
                    destination: Destination::Broadcast,
                    label: labels::NEW_NODE_ALERT,
                });
            }
            if let Some(gap) = observation.silent_for {
                let mut text = format!(
                    "Node {sender} has reconnected to the mesh after {}",
                    format_uptime(gap)
                );
                if let Some(hops) = table.get(event.from).and_then(|n| n.hops_away)
                    && hops > 0
                {
                    text.push_str(&format!(". {hops} hops away"));
                }
                actions.push(Action::Reply {
                    text,
                    channel: admin,
                    destination: Destination::Broadcast,
                    label: labels::RECONNECT_ALERT,
                });
            }
        }

        let Some(text) = event.text.as_deref() else {
            return actions;
        };

        let direct = event.to == station.node_num;
        let destination = if direct {
            Destination::Node(event.from)
        } else {
            Destination::Broadcast
        };

        match Command::parse(text) {
            Some(Command::Ping) => actions.push(Action::Reply {
                text: format!("{sender} de {short}, Pong", short = station.short_name),
                channel: event.channel,
                destination,
                label: labels::PING_PONG,
            }),
            Some(Command::Sitrep) => actions.push(Action::SendReport {
                channel: event.channel,
                destination,
            }),
            None if direct => actions.push(Action::Reply {
                text: DIRECT_REPLY_TEXT.to_string(),
                channel: event.channel,
                destination,
                label: labels::DIRECT_REPLY,
            }),
            None => debug!("Message not recognized from {sender}: {text}"),
        }

        actions
    }

    /// Observe a packet and return the replies it calls for
    pub fn handle(&self, table: &NodeTable, event: &PacketEvent) -> (Observation, Vec<Action>) {
        let observation = self.observe(table, event);
        let actions = self.respond(table, event, observation);
        (observation, actions)
    }

    /// Carry out actions in order; each successful send is counted under its label
    pub async fn execute<S: TextSender>(
        &self,
        sender: &mut S,
        table: &NodeTable,
        actions: Vec<Action>,
        now: DateTime<Utc>,
    ) {
        let counters = self.builder.counters();
        for action in actions {
            match action {
                Action::Reply {
                    text,
                    channel,
                    destination,
                    label,
                } => match sender.send_text(&text, channel, destination).await {
                    Ok(()) => {
                        info!("Packet sent: {text} to {destination} on channel {channel}");
                        counters.record_message(label);
                    }
                    Err(e) => warn!("Failed to send {label} reply to {destination}: {e:#}"),
                },
                Action::SendReport {
                    channel,
                    destination,
                } => {
                    let report = self.builder.build(table, now);
                    self.deliver(
                        sender,
                        &report,
                        channel,
                        destination,
                        labels::SITREP_REQUESTED,
                    )
                    .await;
                }
            }
        }
    }

    /// Transmit a built report and count it under `label` if any line went out
    pub async fn deliver<S: TextSender>(
        &self,
        sender: &mut S,
        report: &Report,
        channel: u32,
        destination: Destination,
        label: &str,
    ) -> TransmitOutcome {
        let lines = report.transmission_lines();
        let outcome = self
            .transmitter
            .transmit(sender, &lines, channel, destination)
            .await;
        if outcome.sent > 0 {
            self.builder.counters().record_message(label);
        }
        outcome
    }
}
