use anyhow::{Context, Result, bail};
use meshtastic::Message as ProstMessage;
use meshtastic::api::state::Configured;
use meshtastic::api::{ConnectedStreamApi, StreamApi};
use meshtastic::packet::{PacketDestination, PacketReceiver, PacketRouter};
use meshtastic::protobufs;
use meshtastic::utils;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::counters::TrafficCounters;
use crate::state::{LinkState, Node, PacketEvent, Reception, Station};
use crate::time::unix_now;
use crate::transmit::{Destination, TextSender};

/// Label recorded for packets we cannot decrypt
pub const ENCRYPTED_LABEL: &str = "ENCRYPTED";

/// Packet router for outbound sends; inbound traffic is handled by the processing task
struct NoOpRouter {
    source: u32,
}

impl PacketRouter<(), std::io::Error> for NoOpRouter {
    fn handle_packet_from_radio(
        &mut self,
        _packet: protobufs::FromRadio,
    ) -> std::result::Result<(), std::io::Error> {
        Ok(())
    }

    fn handle_mesh_packet(
        &mut self,
        _packet: protobufs::MeshPacket,
    ) -> std::result::Result<(), std::io::Error> {
        Ok(())
    }

    fn source_node_id(&self) -> meshtastic::types::NodeId {
        self.source.into()
    }
}

/// Meshtastic radio link: keeps the node table current, counts traffic and sends text
pub struct ConnectionManager {
    port: Option<String>,
    ble: Option<String>,
    timeout: Duration,
    api: Option<ConnectedStreamApi<Configured>>,
    link_state: Arc<Mutex<LinkState>>,
    counters: Arc<TrafficCounters>,
    events_tx: mpsc::UnboundedSender<PacketEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<PacketEvent>>,
    packet_processor: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    pub async fn new(
        port: Option<String>,
        ble: Option<String>,
        timeout: Duration,
        counters: Arc<TrafficCounters>,
    ) -> Result<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            port,
            ble,
            timeout,
            api: None,
            link_state: Arc::new(Mutex::new(LinkState::new())),
            counters,
            events_tx,
            events_rx: Some(events_rx),
            packet_processor: None,
        })
    }

    pub async fn connect(&mut self) -> Result<()> {
        info!("Establishing connection to Meshtastic device...");

        if let Some(processor) = self.packet_processor.take() {
            processor.abort();
        }
        if let Some(previous) = self.api.take() {
            info!("Closing previous connection");
            if let Err(e) = previous.disconnect().await {
                warn!("Failed to close previous connection: {e:#}");
            }
        }

        let stream_api = StreamApi::new();

        let (packet_receiver, connected_api) = if let Some(_ble_addr) = &self.ble {
            #[cfg(feature = "bluetooth")]
            {
                info!("Connecting via Bluetooth to {addr}", addr = _ble_addr);
                let ble_id = utils::stream::BleId::from_mac_address(_ble_addr)
                    .unwrap_or_else(|_| utils::stream::BleId::from_name(_ble_addr));
                let stream = utils::stream::build_ble_stream(&ble_id, Duration::from_secs(10))
                    .await
                    .context("Failed to connect via Bluetooth")?;
                stream_api.connect(stream).await
            }
            #[cfg(not(feature = "bluetooth"))]
            {
                bail!("Bluetooth support not compiled. Build with --features bluetooth");
            }
        } else if let Some(port) = &self.port {
            if port.contains(':') {
                info!("Connecting via TCP to {port}");
                let stream = utils::stream::build_tcp_stream(port.clone())
                    .await
                    .context("Failed to connect via TCP")?;
                stream_api.connect(stream).await
            } else {
                info!("Connecting via serial port {port}");
                let stream = utils::stream::build_serial_stream(port.clone(), None, None, None)
                    .context("Failed to connect via serial")?;
                stream_api.connect(stream).await
            }
        } else {
            info!("Auto-detecting serial port...");
            let ports =
                utils::stream::available_serial_ports().context("Failed to list serial ports")?;

            let Some(port_name) = ports.first().cloned() else {
                bail!("No serial ports found. Please specify --port or --ble");
            };
            info!("Using auto-detected port: {port_name}");

            let stream = utils::stream::build_serial_stream(port_name, None, None, None)
                .context("Failed to connect to auto-detected serial port")?;
            stream_api.connect(stream).await
        };

        info!("Configuring connection...");
        let config_id = utils::generate_rand_id();
        let configured_api = connected_api
            .configure(config_id)
            .await
            .context("Failed to configure connection")?;

        self.api = Some(configured_api);
        self.counters.record_connect();

        self.start_packet_processing(packet_receiver).await;

        info!("Connection established and configured successfully");
        Ok(())
    }

    async fn start_packet_processing(&mut self, mut receiver: PacketReceiver) {
        if let Some(previous) = self.packet_processor.take() {
            previous.abort();
        }

        let link_state = self.link_state.clone();
        let counters = self.counters.clone();
        let events = self.events_tx.clone();

        let handle = tokio::spawn(async move {
            info!("Starting packet processing loop");

            while let Some(packet) = receiver.recv().await {
                if let Err(e) =
                    process_from_radio_packet(packet, &link_state, &counters, &events).await
                {
                    warn!("Error processing packet: {e:#}");
                }
            }

            info!("Packet processing loop ended");
        });

        self.packet_processor = Some(handle);

        // Give the processor a moment to take in the initial node database
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    pub fn is_connected(&self) -> bool {
        self.api.is_some()
    }

    /// False once the radio stream has ended and the processing task exited
    pub fn is_processing(&self) -> bool {
        self.packet_processor
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(processor) = self.packet_processor.take() {
            processor.abort();
        }

        if let Some(api) = self.api.take() {
            api.disconnect().await?;
        }

        Ok(())
    }

    pub fn get_api(&mut self) -> Result<&mut ConnectedStreamApi<Configured>> {
        self.api.as_mut().context("Not connected")
    }

    /// Owned copy of the current link state
    pub async fn link_state(&self) -> LinkState {
        self.link_state.lock().await.clone()
    }

    pub fn link_state_ref(&self) -> Arc<Mutex<LinkState>> {
        self.link_state.clone()
    }

    pub fn counters(&self) -> Arc<TrafficCounters> {
        self.counters.clone()
    }

    pub fn take_events(&mut self) -> Result<mpsc::UnboundedReceiver<PacketEvent>> {
        self.events_rx
            .take()
            .context("Packet event receiver already taken")
    }

    /// Wait until the radio has reported our own node number and user info
    pub async fn wait_for_station(&self) -> Result<Station> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            if let Some(station) = self.link_state.lock().await.local_station() {
                debug!(
                    "Local station is {short} ({num:08x})",
                    short = station.short_name,
                    num = station.node_num
                );
                return Ok(station);
            }
            if tokio::time::Instant::now() >= deadline {
                bail!(
                    "Timed out after {secs}s waiting for local node info",
                    secs = self.timeout.as_secs()
                );
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}

impl TextSender for ConnectionManager {
    async fn send_text(&mut self, text: &str, channel: u32, destination: Destination) -> Result<()> {
        let source = self
            .link_state
            .lock()
            .await
            .my_node_num
            .unwrap_or_default();
        let mut router = NoOpRouter { source };

        let dest = match destination {
            Destination::Broadcast => PacketDestination::Broadcast,
            Destination::Node(num) => PacketDestination::Node(num.into()),
        };

        let api = self.get_api()?;
        api.send_text(&mut router, text.to_string(), dest, false, channel.into())
            .await?;

        debug!("Text message sent to {destination} on channel {channel}");
        Ok(())
    }
}

async fn process_from_radio_packet(
    from_radio: protobufs::FromRadio,
    link_state: &Mutex<LinkState>,
    counters: &TrafficCounters,
    events: &mpsc::UnboundedSender<PacketEvent>,
) -> Result<()> {
    let Some(payload_variant) = from_radio.payload_variant else {
        return Ok(());
    };

    match payload_variant {
        protobufs::from_radio::PayloadVariant::MyInfo(my_info) => {
            link_state.lock().await.my_node_num = Some(my_info.my_node_num);
            debug!("Local node is {:08x}", my_info.my_node_num);
        }

        protobufs::from_radio::PayloadVariant::NodeInfo(node_info) => {
            let mut state = link_state.lock().await;
            let mut node = match node_info.user {
                Some(user) if !user.short_name.is_empty() => {
                    let mut node = Node::new(node_info.num, user.short_name, user.long_name);
                    if !user.id.is_empty() {
                        node.id = user.id;
                    }
                    node
                }
                _ => Node::placeholder(node_info.num),
            };
            // Zero means "never" on the wire
            node.last_heard = (node_info.last_heard > 0).then_some(u64::from(node_info.last_heard));
            node.snr = (node_info.snr != 0.0).then_some(node_info.snr);
            node.hops_away = node_info.hops_away;
            // NodeInfo carries no RSSI; keep whatever live packets told us
            node.rssi = state.nodes.get(node_info.num).and_then(|n| n.rssi);
            state.nodes.insert(node);
            debug!("Updated node info for {:08x}", node_info.num);
        }

        protobufs::from_radio::PayloadVariant::Packet(mesh_packet) => {
            process_mesh_packet(mesh_packet, link_state, counters, events).await?;
        }

        _ => {}
    }

    Ok(())
}

async fn process_mesh_packet(
    mesh_packet: protobufs::MeshPacket,
    link_state: &Mutex<LinkState>,
    counters: &TrafficCounters,
    events: &mpsc::UnboundedSender<PacketEvent>,
) -> Result<()> {
    let Some(payload_variant) = mesh_packet.payload_variant else {
        return Ok(());
    };

    let mut state = link_state.lock().await;
    if state.my_node_num == Some(mesh_packet.from) {
        debug!("Outgoing packet from local node, ignoring");
        return Ok(());
    }

    let previously_heard = state.nodes.get(mesh_packet.from).and_then(|n| n.last_heard);
    state.nodes.record_heard(
        mesh_packet.from,
        Reception {
            at: if mesh_packet.rx_time > 0 {
                u64::from(mesh_packet.rx_time)
            } else {
                unix_now()
            },
            rssi: (mesh_packet.rx_rssi != 0).then_some(mesh_packet.rx_rssi),
            snr: (mesh_packet.rx_snr != 0.0).then_some(mesh_packet.rx_snr),
            hops_away: (mesh_packet.hop_start > 0)
                .then(|| mesh_packet.hop_start.saturating_sub(mesh_packet.hop_limit)),
        },
    );

    let (label, text) = match payload_variant {
        protobufs::mesh_packet::PayloadVariant::Decoded(data) => {
            let portnum = data.portnum();
            let text = match portnum {
                protobufs::PortNum::TextMessageApp => {
                    Some(String::from_utf8_lossy(&data.payload).to_string())
                }
                protobufs::PortNum::NodeinfoApp => {
                    if let Ok(user) = protobufs::User::decode(data.payload.as_slice()) {
                        state.nodes.upsert_user(
                            mesh_packet.from,
                            &user.id,
                            &user.short_name,
                            &user.long_name,
                        );
                    }
                    None
                }
                _ => None,
            };
            (portnum.as_str_name().to_string(), text)
        }
        protobufs::mesh_packet::PayloadVariant::Encrypted(_) => {
            (ENCRYPTED_LABEL.to_string(), None)
        }
    };
    drop(state);

    counters.record_packet(&label);
    debug!(
        "Packet received from {from:08x} - {label}",
        from = mesh_packet.from
    );

    let event = PacketEvent {
        from: mesh_packet.from,
        to: mesh_packet.to,
        channel: mesh_packet.channel,
        label,
        text,
        previously_heard,
    };
    if events.send(event).is_err() {
        debug!("No listener for packet events");
    }

    Ok(())
}
