use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
struct CounterState {
    packets: HashMap<String, u64>,
    messages: HashMap<String, u64>,
    aircraft_tracks: u64,
    reconnections: u64,
}

/// Traffic statistics shared between the packet ingestion path and the report builder.
///
/// All counters live behind one lock so a [`CounterSnapshot`] never mixes values
/// from before and after a concurrent update. Nothing is ever reset.
#[derive(Debug, Default)]
pub struct TrafficCounters {
    state: Mutex<CounterState>,
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub packets: HashMap<String, u64>,
    pub messages: HashMap<String, u64>,
    pub aircraft_tracks: u64,
    pub reconnections: u64,
}

impl CounterSnapshot {
    pub fn total_packets(&self) -> u64 {
        self.packets.values().sum()
    }

    pub fn total_messages(&self) -> u64 {
        self.messages.values().sum()
    }
}

impl TrafficCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one received packet of the given type
    pub fn record_packet(&self, label: &str) {
        let mut state = self.state.lock();
        let count = bump(&mut state.packets, label);
        debug!("Packet received: {label}, count: {count}");
    }

    /// Count one sent message of the given type
    pub fn record_message(&self, label: &str) {
        let mut state = self.state.lock();
        let count = bump(&mut state.messages, label);
        debug!("Message sent: {label}, count: {count}");
    }

    pub fn record_aircraft_track(&self) {
        self.state.lock().aircraft_tracks += 1;
    }

    /// Raise the aircraft track tally to `count`.
    ///
    /// Lower values are ignored so the counter never goes backwards.
    pub fn set_aircraft_tracks(&self, count: u64) {
        let mut state = self.state.lock();
        state.aircraft_tracks = state.aircraft_tracks.max(count);
    }

    pub fn record_connect(&self) {
        self.state.lock().reconnections += 1;
    }

    pub fn total_packets(&self) -> u64 {
        self.state.lock().packets.values().sum()
    }

    pub fn total_messages(&self) -> u64 {
        self.state.lock().messages.values().sum()
    }

    pub fn packet_count(&self, label: &str) -> u64 {
        self.state.lock().packets.get(label).copied().unwrap_or(0)
    }

    pub fn message_count(&self, label: &str) -> u64 {
        self.state.lock().messages.get(label).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let state = self.state.lock();
        CounterSnapshot {
            packets: state.packets.clone(),
            messages: state.messages.clone(),
            aircraft_tracks: state.aircraft_tracks,
            reconnections: state.reconnections,
        }
    }
}

fn bump(counts: &mut HashMap<String, u64>, label: &str) -> u64 {
    let count = counts.entry(label.to_string()).or_insert(0);
    *count += 1;
    *count
}
