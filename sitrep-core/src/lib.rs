//! Core library for the Meshtastic SITREP station
//!
//! Tracks the mesh node table and traffic counters, classifies node connectivity,
//! builds situation reports and transmits them line by line over the radio link.

pub mod config;
pub mod connection;
pub mod counters;
pub mod engine;
pub mod error;
pub mod liveness;
pub mod report;
pub mod schedule;
pub mod state;
pub mod time;
pub mod transmit;
pub mod watch;

// Re-export commonly used types
pub use anyhow::Result;
pub use config::SitrepConfig;
pub use connection::ConnectionManager;
pub use counters::{CounterSnapshot, TrafficCounters};
pub use engine::{Action, Command, Engine, Observation};
pub use liveness::{Connectivity, NodeStatus, Thresholds};
pub use report::{Report, ReportBuilder};
pub use schedule::RoutineSchedule;
pub use state::{LinkState, Node, NodeTable, PacketEvent, Station};
pub use transmit::{Destination, TextSender, TransmitOutcome, Transmitter};
pub use watch::{WatchList, WatchReport};
