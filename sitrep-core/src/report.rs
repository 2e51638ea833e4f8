use crate::counters::TrafficCounters;
use crate::liveness::{Thresholds, classify_connected};
use crate::state::{NodeTable, Station};
use crate::time::format_zulu;
use crate::watch::WatchList;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

pub const INTENTIONS: &str = "Continue to track and report. Send 'Ping' to test connectivity. Send 'Sitrep' to request a report";

/// One compiled SITREP.
///
/// Every figure in it comes from a single counter snapshot and a single node table borrow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub timestamp_zulu: String,
    pub header: String,
    pub lines: [String; 5],
    pub footer: String,
    pub direct_nodes: usize,
    pub watched_direct: usize,
    pub aircraft_tracks: u64,
    pub packets_received: u64,
}

impl Report {
    /// Header, the five numbered lines and the footer, in order
    pub fn segments(&self) -> Vec<&str> {
        std::iter::once(self.header.as_str())
            .chain(self.lines.iter().map(String::as_str))
            .chain(std::iter::once(self.footer.as_str()))
            .collect()
    }

    /// The six radio transmissions: the footer rides on the final numbered line
    pub fn transmission_lines(&self) -> Vec<String> {
        let [line1, line2, line3, line4, line5] = &self.lines;
        vec![
            self.header.clone(),
            line1.clone(),
            line2.clone(),
            line3.clone(),
            line4.clone(),
            format!("{line5}. {footer}", footer = self.footer),
        ]
    }
}

/// Compiles reports for a station from shared traffic counters and a node table
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    station: Station,
    watch_list: WatchList,
    counters: Arc<TrafficCounters>,
    thresholds: Thresholds,
}

impl ReportBuilder {
    pub fn new(station: Station, watch_list: WatchList, counters: Arc<TrafficCounters>) -> Self {
        Self {
            station,
            watch_list,
            counters,
            thresholds: Thresholds::DIRECT,
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn station(&self) -> &Station {
        &self.station
    }

    pub fn watch_list(&self) -> &WatchList {
        &self.watch_list
    }

    pub fn counters(&self) -> &Arc<TrafficCounters> {
        &self.counters
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Build a report stamped with the same instant used for liveness checks
    pub fn build(&self, table: &NodeTable, now: DateTime<Utc>) -> Report {
        self.build_at(table, now, now)
    }

    /// Build a report evaluated at `now` but stamped `stamp` (routine reports use 0000Z)
    pub fn build_at(
        &self,
        table: &NodeTable,
        now: DateTime<Utc>,
        stamp: DateTime<Utc>,
    ) -> Report {
        let counts = self.counters.snapshot();
        let local = self.station.node_num;

        let connectivity = classify_connected(table, local, now, self.thresholds);
        let watch = self
            .watch_list
            .build_report(table, local, now, self.thresholds);

        let timestamp_zulu = format_zulu(stamp);
        let header = format!(
            "CQ CQ CQ de {call}. My {short} SITREP is as follows: {timestamp_zulu}",
            call = self.station.call_sign,
            short = self.station.short_name,
        );
        let lines = [
            format!("Line 1: Direct Nodes online: {connectivity}"),
            format!("Line 2: Aircraft Tracks: {}", counts.aircraft_tracks),
            format!("Line 3: Nodes of Interest: {}", watch.text()),
            format!("Line 4: Packets Received: {}", counts.total_packets()),
            format!("Line 5: Intentions: {INTENTIONS}"),
        ];
        let footer = format!("de {} out", self.station.short_name);

        debug!("Built SITREP for {timestamp_zulu}");

        Report {
            timestamp_zulu,
            header,
            lines,
            footer,
            direct_nodes: connectivity.count,
            watched_direct: watch.direct_count,
            aircraft_tracks: counts.aircraft_tracks,
            packets_received: counts.total_packets(),
        }
    }
}
