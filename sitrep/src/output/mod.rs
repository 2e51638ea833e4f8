use anyhow::Result;
use colored::*;
use comfy_table::{Cell, Color, Table};
use serde::Serialize;
use sitrep_core::{NodeStatus, Report};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Json,
    Table,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Table }
    }
}

pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    println!("{json}", json = serde_json::to_string_pretty(data)?);
    Ok(())
}

pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table
}

pub fn status_cell(status: NodeStatus) -> Cell {
    let color = match status {
        NodeStatus::Connected => Color::Green,
        NodeStatus::BeyondHops => Color::Yellow,
        NodeStatus::Stale => Color::DarkYellow,
        NodeStatus::NoTelemetry => Color::DarkGrey,
    };
    Cell::new(status.to_string()).fg(color)
}

/// Render the seven report segments the way an operator would read them off the air
pub fn print_report(report: &Report) {
    println!("\n{header}", header = report.header.bold().cyan());
    for line in &report.lines {
        let (label, body) = line.split_once(": ").unwrap_or((line.as_str(), ""));
        println!("  {label}: {body}", label = label.bold());
    }
    println!("{footer}\n", footer = report.footer.bold().cyan());

    let mut table = create_table();
    table.set_header(vec![
        Cell::new("Direct Nodes"),
        Cell::new("Watched Direct"),
        Cell::new("Aircraft Tracks"),
        Cell::new("Packets Received"),
    ]);
    table.add_row(vec![
        Cell::new(report.direct_nodes),
        Cell::new(report.watched_direct),
        Cell::new(report.aircraft_tracks),
        Cell::new(report.packets_received),
    ]);
    println!("{table}");
}
