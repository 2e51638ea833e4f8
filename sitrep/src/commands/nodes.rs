use anyhow::Result;
use chrono::Utc;
use colored::*;
use comfy_table::Cell;
use sitrep_core::liveness::{classify_connected, classify_node};
use sitrep_core::time::elapsed_since;

use super::Session;
use crate::output::{OutputFormat, create_table, print_json, status_cell};

pub async fn handle_nodes(mut session: Session) -> Result<()> {
    let state = session.connection.link_state().await;
    let thresholds = session.config.thresholds();
    let watch_list = session.config.watch_list();
    let local = session.station.node_num;
    let now = Utc::now();

    let connectivity = classify_connected(&state.nodes, local, now, thresholds);

    match session.format {
        OutputFormat::Json => print_json(&connectivity)?,
        OutputFormat::Table => {
            println!(
                "\n{}",
                format!(
                    "Known Nodes ({total}), connected within {minutes} min / {hops} hop(s): {count}",
                    total = connectivity.details.len(),
                    minutes = thresholds.window_minutes,
                    hops = thresholds.max_hops,
                    count = connectivity.count
                )
                .bold()
                .green()
            );

            let mut table = create_table();
            table.set_header(vec![
                Cell::new("Node ID"),
                Cell::new("Short"),
                Cell::new("Name"),
                Cell::new("Hops"),
                Cell::new("Last Heard"),
                Cell::new("RSSI (dBm)"),
                Cell::new("SNR (dB)"),
                Cell::new("Status"),
            ]);

            for node in state.nodes.iter().filter(|n| n.num != local) {
                let short = if watch_list.contains(&node.short_name) {
                    format!("★ {}", node.short_name)
                } else {
                    node.short_name.clone()
                };
                table.add_row(vec![
                    Cell::new(&node.id),
                    Cell::new(short),
                    Cell::new(&node.long_name),
                    Cell::new(
                        node.hops_away
                            .map(|h| h.to_string())
                            .unwrap_or_else(|| "N/A".to_string()),
                    ),
                    Cell::new(
                        node.last_heard
                            .map(|h| elapsed_since(h, now))
                            .unwrap_or_else(|| "Never".to_string()),
                    ),
                    Cell::new(
                        node.rssi
                            .map(|r| r.to_string())
                            .unwrap_or_else(|| "N/A".to_string()),
                    ),
                    Cell::new(
                        node.snr
                            .map(|s| format!("{s:.1}"))
                            .unwrap_or_else(|| "N/A".to_string()),
                    ),
                    status_cell(classify_node(node, now, thresholds)),
                ]);
            }

            println!("{table}");

            if !watch_list.is_empty() {
                println!(
                    "{label} {names}",
                    label = "Nodes of interest:".bold(),
                    names = watch_list.names().join(", ")
                );
            }
        }
    }

    session.connection.disconnect().await?;
    Ok(())
}
