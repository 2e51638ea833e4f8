mod nodes;
mod report;
mod run;

use anyhow::{Context, Result};
use sitrep_core::{ConnectionManager, SitrepConfig, Station, TrafficCounters};
use std::sync::Arc;

use crate::cli::{Cli, Commands};
use crate::output::OutputFormat;
use crate::utils::print_info;

/// Everything a subcommand needs once the radio is up
pub struct Session {
    pub connection: ConnectionManager,
    pub config: SitrepConfig,
    pub station: Station,
    pub format: OutputFormat,
}

pub async fn handle_command(cli: Cli) -> Result<()> {
    let format = OutputFormat::from_flag(cli.json);
    let config = cli.load_config()?;

    let counters = Arc::new(TrafficCounters::new());
    let mut connection = ConnectionManager::new(
        cli.port.clone(),
        cli.ble.clone(),
        cli.timeout_duration(),
        counters,
    )
    .await?;

    connection.connect().await?;

    let station = connection
        .wait_for_station()
        .await
        .context("Radio did not report its own node")?
        .with_call_sign(config.call_sign.clone());
    if format == OutputFormat::Table {
        print_info(&format!(
            "Station {short} ({long}), call sign {call}",
            short = station.short_name,
            long = station.long_name,
            call = station.call_sign
        ));
    }

    let session = Session {
        connection,
        config,
        station,
        format,
    };

    match cli.command {
        Commands::Run { .. } => run::handle_run(session).await,
        Commands::Report {
            send,
            channel,
            dest,
        } => report::handle_report(session, send, channel, dest).await,
        Commands::Nodes => nodes::handle_nodes(session).await,
    }
}
