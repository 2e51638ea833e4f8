use anyhow::{Context, Result};
use chrono::Utc;
use colored::*;
use serde::Serialize;
use sitrep_core::engine::labels;
use sitrep_core::time::format_uptime;
use sitrep_core::{
    Destination, Engine, Observation, PacketEvent, ReportBuilder, RoutineSchedule,
};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::Session;
use crate::output::{OutputFormat, print_json};
use crate::utils::{print_info, print_success};

/// How often the monitor checks the day rollover and link health
const TICK_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct EventRecord<'a> {
    sender: &'a str,
    event: &'a PacketEvent,
    observation: Observation,
}

pub async fn handle_run(session: Session) -> Result<()> {
    let Session {
        mut connection,
        config,
        station,
        format,
    } = session;

    let counters = connection.counters();
    let builder = ReportBuilder::new(station.clone(), config.watch_list(), counters.clone())
        .with_thresholds(config.thresholds());
    let engine = Engine::new(builder, config.transmitter())
        .with_welcome(config.welcome_new_nodes)
        .with_admin_channel(config.admin_channel);

    let mut events = connection.take_events()?;
    let link_state = connection.link_state_ref();
    // Nodes the radio already knows about are not new
    engine.seed_known(&link_state.lock().await.nodes);
    let mut schedule = RoutineSchedule::starting_at(Utc::now());
    let mut tick = tokio::time::interval(TICK_INTERVAL);
    let started = Instant::now();

    print_success(&format!(
        "SITREP monitor running as {call}; watching {watched} node(s). Press Ctrl+C to stop.",
        call = station.call_sign,
        watched = engine.builder().watch_list().len()
    ));

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    warn!("Packet event stream closed");
                    break;
                };
                let table = link_state.lock().await.nodes.clone();
                let (observation, actions) = engine.handle(&table, &event);

                let sender = table.short_name_of(event.from);
                match format {
                    OutputFormat::Json => print_json(&EventRecord {
                        sender,
                        event: &event,
                        observation,
                    })?,
                    OutputFormat::Table => {
                        if let Some(text) = &event.text {
                            let marker = if observation.from_watched { "★ " } else { "" };
                            println!(
                                "{time} {marker}{sender} → {text}",
                                time = Utc::now().format("%H:%M:%SZ").to_string().dimmed(),
                                sender = sender.yellow().bold()
                            );
                        }
                    }
                }

                engine.execute(&mut connection, &table, actions, Utc::now()).await;
            }

            _ = tick.tick() => {
                if !connection.is_processing() {
                    warn!("Radio link lost, reconnecting");
                    if let Err(e) = connection.connect().await {
                        warn!("Reconnect failed: {e:#}");
                        continue;
                    }
                    info!(
                        "Reconnected ({count} connections so far)",
                        count = counters.snapshot().reconnections
                    );
                }

                let now = Utc::now();
                if config.routine_reports && let Some(stamp) = schedule.due(now) {
                    let table = link_state.lock().await.nodes.clone();
                    let report = engine.builder().build_at(&table, now, stamp);
                    let outcome = engine
                        .deliver(
                            &mut connection,
                            &report,
                            config.report_channel,
                            Destination::Broadcast,
                            labels::SITREP_ROUTINE,
                        )
                        .await;
                    info!(
                        "Routine SITREP {stamp} sent {sent} line(s), {failed} failed",
                        stamp = report.timestamp_zulu,
                        sent = outcome.sent,
                        failed = outcome.failures.len()
                    );
                }

                debug!("Uptime: {}", format_uptime(started.elapsed().as_secs()));
            }

            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                break;
            }
        }
    }

    let snapshot = counters.snapshot();
    match format {
        OutputFormat::Json => print_json(&snapshot)?,
        OutputFormat::Table => print_info(&format!(
            "Shutting down after {uptime}: {packets} packets received, {messages} messages sent, {reconnects} connection(s)",
            uptime = format_uptime(started.elapsed().as_secs()),
            packets = snapshot.total_packets(),
            messages = snapshot.total_messages(),
            reconnects = snapshot.reconnections
        )),
    }

    connection.disconnect().await?;
    Ok(())
}
