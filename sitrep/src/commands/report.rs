use anyhow::Result;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use sitrep_core::engine::labels;
use sitrep_core::{Destination, Engine, ReportBuilder, TextSender};
use tracing::info;

use super::Session;
use crate::output::{OutputFormat, print_json, print_report};
use crate::utils::{print_success, print_warning, resolve_destination, truncate};

/// Advances a progress bar as each line is handed to the radio
struct ProgressSender<'a, S> {
    inner: &'a mut S,
    progress: ProgressBar,
}

impl<S: TextSender> TextSender for ProgressSender<'_, S> {
    async fn send_text(&mut self, text: &str, channel: u32, destination: Destination) -> Result<()> {
        self.progress.set_message(truncate(text, 48));
        let result = self.inner.send_text(text, channel, destination).await;
        self.progress.inc(1);
        result
    }
}

pub async fn handle_report(
    mut session: Session,
    send: bool,
    channel: Option<u32>,
    dest: Option<String>,
) -> Result<()> {
    let builder = ReportBuilder::new(
        session.station.clone(),
        session.config.watch_list(),
        session.connection.counters(),
    )
    .with_thresholds(session.config.thresholds());
    let engine = Engine::new(builder, session.config.transmitter());

    let state = session.connection.link_state().await;
    let report = engine.builder().build(&state.nodes, Utc::now());

    match session.format {
        OutputFormat::Json if !send => print_json(&report)?,
        OutputFormat::Json => {}
        OutputFormat::Table => print_report(&report),
    }

    if send {
        let destination = match dest.as_deref() {
            Some(dest) => resolve_destination(&state.nodes, dest)?,
            None => Destination::Broadcast,
        };
        let channel = channel.unwrap_or(session.config.report_channel);
        let total = report.transmission_lines().len();
        info!("Transmitting SITREP to {destination} on channel {channel}");

        let progress = if session.format == OutputFormat::Table {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut sender = ProgressSender {
            inner: &mut session.connection,
            progress: progress.clone(),
        };
        let outcome = engine
            .deliver(
                &mut sender,
                &report,
                channel,
                destination,
                labels::SITREP_REQUESTED,
            )
            .await;
        progress.finish_and_clear();

        match session.format {
            OutputFormat::Json => print_json(&serde_json::json!({
                "report": report,
                "destination": destination.to_string(),
                "channel": channel,
                "outcome": outcome,
            }))?,
            OutputFormat::Table if outcome.is_complete() => print_success(&format!(
                "SITREP sent to {destination} on channel {channel} ({sent}/{total} lines)",
                sent = outcome.sent
            )),
            OutputFormat::Table => {
                for failure in &outcome.failures {
                    print_warning(&format!(
                        "Line {index} not sent: {error}",
                        index = failure.index + 1,
                        error = failure.error
                    ));
                }
                print_warning(&format!(
                    "SITREP partially sent ({sent}/{total} lines)",
                    sent = outcome.sent
                ));
            }
        }
    }

    session.connection.disconnect().await?;
    Ok(())
}
