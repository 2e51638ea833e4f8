use crate::state::BROADCAST_ADDR;
use anyhow::Result;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use tokio::time::{Duration, sleep};
use tracing::{info, warn};

/// Spacing between consecutive report lines on an airtime-limited channel
pub const DEFAULT_LINE_DELAY: Duration = Duration::from_secs(5);

/// Where a text message is addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Destination {
    Broadcast,
    Node(u32),
}

impl Destination {
    pub fn from_node_num(num: u32) -> Self {
        if num == BROADCAST_ADDR {
            Self::Broadcast
        } else {
            Self::Node(num)
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Broadcast => f.write_str("Broadcast"),
            Self::Node(num) => write!(f, "{num:08x}"),
        }
    }
}

/// Send-text primitive of the radio link
pub trait TextSender {
    fn send_text(
        &mut self,
        text: &str,
        channel: u32,
        destination: Destination,
    ) -> impl Future<Output = Result<()>>;
}

/// A line that could not be handed to the radio
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineFailure {
    pub index: usize,
    pub line: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransmitOutcome {
    pub sent: usize,
    pub failures: Vec<LineFailure>,
}

impl TransmitOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sends report lines one at a time with a fixed pause between them
#[derive(Debug, Clone, Copy)]
pub struct Transmitter {
    line_delay: Duration,
}

impl Default for Transmitter {
    fn default() -> Self {
        Self::new(DEFAULT_LINE_DELAY)
    }
}

impl Transmitter {
    pub fn new(line_delay: Duration) -> Self {
        Self { line_delay }
    }

    pub fn line_delay(&self) -> Duration {
        self.line_delay
    }

    /// Send every line in order.
    ///
    /// A failed line is logged and recorded; the remaining lines still go out.
    pub async fn transmit<S, L>(
        &self,
        sender: &mut S,
        lines: &[L],
        channel: u32,
        destination: Destination,
    ) -> TransmitOutcome
    where
        S: TextSender,
        L: AsRef<str>,
    {
        let mut outcome = TransmitOutcome::default();

        for (index, line) in lines.iter().enumerate() {
            if index > 0 {
                sleep(self.line_delay).await;
            }

            let line = line.as_ref();
            info!("SITREP send: {line}");
            match sender.send_text(line, channel, destination).await {
                Ok(()) => outcome.sent += 1,
                Err(e) => {
                    warn!("Failed to send line {index} to {destination}: {e:#}");
                    outcome.failures.push(LineFailure {
                        index,
                        line: line.to_string(),
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        info!(
            "SITREP transmitted to {destination} on channel {channel}: {sent}/{total} lines",
            sent = outcome.sent,
            total = lines.len()
        );
        outcome
    }
}
