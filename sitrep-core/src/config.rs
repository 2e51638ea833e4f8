use crate::error::ConfigError;
use crate::liveness::Thresholds;
use crate::transmit::{DEFAULT_LINE_DELAY, Transmitter};
use crate::watch::WatchList;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Operator settings for the SITREP engine.
///
/// Station identity is not configured here; it comes from the radio once connected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SitrepConfig {
    /// Call sign for the report header, defaults to the station short name
    pub call_sign: Option<String>,
    /// Short names reported on line 3, in order
    pub nodes_of_interest: Vec<String>,
    /// Channel index for routine reports
    pub report_channel: u32,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub line_delay: Duration,
    pub direct_window_minutes: u64,
    pub hop_threshold: u32,
    /// Broadcast a report at the first opportunity of each UTC day
    pub routine_reports: bool,
    /// Greet nodes the first time a packet from them is seen
    pub welcome_new_nodes: bool,
    /// Channel for operator alerts; none disables them
    pub admin_channel: Option<u32>,
}

impl Default for SitrepConfig {
    fn default() -> Self {
        Self {
            call_sign: None,
            nodes_of_interest: Vec::new(),
            report_channel: 0,
            line_delay: DEFAULT_LINE_DELAY,
            direct_window_minutes: Thresholds::DIRECT.window_minutes,
            hop_threshold: Thresholds::DIRECT.max_hops,
            routine_reports: false,
            welcome_new_nodes: false,
            admin_channel: None,
        }
    }
}

impl SitrepConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Override the line delay from a human readable value such as `5s` or `1500ms`
    pub fn set_line_delay(&mut self, value: &str) -> Result<(), ConfigError> {
        self.line_delay =
            humantime::parse_duration(value).map_err(|source| ConfigError::LineDelay {
                value: value.to_string(),
                source,
            })?;
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds::new(self.direct_window_minutes, self.hop_threshold)
    }

    pub fn watch_list(&self) -> WatchList {
        WatchList::new(self.nodes_of_interest.iter().cloned())
    }

    pub fn transmitter(&self) -> Transmitter {
        Transmitter::new(self.line_delay)
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}
