use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sitrep_core::SitrepConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "sitrep")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Serial port or TCP address (e.g., /dev/ttyUSB0 or 192.168.1.100:4403)
    #[arg(short, long, global = true, env = "SITREP_PORT")]
    pub port: Option<String>,

    /// Bluetooth device name or MAC address
    #[arg(short = 'b', long, global = true)]
    pub ble: Option<String>,

    /// JSON configuration file
    #[arg(short = 'c', long, global = true, env = "SITREP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Call sign used in the report header (defaults to the radio short name)
    #[arg(long, global = true, env = "SITREP_CALL_SIGN")]
    pub call_sign: Option<String>,

    /// Nodes of interest by short name, comma separated (replaces the config list)
    #[arg(short = 'w', long = "watch", global = true, value_delimiter = ',')]
    pub watch: Vec<String>,

    /// Delay between report lines (e.g., 5s, 1500ms)
    #[arg(long, global = true)]
    pub line_delay: Option<String>,

    /// Output in JSON format
    #[arg(short = 'j', long, global = true)]
    pub json: bool,

    /// Connection timeout in seconds
    #[arg(short = 't', long, global = true, default_value = "30")]
    pub timeout: u64,

    /// Enable debug logging
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Monitor the mesh, answer Ping/Sitrep requests and send routine reports
    Run {
        /// Broadcast a report at the start of every UTC day
        #[arg(long)]
        routine: bool,

        /// Greet nodes the first time they are heard
        #[arg(long)]
        welcome: bool,

        /// Channel index for new-node and watched-node reconnect alerts
        #[arg(long)]
        admin_channel: Option<u32>,
    },

    /// Build a SITREP now and optionally transmit it
    Report {
        /// Transmit the report over the mesh
        #[arg(short, long)]
        send: bool,

        /// Channel index to transmit on
        #[arg(long)]
        channel: Option<u32>,

        /// Destination node (hex id like !a1b2c3d4, or short name); broadcast if omitted
        #[arg(long)]
        dest: Option<String>,
    },

    /// Show connectivity status of every known node
    Nodes,
}

impl Cli {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Config file values with command line overrides applied
    pub fn load_config(&self) -> Result<SitrepConfig> {
        let mut config = match &self.config {
            Some(path) => SitrepConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => SitrepConfig::default(),
        };

        if self.call_sign.is_some() {
            config.call_sign = self.call_sign.clone();
        }
        if !self.watch.is_empty() {
            config.nodes_of_interest = self.watch.clone();
        }
        if let Some(delay) = &self.line_delay {
            config.set_line_delay(delay)?;
        }
        if let Commands::Run {
            routine,
            welcome,
            admin_channel,
        } = self.command
        {
            config.routine_reports |= routine;
            config.welcome_new_nodes |= welcome;
            if admin_channel.is_some() {
                config.admin_channel = admin_channel;
            }
        }

        Ok(config)
    }
}
