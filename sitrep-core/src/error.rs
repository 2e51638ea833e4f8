use std::path::PathBuf;
use thiserror::Error;

/// Problems loading or overriding [`crate::config::SitrepConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config")]
    Json(#[from] serde_json::Error),

    #[error("invalid line delay {value:?}")]
    LineDelay {
        value: String,
        #[source]
        source: humantime::DurationError,
    },
}
