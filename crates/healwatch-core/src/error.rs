//! Configuration errors. All of them are fatal at startup.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no services configured")]
    NoServices,

    #[error("service name must not be empty")]
    EmptyName,

    #[error("duplicate service name: {0}")]
    DuplicateService(String),

    #[error("service {0}: probe must not be empty")]
    EmptyProbe(String),

    #[error("{field}: invalid duration {value:?}")]
    InvalidDuration { field: String, value: String },

    #[error("{0}: duration must be greater than zero")]
    ZeroDuration(String),

    #[error("notifier webhook_url must be an http(s) URL, got {0:?}")]
    InvalidWebhook(String),
}
