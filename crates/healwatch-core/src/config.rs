//! healwatch.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::duration::parse_duration;
use crate::error::ConfigError;
use crate::service::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealwatchConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default, rename = "service")]
    pub services: Vec<ServiceConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub interval: Option<String>,
    pub verify_recovery: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
    pub record_checks: Option<bool>,
    /// Probe history older than this is pruned at startup.
    pub history_retention: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub webhook_url: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub probe: String,
    pub recovery: Option<String>,
    pub probe_timeout: Option<String>,
    pub recovery_timeout: Option<String>,
}

/// Fully validated runtime settings derived from a [`HealwatchConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub verify_recovery: bool,
    pub store_path: PathBuf,
    pub record_checks: bool,
    /// `None` keeps probe history forever.
    pub history_retention: Option<Duration>,
    pub webhook_url: Option<String>,
    pub notify_timeout: Duration,
    pub services: Vec<ServiceSpec>,
}

impl HealwatchConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Validate everything and resolve defaults.
    pub fn resolve(&self) -> Result<MonitorSettings, ConfigError> {
        let interval = duration_field(
            "scheduler.interval",
            self.scheduler.interval.as_deref(),
            DEFAULT_TICK_INTERVAL,
        )?;
        let notify_timeout = duration_field(
            "notifier.timeout",
            self.notifier.timeout.as_deref(),
            DEFAULT_NOTIFY_TIMEOUT,
        )?;

        let history_retention = self
            .store
            .history_retention
            .as_deref()
            .map(|raw| duration_field("store.history_retention", Some(raw), Duration::ZERO))
            .transpose()?;

        let webhook_url = match self.notifier.webhook_url.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                Some(url.to_string())
            }
            Some(url) => return Err(ConfigError::InvalidWebhook(url.to_string())),
        };

        Ok(MonitorSettings {
            interval,
            verify_recovery: self.scheduler.verify_recovery.unwrap_or(false),
            store_path: self
                .store
                .path
                .clone()
                .unwrap_or_else(|| PathBuf::from("healwatch.redb")),
            record_checks: self.store.record_checks.unwrap_or(true),
            history_retention,
            webhook_url,
            notify_timeout,
            services: self.service_specs()?,
        })
    }

    /// Build the service table, rejecting empty, duplicate, or unusable entries.
    pub fn service_specs(&self) -> Result<Vec<ServiceSpec>, ConfigError> {
        if self.services.is_empty() {
            return Err(ConfigError::NoServices);
        }

        let mut seen = HashSet::new();
        let mut specs = Vec::with_capacity(self.services.len());
        for svc in &self.services {
            let name = svc.name.trim();
            if name.is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if !seen.insert(name.to_string()) {
                return Err(ConfigError::DuplicateService(name.to_string()));
            }
            if svc.probe.trim().is_empty() {
                return Err(ConfigError::EmptyProbe(name.to_string()));
            }

            let probe_timeout = duration_field(
                &format!("service.{name}.probe_timeout"),
                svc.probe_timeout.as_deref(),
                DEFAULT_PROBE_TIMEOUT,
            )?;
            let recovery_timeout = duration_field(
                &format!("service.{name}.recovery_timeout"),
                svc.recovery_timeout.as_deref(),
                DEFAULT_RECOVERY_TIMEOUT,
            )?;
            let recovery = svc
                .recovery
                .as_deref()
                .map(str::trim)
                .filter(|cmd| !cmd.is_empty())
                .map(str::to_string);

            specs.push(ServiceSpec {
                name: name.to_string(),
                probe: ProbeDescriptor::parse(&svc.probe),
                recovery,
                probe_timeout,
                recovery_timeout,
            });
        }
        Ok(specs)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// A starter config watching a single local HTTP endpoint.
    pub fn scaffold() -> Self {
        HealwatchConfig {
            scheduler: SchedulerConfig {
                interval: Some("30s".to_string()),
                verify_recovery: Some(false),
            },
            store: StoreConfig {
                path: Some(PathBuf::from("healwatch.redb")),
                record_checks: Some(true),
                history_retention: Some("7d".to_string()),
            },
            notifier: NotifierConfig {
                webhook_url: None,
                timeout: Some("5s".to_string()),
            },
            services: vec![ServiceConfig {
                name: "application".to_string(),
                probe: "http://localhost:8000/health".to_string(),
                recovery: Some("systemctl restart application".to_string()),
                probe_timeout: Some("5s".to_string()),
                recovery_timeout: Some("10s".to_string()),
            }],
        }
    }
}

fn duration_field(
    field: &str,
    raw: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let parsed = parse_duration(raw).ok_or_else(|| ConfigError::InvalidDuration {
        field: field.to_string(),
        value: raw.to_string(),
    })?;
    if parsed.is_zero() {
        return Err(ConfigError::ZeroDuration(field.to_string()));
    }
    Ok(parsed)
}
