//! Static per-service configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Probe timeout when a service does not set one.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Recovery timeout when a service does not set one.
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Tick interval when `[scheduler]` does not set one.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Upper bound for a single notification delivery.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Probe diagnostics are cut to this many characters.
pub const MAX_DETAIL_CHARS: usize = 200;

/// How a service is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum ProbeDescriptor {
    /// Shell command run through `sh -c`; exit 0 is healthy.
    Command(String),
    /// HTTP(S) GET; only a 200 response is healthy.
    Http(String),
}

impl ProbeDescriptor {
    /// Interpret a raw descriptor string from the config file.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            ProbeDescriptor::Http(raw.to_string())
        } else {
            ProbeDescriptor::Command(raw.to_string())
        }
    }

    /// The command line or URL this descriptor points at.
    pub fn target(&self) -> &str {
        match self {
            ProbeDescriptor::Command(cmd) => cmd,
            ProbeDescriptor::Http(url) => url,
        }
    }
}

/// A monitored service. Immutable for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    pub probe: ProbeDescriptor,
    /// Recovery command; `None` means the service is only watched.
    pub recovery: Option<String>,
    pub probe_timeout: Duration,
    pub recovery_timeout: Duration,
}

impl ServiceSpec {
    /// A command-probed service with default timeouts and no recovery.
    pub fn new(name: impl Into<String>, probe: &str) -> Self {
        Self {
            name: name.into(),
            probe: ProbeDescriptor::parse(probe),
            recovery: None,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
        }
    }

    pub fn with_recovery(mut self, command: impl Into<String>) -> Self {
        self.recovery = Some(command.into());
        self
    }

    pub fn with_timeouts(mut self, probe: Duration, recovery: Duration) -> Self {
        self.probe_timeout = probe;
        self.recovery_timeout = recovery;
        self
    }

    pub fn has_recovery(&self) -> bool {
        self.recovery.is_some()
    }
}
