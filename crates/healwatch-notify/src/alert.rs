//! Alert model and its presentation attributes.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// The state-machine transition an alert reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Down,
    Recovered,
    RecoveryFailed,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Down => "down",
            AlertKind::Recovered => "recovered",
            AlertKind::RecoveryFailed => "recovery_failed",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Ok,
    Warning,
    Critical,
}

/// How an alert kind is rendered on the notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presentation {
    pub severity: Severity,
    /// Hex colour used for the attachment bar.
    pub color: &'static str,
    pub emoji: &'static str,
}

pub fn presentation(kind: AlertKind) -> Presentation {
    match kind {
        AlertKind::Down => Presentation {
            severity: Severity::Critical,
            color: "#FF0000",
            emoji: "🚨",
        },
        AlertKind::Recovered => Presentation {
            severity: Severity::Ok,
            color: "#00CC00",
            emoji: "✅",
        },
        AlertKind::RecoveryFailed => Presentation {
            severity: Severity::Warning,
            color: "#FF6600",
            emoji: "⚠️",
        },
    }
}

/// A single notification. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub service: String,
    pub detail: String,
    /// Unix timestamp (seconds) when the alert was raised.
    pub timestamp: u64,
}

impl Alert {
    pub fn new(kind: AlertKind, service: &str, detail: impl Into<String>) -> Self {
        Self {
            kind,
            service: service.to_string(),
            detail: detail.into(),
            timestamp: epoch_secs(),
        }
    }

    /// Service went down; `probe_detail` is the probe diagnostic.
    pub fn down(service: &str, probe_detail: &str) -> Self {
        Self::new(AlertKind::Down, service, format!("Error: {probe_detail}"))
    }

    /// Service came back on its own.
    pub fn recovered(service: &str) -> Self {
        Self::new(
            AlertKind::Recovered,
            service,
            format!("{service} has recovered"),
        )
    }

    /// Service came back after a recovery action.
    pub fn auto_recovered(service: &str) -> Self {
        Self::new(AlertKind::Recovered, service, "Auto-recovery successful")
    }

    pub fn recovery_failed(service: &str) -> Self {
        Self::new(
            AlertKind::RecoveryFailed,
            service,
            "Please investigate manually",
        )
    }

    pub fn severity(&self) -> Severity {
        presentation(self.kind).severity
    }

    /// Title line, e.g. `🚨 nginx: DOWN`.
    pub fn title(&self) -> String {
        let p = presentation(self.kind);
        format!(
            "{} {}: {}",
            p.emoji,
            self.service,
            self.kind.as_str().to_uppercase()
        )
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
