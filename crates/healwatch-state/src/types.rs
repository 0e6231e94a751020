//! Persisted record types.

use serde::{Deserialize, Serialize};

/// Identifier of an incident row.
pub type IncidentId = u64;

/// Category of an incident. Only service failures are recorded today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentType {
    ServiceFailure,
}

impl IncidentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentType::ServiceFailure => "service_failure",
        }
    }
}

/// One continuous period during which a service was down.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Incident {
    pub id: IncidentId,
    pub service_name: String,
    pub incident_type: IncidentType,
    /// Unix timestamp (seconds) when the incident was opened.
    pub start_time: u64,
    /// Unix timestamp (seconds) when the incident was closed.
    pub end_time: Option<u64>,
    /// Recovery actions invoked while the incident was open.
    pub attempts: u32,
    /// Whether the service came back. `None` while open.
    pub outcome: Option<bool>,
    /// Probe diagnostic captured at open.
    pub details: String,
}

impl Incident {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Result of a single probe, kept as history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Up,
    Down,
}

/// One row of probe history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckRecord {
    pub service_name: String,
    pub status: CheckStatus,
    pub response_time_ms: u64,
    /// Probe diagnostic when the check failed.
    pub error_message: Option<String>,
    /// Unix timestamp (seconds) of the check.
    pub timestamp: u64,
}
