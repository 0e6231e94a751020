//! Health orchestrator — the per-service state machine.
//!
//! Once per tick, for every service in configuration order:
//!
//! ```text
//! probe ── healthy ──► (was Down: `recovered` alert, close incident) ──► Up
//!   │
//!   └─ unhealthy ──► (was not Down: `down` alert, open incident) ──► Down
//!                      │
//!                      └─ recovery configured ──► run once
//!                            ├─ ok   ──► `recovered` alert, close incident ──► Up
//!                            └─ fail ──► `recovery_failed` alert (stays Down)
//! ```
//!
//! Collaborator failures (store writes, alert delivery) are logged and never
//! leave the tick, and one service never affects another.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use healwatch_core::{ServiceSpec, DEFAULT_NOTIFY_TIMEOUT};
use healwatch_notify::{Alert, Notifier};
use healwatch_state::{CheckRecord, CheckStatus, IncidentId, IncidentStore, IncidentType};

use crate::probe::{ProbeExecutor, ProbeOutcome, Prober};
use crate::recovery::{Recoverer, RecoveryExecutor};

/// Health status of a monitored service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// No probe has completed yet.
    Unknown,
    Up,
    Down,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServiceStatus::Unknown => "unknown",
            ServiceStatus::Up => "up",
            ServiceStatus::Down => "down",
        })
    }
}

/// Mutable per-service state. Only the orchestrator changes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceState {
    pub name: String,
    pub status: ServiceStatus,
    /// Unix timestamp (seconds) of the last status change.
    pub last_transition: u64,
    /// Set while Down once an incident write has succeeded.
    pub open_incident: Option<IncidentId>,
    /// Recovery invocations during the current down period.
    pub attempts: u32,
    pub consecutive_failures: u32,
    pub last_detail: Option<String>,
    /// `attempts` when the open incident was written. The incident only
    /// counts recoveries made after that point.
    #[serde(skip)]
    attempts_at_open: u32,
}

impl ServiceState {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: ServiceStatus::Unknown,
            last_transition: epoch_secs(),
            open_incident: None,
            attempts: 0,
            consecutive_failures: 0,
            last_detail: None,
            attempts_at_open: 0,
        }
    }

    fn set_status(&mut self, status: ServiceStatus) {
        if self.status != status {
            debug!(service = %self.name, from = %self.status, to = %status, "status transition");
            self.status = status;
            self.last_transition = epoch_secs();
        }
    }
}

/// Tunables for [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Re-probe after a successful recovery before declaring the service up.
    pub verify_recovery: bool,
    /// Append every probe result to the store's history.
    pub record_checks: bool,
    /// Upper bound on a single alert delivery.
    pub notify_timeout: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            verify_recovery: false,
            record_checks: true,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }
}

/// Counters for one tick, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub up: usize,
    pub down: usize,
    pub recoveries: usize,
    pub alerts: usize,
}

/// Collaborators shared by every service step.
struct Deps {
    prober: Arc<dyn Prober>,
    recoverer: Arc<dyn Recoverer>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn IncidentStore>,
    options: OrchestratorOptions,
}

/// Owns the service table and drives the state machine.
pub struct Orchestrator {
    services: Vec<ServiceSpec>,
    states: HashMap<String, ServiceState>,
    deps: Deps,
}

impl Orchestrator {
    /// Create an orchestrator with the default probe and recovery executors.
    pub fn new(
        services: Vec<ServiceSpec>,
        store: Arc<dyn IncidentStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let states = services
            .iter()
            .map(|spec| (spec.name.clone(), ServiceState::new(&spec.name)))
            .collect();
        Self {
            services,
            states,
            deps: Deps {
                prober: Arc::new(ProbeExecutor),
                recoverer: Arc::new(RecoveryExecutor),
                notifier,
                store,
                options: OrchestratorOptions::default(),
            },
        }
    }

    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.deps.prober = prober;
        self
    }

    pub fn with_recoverer(mut self, recoverer: Arc<dyn Recoverer>) -> Self {
        self.deps.recoverer = recoverer;
        self
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.deps.options = options;
        self
    }

    pub fn services(&self) -> &[ServiceSpec] {
        &self.services
    }

    /// Current state of one service.
    pub fn state(&self, service: &str) -> Option<&ServiceState> {
        self.states.get(service)
    }

    /// Copy of every service state, in configuration order.
    pub fn snapshot(&self) -> Vec<ServiceState> {
        self.services
            .iter()
            .filter_map(|spec| self.states.get(&spec.name).cloned())
            .collect()
    }

    /// Run one probe/update/recover pass over every service, sequentially.
    pub async fn tick(&mut self) -> TickSummary {
        let mut summary = TickSummary::default();
        for spec in &self.services {
            let state = self
                .states
                .entry(spec.name.clone())
                .or_insert_with(|| ServiceState::new(&spec.name));
            self.deps.step(spec, state, &mut summary).await;
            match state.status {
                ServiceStatus::Up => summary.up += 1,
                ServiceStatus::Down => summary.down += 1,
                ServiceStatus::Unknown => {}
            }
        }
        debug!(
            up = summary.up,
            down = summary.down,
            recoveries = summary.recoveries,
            alerts = summary.alerts,
            "tick complete"
        );
        summary
    }
}

impl Deps {
    async fn step(&self, spec: &ServiceSpec, state: &mut ServiceState, summary: &mut TickSummary) {
        let outcome = self.prober.probe(spec).await;
        self.record_check(spec, &outcome);
        state.last_detail = Some(outcome.detail.clone());

        if outcome.healthy {
            state.consecutive_failures = 0;
            if state.status == ServiceStatus::Down {
                info!(service = %spec.name, attempts = state.attempts, "service is up again");
                self.alert(Alert::recovered(&spec.name), summary).await;
                self.close_incident(spec, state);
            }
            state.set_status(ServiceStatus::Up);
            return;
        }

        state.consecutive_failures += 1;
        if state.status != ServiceStatus::Down {
            error!(service = %spec.name, detail = %outcome.detail, "service is down");
            self.alert(Alert::down(&spec.name, &outcome.detail), summary)
                .await;
            state.set_status(ServiceStatus::Down);
            state.attempts = 0;
            self.open_incident(spec, state, &outcome.detail);
        } else {
            debug!(
                service = %spec.name,
                failures = state.consecutive_failures,
                detail = %outcome.detail,
                "service still down"
            );
            if state.open_incident.is_none() {
                self.open_incident(spec, state, &outcome.detail);
            }
        }

        if !spec.has_recovery() {
            return;
        }

        state.attempts += 1;
        info!(service = %spec.name, attempt = state.attempts, "attempting recovery");
        let mut recovered = self.recoverer.recover(spec).await;

        if recovered && self.options.verify_recovery {
            let check = self.prober.probe(spec).await;
            self.record_check(spec, &check);
            if !check.healthy {
                warn!(
                    service = %spec.name,
                    detail = %check.detail,
                    "recovery action succeeded but service is still unhealthy"
                );
                state.last_detail = Some(check.detail);
                recovered = false;
            }
        }

        if recovered {
            summary.recoveries += 1;
            info!(service = %spec.name, attempts = state.attempts, "auto-recovery successful");
            self.alert(Alert::auto_recovered(&spec.name), summary).await;
            self.close_incident(spec, state);
            state.consecutive_failures = 0;
            state.set_status(ServiceStatus::Up);
        } else {
            warn!(service = %spec.name, attempt = state.attempts, "recovery failed");
            self.alert(Alert::recovery_failed(&spec.name), summary)
                .await;
        }
    }

    /// Deliver an alert within the notify timeout. Failures are only logged.
    async fn alert(&self, alert: Alert, summary: &mut TickSummary) {
        summary.alerts += 1;
        match tokio::time::timeout(self.options.notify_timeout, self.notifier.send(&alert)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(service = %alert.service, kind = %alert.kind, error = %e, "alert delivery failed");
            }
            Err(_) => {
                warn!(
                    service = %alert.service,
                    kind = %alert.kind,
                    timeout_ms = self.options.notify_timeout.as_millis() as u64,
                    "alert delivery timed out"
                );
            }
        }
    }

    fn open_incident(&self, spec: &ServiceSpec, state: &mut ServiceState, detail: &str) {
        match self
            .store
            .open_incident(&spec.name, IncidentType::ServiceFailure, detail)
        {
            Ok(id) => {
                info!(service = %spec.name, incident_id = id, "incident opened");
                state.open_incident = Some(id);
                state.attempts_at_open = state.attempts;
            }
            Err(e) => {
                error!(service = %spec.name, error = %e, "failed to record incident");
            }
        }
    }

    /// Close the open incident (if any) as recovered and reset the period.
    fn close_incident(&self, spec: &ServiceSpec, state: &mut ServiceState) {
        if let Some(id) = state.open_incident.take() {
            let attempts = state.attempts.saturating_sub(state.attempts_at_open);
            match self.store.close_incident(id, attempts, true) {
                Ok(_) => {
                    info!(service = %spec.name, incident_id = id, attempts, "incident closed");
                }
                Err(e) if e.is_storage_failure() => {
                    error!(service = %spec.name, incident_id = id, error = %e, "failed to close incident");
                }
                Err(e) => {
                    warn!(service = %spec.name, incident_id = id, error = %e, "incident not closed");
                }
            }
        }
        state.attempts = 0;
        state.attempts_at_open = 0;
    }

    fn record_check(&self, spec: &ServiceSpec, outcome: &ProbeOutcome) {
        if !self.options.record_checks {
            return;
        }
        let record = CheckRecord {
            service_name: spec.name.clone(),
            status: if outcome.healthy {
                CheckStatus::Up
            } else {
                CheckStatus::Down
            },
            response_time_ms: outcome.latency.as_millis() as u64,
            error_message: (!outcome.healthy).then(|| outcome.detail.clone()),
            timestamp: epoch_secs(),
        };
        if let Err(e) = self.store.record_check(&record) {
            warn!(service = %spec.name, error = %e, "failed to record probe history");
        }
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use healwatch_notify::LogNotifier;
    use healwatch_state::StateStore;

    fn orchestrator(services: Vec<ServiceSpec>) -> (Orchestrator, StateStore) {
        let store = StateStore::open_in_memory().unwrap();
        let orch = Orchestrator::new(services, Arc::new(store.clone()), Arc::new(LogNotifier));
        (orch, store)
    }

    #[test]
    fn states_start_unknown() {
        let (orch, _) = orchestrator(vec![
            ServiceSpec::new("a", "true"),
            ServiceSpec::new("b", "false"),
        ]);
        let snapshot = orch.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].name, "a");
        assert!(snapshot.iter().all(|s| s.status == ServiceStatus::Unknown));
        assert!(orch.state("missing").is_none());
    }

    #[tokio::test]
    async fn real_commands_drive_transitions() {
        let (mut orch, store) = orchestrator(vec![
            ServiceSpec::new("ok", "true"),
            ServiceSpec::new("broken", "echo refused >&2; exit 1"),
        ]);

        let summary = orch.tick().await;
        assert_eq!(summary.up, 1);
        assert_eq!(summary.down, 1);
        assert_eq!(summary.alerts, 1);

        let broken = orch.state("broken").unwrap();
        assert_eq!(broken.status, ServiceStatus::Down);
        assert_eq!(broken.last_detail.as_deref(), Some("refused"));
        let id = broken.open_incident.unwrap();
        assert_eq!(store.get_incident(id).unwrap().unwrap().details, "refused");

        // History holds one row per probe.
        assert_eq!(store.list_checks("ok", 10).unwrap().len(), 1);
        assert_eq!(store.list_checks("broken", 10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn record_checks_can_be_disabled() {
        let (orch, store) = orchestrator(vec![ServiceSpec::new("ok", "true")]);
        let mut orch = orch.with_options(OrchestratorOptions {
            record_checks: false,
            ..OrchestratorOptions::default()
        });
        orch.tick().await;
        assert!(store.list_checks("ok", 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn real_recovery_command_brings_service_up() {
        let spec = ServiceSpec::new("flaky", "exit 1").with_recovery("true");
        let (mut orch, store) = orchestrator(vec![spec]);

        let summary = orch.tick().await;
        assert_eq!(summary.recoveries, 1);
        // down + recovered
        assert_eq!(summary.alerts, 2);

        let state = orch.state("flaky").unwrap();
        assert_eq!(state.status, ServiceStatus::Up);
        assert!(state.open_incident.is_none());

        let incidents = store.list_incidents(Some("flaky")).unwrap();
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].attempts, 1);
        assert_eq!(incidents[0].outcome, Some(true));
    }

    #[test]
    fn status_display() {
        assert_eq!(ServiceStatus::Unknown.to_string(), "unknown");
        assert_eq!(ServiceStatus::Down.to_string(), "down");
    }
}
