//! Scripted collaborators for orchestrator tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use healwatch_core::ServiceSpec;
use healwatch_health::{
    Orchestrator, OrchestratorOptions, ProbeFuture, ProbeOutcome, Prober, Recoverer,
    RecoveryFuture,
};
use healwatch_notify::{Alert, AlertKind, Notifier, NotifyError, NotifyFuture};
use healwatch_state::{
    CheckRecord, Incident, IncidentId, IncidentStore, IncidentType, StateError, StateResult,
    StateStore,
};

/// Replays queued outcomes per service; healthy once the queue is empty.
#[derive(Default)]
pub struct ScriptedProber {
    queue: Mutex<HashMap<String, VecDeque<ProbeOutcome>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedProber {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_fail(&self, service: &str, detail: &str) {
        self.push(service, ProbeOutcome::unhealthy(detail, Duration::from_millis(3)));
    }

    pub fn push_ok(&self, service: &str) {
        self.push(service, ProbeOutcome::healthy(Duration::from_millis(1)));
    }

    fn push(&self, service: &str, outcome: ProbeOutcome) {
        self.queue
            .lock()
            .unwrap()
            .entry(service.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn calls(&self, service: &str) -> usize {
        self.calls.lock().unwrap().get(service).copied().unwrap_or(0)
    }
}

impl Prober for ScriptedProber {
    fn probe<'a>(&'a self, spec: &'a ServiceSpec) -> ProbeFuture<'a> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(spec.name.clone())
            .or_default() += 1;
        let next = self
            .queue
            .lock()
            .unwrap()
            .get_mut(&spec.name)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| ProbeOutcome::healthy(Duration::from_millis(1)));
        Box::pin(async move { next })
    }
}

/// Replays queued results per service; fails once the queue is empty.
#[derive(Default)]
pub struct ScriptedRecoverer {
    queue: Mutex<HashMap<String, VecDeque<bool>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedRecoverer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, service: &str, success: bool) {
        self.queue
            .lock()
            .unwrap()
            .entry(service.to_string())
            .or_default()
            .push_back(success);
    }

    pub fn calls(&self, service: &str) -> usize {
        self.calls.lock().unwrap().get(service).copied().unwrap_or(0)
    }
}

impl Recoverer for ScriptedRecoverer {
    fn recover<'a>(&'a self, spec: &'a ServiceSpec) -> RecoveryFuture<'a> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(spec.name.clone())
            .or_default() += 1;
        let next = self
            .queue
            .lock()
            .unwrap()
            .get_mut(&spec.name)
            .and_then(VecDeque::pop_front)
            .unwrap_or(false);
        Box::pin(async move { next })
    }
}

/// How the recording notifier misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifierMode {
    #[default]
    Deliver,
    Fail,
    Hang,
}

/// Records every delivered alert.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Alert>>,
    attempts: AtomicUsize,
    mode: Mutex<NotifierMode>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_mode(&self, mode: NotifierMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn sent(&self) -> Vec<Alert> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, service: &str, kind: AlertKind) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.service == service && a.kind == kind)
            .count()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Notifier for RecordingNotifier {
    fn send<'a>(&'a self, alert: &'a Alert) -> NotifyFuture<'a> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let mode = *self.mode.lock().unwrap();
        Box::pin(async move {
            match mode {
                NotifierMode::Deliver => {
                    self.sent.lock().unwrap().push(alert.clone());
                    Ok(())
                }
                NotifierMode::Fail => Err(NotifyError::Status(503)),
                NotifierMode::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    self.sent.lock().unwrap().push(alert.clone());
                    Ok(())
                }
            }
        })
    }
}

/// In-memory store whose writes can be switched to fail.
pub struct FlakyStore {
    pub inner: StateStore,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: StateStore::open_in_memory().unwrap(),
            fail_writes: AtomicBool::new(false),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> StateResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StateError::Write("disk full".to_string()))
        } else {
            Ok(())
        }
    }

    pub fn incidents(&self, service: &str) -> Vec<Incident> {
        self.inner.list_incidents(Some(service)).unwrap()
    }
}

impl IncidentStore for FlakyStore {
    fn open_incident(
        &self,
        service: &str,
        kind: IncidentType,
        details: &str,
    ) -> StateResult<IncidentId> {
        self.check()?;
        self.inner.open_incident(service, kind, details)
    }

    fn close_incident(&self, id: IncidentId, attempts: u32, outcome: bool) -> StateResult<Incident> {
        self.check()?;
        self.inner.close_incident(id, attempts, outcome)
    }

    fn record_check(&self, record: &CheckRecord) -> StateResult<()> {
        self.check()?;
        self.inner.record_check(record)
    }
}

/// Everything a scenario needs, wired together.
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub prober: Arc<ScriptedProber>,
    pub recoverer: Arc<ScriptedRecoverer>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<FlakyStore>,
}

impl Harness {
    pub fn new(services: Vec<ServiceSpec>) -> Self {
        Self::with_options(services, OrchestratorOptions::default())
    }

    pub fn with_options(services: Vec<ServiceSpec>, options: OrchestratorOptions) -> Self {
        let prober = ScriptedProber::new();
        let recoverer = ScriptedRecoverer::new();
        let notifier = RecordingNotifier::new();
        let store = FlakyStore::new();
        let orchestrator = Orchestrator::new(services, store.clone(), notifier.clone())
            .with_prober(prober.clone())
            .with_recoverer(recoverer.clone())
            .with_options(options);
        Self {
            orchestrator,
            prober,
            recoverer,
            notifier,
            store,
        }
    }
}
