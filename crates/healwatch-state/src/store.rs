//! StateStore — redb-backed incident and probe-history persistence.
//!
//! All values are JSON-serialized into redb's `&[u8]` value columns. The
//! store supports both on-disk and in-memory backends (the latter for
//! testing).

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// The write side of the incident history, as seen by the orchestrator.
///
/// Every call is one atomic write. Failures are soft: callers log them and
/// keep monitoring.
pub trait IncidentStore: Send + Sync {
    /// Append a new open incident and return its id.
    fn open_incident(
        &self,
        service: &str,
        kind: IncidentType,
        details: &str,
    ) -> StateResult<IncidentId>;

    /// Close an open incident. Closed incidents are never modified again.
    fn close_incident(&self, id: IncidentId, attempts: u32, outcome: bool)
        -> StateResult<Incident>;

    /// Append one probe-history row.
    fn record_check(&self, record: &CheckRecord) -> StateResult<()>;
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        // redb holds an exclusive file lock for as long as the database is open.
        let db = Database::create(path).map_err(|e| match e {
            redb::DatabaseError::DatabaseAlreadyOpen => StateError::Locked(path.to_path_buf()),
            other => StateError::Open(other.to_string()),
        })?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(INCIDENTS).map_err(map_err!(Table))?;
        txn.open_table(CHECKS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Incidents ──────────────────────────────────────────────────

    /// Get an incident by id.
    pub fn get_incident(&self, id: IncidentId) -> StateResult<Option<Incident>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(INCIDENTS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let incident: Incident =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(incident))
            }
            None => Ok(None),
        }
    }

    /// List incidents in id order, optionally for a single service.
    pub fn list_incidents(&self, service: Option<&str>) -> StateResult<Vec<Incident>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(INCIDENTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let incident: Incident =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if service.is_none_or(|name| incident.service_name == name) {
                results.push(incident);
            }
        }
        Ok(results)
    }

    /// List incidents that have not been closed yet.
    pub fn list_open_incidents(&self) -> StateResult<Vec<Incident>> {
        let mut open = self.list_incidents(None)?;
        open.retain(Incident::is_open);
        Ok(open)
    }

    // ── Probe history ──────────────────────────────────────────────

    /// Most recent probe-history rows for a service, newest first.
    pub fn list_checks(&self, service: &str, limit: usize) -> StateResult<Vec<CheckRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CHECKS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))?.rev() {
            if results.len() >= limit {
                break;
            }
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: CheckRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if record.service_name == service {
                results.push(record);
            }
        }
        Ok(results)
    }

    /// Delete probe-history rows older than `cutoff` (unix seconds).
    /// Returns the number of rows removed.
    pub fn prune_checks_before(&self, cutoff: u64) -> StateResult<u64> {
        // Collect keys in a read transaction first.
        let keys: Vec<u64> = {
            let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
            let table = txn.open_table(CHECKS).map_err(map_err!(Table))?;
            let mut keys = Vec::new();
            for entry in table.iter().map_err(map_err!(Read))? {
                let (key, value) = entry.map_err(map_err!(Read))?;
                let record: CheckRecord =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                if record.timestamp < cutoff {
                    keys.push(key.value());
                }
            }
            keys
        };
        if keys.is_empty() {
            return Ok(0);
        }

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(CHECKS).map_err(map_err!(Table))?;
            for key in &keys {
                table.remove(*key).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(removed = keys.len(), cutoff, "probe history pruned");
        Ok(keys.len() as u64)
    }
}

impl IncidentStore for StateStore {
    fn open_incident(
        &self,
        service: &str,
        kind: IncidentType,
        details: &str,
    ) -> StateResult<IncidentId> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let id;
        {
            let mut table = txn.open_table(INCIDENTS).map_err(map_err!(Table))?;
            id = table
                .last()
                .map_err(map_err!(Read))?
                .map(|(key, _)| key.value() + 1)
                .unwrap_or(1);
            let incident = Incident {
                id,
                service_name: service.to_string(),
                incident_type: kind,
                start_time: epoch_secs(),
                end_time: None,
                attempts: 0,
                outcome: None,
                details: details.to_string(),
            };
            let value = serde_json::to_vec(&incident).map_err(map_err!(Serialize))?;
            table
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%service, incident_id = id, kind = kind.as_str(), "incident opened");
        Ok(id)
    }

    fn close_incident(
        &self,
        id: IncidentId,
        attempts: u32,
        outcome: bool,
    ) -> StateResult<Incident> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let incident;
        {
            let mut table = txn.open_table(INCIDENTS).map_err(map_err!(Table))?;
            let bytes = match table.get(id).map_err(map_err!(Read))? {
                Some(guard) => guard.value().to_vec(),
                None => return Err(StateError::NotFound(id)),
            };
            let mut current: Incident =
                serde_json::from_slice(&bytes).map_err(map_err!(Deserialize))?;
            if !current.is_open() {
                return Err(StateError::AlreadyClosed(id));
            }

            current.end_time = Some(epoch_secs());
            current.attempts = attempts;
            current.outcome = Some(outcome);
            let value = serde_json::to_vec(&current).map_err(map_err!(Serialize))?;
            table
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
            incident = current;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(incident_id = id, attempts, outcome, "incident closed");
        Ok(incident)
    }

    fn record_check(&self, record: &CheckRecord) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(CHECKS).map_err(map_err!(Table))?;
            let seq = table
                .last()
                .map_err(map_err!(Read))?
                .map(|(key, _)| key.value() + 1)
                .unwrap_or(1);
            table
                .insert(seq, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }
}

pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
