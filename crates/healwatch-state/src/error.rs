//! Incident store errors. Callers treat all of them as soft failures.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::IncidentId;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot open incident store: {0}")]
    Open(String),

    #[error("incident store {} is locked by another process", .0.display())]
    Locked(PathBuf),

    #[error("store transaction failed: {0}")]
    Transaction(String),

    #[error("cannot open store table: {0}")]
    Table(String),

    #[error("store read failed: {0}")]
    Read(String),

    #[error("store write failed: {0}")]
    Write(String),

    #[error("cannot encode record: {0}")]
    Serialize(String),

    #[error("corrupt record: {0}")]
    Deserialize(String),

    #[error("no incident with id {0}")]
    NotFound(IncidentId),

    #[error("incident {0} was already closed")]
    AlreadyClosed(IncidentId),
}

impl StateError {
    /// The store itself is unusable, as opposed to a missing or closed record.
    pub fn is_storage_failure(&self) -> bool {
        !matches!(self, StateError::NotFound(_) | StateError::AlreadyClosed(_))
    }
}
