//! healwatch-state — durable incident history for healwatch.
//!
//! Backed by [redb](https://docs.rs/redb). Each incident open/close and each
//! probe-history row is a single write transaction, so a crash mid-write
//! leaves either the old record or the new one, never a torn one.
//!
//! The orchestrator talks to the store through the [`IncidentStore`] trait;
//! [`StateStore`] is the production implementation and is `Clone + Send +
//! Sync` (backed by `Arc<Database>`).

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::{IncidentStore, StateStore};
pub use types::*;
