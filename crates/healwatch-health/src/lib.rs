//! healwatch-health — probing, recovery, and the per-service state machine.
//!
//! # Architecture
//!
//! ```text
//! Scheduler (fixed interval, skip on overrun, stops between ticks)
//!   └── Orchestrator::tick()
//!         └── for each service, in order
//!               ├── Prober      → ProbeOutcome { healthy, detail, latency }
//!               ├── ServiceState (Unknown / Up / Down, attempts, incident id)
//!               ├── Recoverer   → bool            (only while Down)
//!               ├── Notifier    → down / recovered / recovery_failed
//!               └── IncidentStore → open / close incident, probe history
//! ```
//!
//! A `down` alert is sent once per continuous unhealthy period. Store and
//! notifier failures are logged and never abort a tick.

mod exec;
pub mod orchestrator;
pub mod probe;
pub mod recovery;
pub mod scheduler;

pub use orchestrator::{Orchestrator, OrchestratorOptions, ServiceState, ServiceStatus, TickSummary};
pub use probe::{ProbeExecutor, ProbeFuture, ProbeOutcome, Prober};
pub use recovery::{Recoverer, RecoveryExecutor, RecoveryFuture};
pub use scheduler::Scheduler;
