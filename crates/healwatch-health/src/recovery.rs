//! Recovery actions.
//!
//! One invocation per call and no retries; the orchestrator decides when to
//! try again.

use std::future::Future;
use std::pin::Pin;

use tracing::{debug, error, info};

use healwatch_core::ServiceSpec;

use crate::exec::{run_shell, CommandOutcome, Output};
use crate::probe::truncate_detail;

/// Boxed future returned by [`Recoverer::recover`].
pub type RecoveryFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// Runs a service's recovery action. Swapped out in tests.
pub trait Recoverer: Send + Sync {
    /// Returns `true` only if the action reported success in time.
    fn recover<'a>(&'a self, spec: &'a ServiceSpec) -> RecoveryFuture<'a>;
}

/// Production recoverer: runs the configured command through `sh -c`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecoveryExecutor;

impl Recoverer for RecoveryExecutor {
    fn recover<'a>(&'a self, spec: &'a ServiceSpec) -> RecoveryFuture<'a> {
        Box::pin(async move {
            let Some(command) = spec.recovery.as_deref() else {
                debug!(service = %spec.name, "no recovery action configured");
                return false;
            };

            info!(service = %spec.name, %command, "running recovery action");
            // Output is discarded: a service started in the background keeps
            // the streams it inherited long after this call returns.
            let outcome = run_shell(command, spec.recovery_timeout, Output::Discard).await;
            match &outcome {
                CommandOutcome::Exited { success: true, .. } => {
                    info!(service = %spec.name, "recovery action succeeded");
                    true
                }
                CommandOutcome::TimedOut => {
                    error!(
                        service = %spec.name,
                        timeout_ms = spec.recovery_timeout.as_millis() as u64,
                        "recovery action timed out"
                    );
                    false
                }
                _ => {
                    error!(
                        service = %spec.name,
                        detail = %truncate_detail(&outcome.diagnostic()),
                        "recovery action failed"
                    );
                    false
                }
            }
        })
    }
}
