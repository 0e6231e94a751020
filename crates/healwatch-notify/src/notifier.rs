//! The `Notifier` seam and the log-only fallback channel.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use tracing::info;

use crate::alert::Alert;

/// Boxed future returned by [`Notifier::send`].
pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to build client: {0}")]
    Client(String),

    #[error("delivery failed: {0}")]
    Transport(String),

    #[error("channel answered HTTP {0}")]
    Status(u16),

    #[error("delivery timed out")]
    Timeout,
}

/// Delivers alerts to an external channel. Swapped out in tests.
pub trait Notifier: Send + Sync {
    fn send<'a>(&'a self, alert: &'a Alert) -> NotifyFuture<'a>;
}

/// Writes alerts to the log only. Used when no webhook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send<'a>(&'a self, alert: &'a Alert) -> NotifyFuture<'a> {
        Box::pin(async move {
            info!(
                service = %alert.service,
                kind = %alert.kind,
                severity = ?alert.severity(),
                detail = %alert.detail,
                "alert"
            );
            Ok(())
        })
    }
}
