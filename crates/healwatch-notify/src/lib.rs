//! healwatch-notify — alert model and delivery channels.
//!
//! An [`Alert`] is produced by the orchestrator and handed straight to a
//! [`Notifier`]. Delivery is best-effort: a failed send is reported back as
//! a [`NotifyError`] for the caller to log, and never retried here.
//!
//! Presentation (severity, colour, emoji) is a pure function of the
//! [`AlertKind`], see [`presentation`].

pub mod alert;
pub mod notifier;
pub mod webhook;

pub use alert::{presentation, Alert, AlertKind, Presentation, Severity};
pub use notifier::{LogNotifier, Notifier, NotifyError, NotifyFuture};
pub use webhook::WebhookNotifier;
