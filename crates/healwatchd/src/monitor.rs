//! `healwatchd run` — wire the subsystems together and monitor until stopped.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};

use healwatch_core::{HealwatchConfig, MonitorSettings};
use healwatch_health::{Orchestrator, OrchestratorOptions, Scheduler};
use healwatch_notify::{LogNotifier, Notifier, WebhookNotifier};
use healwatch_state::StateStore;

/// Load and validate the config file. Every problem here is fatal.
pub fn load_settings(path: &Path) -> anyhow::Result<MonitorSettings> {
    let config = HealwatchConfig::from_file(path)?;
    let settings = config
        .resolve()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok(settings)
}

/// Open the store, creating its parent directory if needed.
pub fn open_store(settings: &MonitorSettings) -> anyhow::Result<StateStore> {
    if let Some(parent) = settings.store_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let store = StateStore::open(&settings.store_path)
        .with_context(|| format!("opening store at {}", settings.store_path.display()))?;
    info!(path = %settings.store_path.display(), "incident store opened");
    Ok(store)
}

fn build_notifier(settings: &MonitorSettings) -> anyhow::Result<Arc<dyn Notifier>> {
    match &settings.webhook_url {
        Some(url) => {
            let notifier = WebhookNotifier::new(url.as_str(), settings.notify_timeout)
                .context("building webhook client")?;
            info!(timeout_ms = settings.notify_timeout.as_millis() as u64, "webhook notifier enabled");
            Ok(Arc::new(notifier))
        }
        None => {
            info!("no webhook configured, alerts go to the log only");
            Ok(Arc::new(LogNotifier))
        }
    }
}

/// Drop probe history older than the configured retention. Soft failure.
fn prune_history(store: &StateStore, settings: &MonitorSettings) {
    let Some(retention) = settings.history_retention else {
        return;
    };
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let cutoff = now.saturating_sub(retention.as_secs());
    match store.prune_checks_before(cutoff) {
        Ok(0) => {}
        Ok(removed) => info!(removed, cutoff, "pruned probe history"),
        Err(e) => warn!(error = %e, "failed to prune probe history"),
    }
}

pub async fn run(config_path: &Path) -> anyhow::Result<()> {
    info!(config = %config_path.display(), "healwatch daemon starting");

    let settings = load_settings(config_path)?;
    let store = open_store(&settings)?;
    prune_history(&store, &settings);

    match store.list_open_incidents() {
        Ok(open) if !open.is_empty() => {
            warn!(count = open.len(), "incidents left open by a previous run");
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "failed to read open incidents"),
    }

    let notifier = build_notifier(&settings)?;
    let orchestrator = Orchestrator::new(settings.services.clone(), Arc::new(store), notifier)
        .with_options(OrchestratorOptions {
            verify_recovery: settings.verify_recovery,
            record_checks: settings.record_checks,
            notify_timeout: settings.notify_timeout,
        });
    for spec in orchestrator.services() {
        info!(
            service = %spec.name,
            probe = %spec.probe.target(),
            recovery = spec.recovery.as_deref().unwrap_or("-"),
            "monitoring service"
        );
    }

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Scheduler::new(orchestrator, settings.interval);
    let handle = tokio::spawn(scheduler.run(shutdown_rx));

    shutdown_signal().await;
    info!("shutdown signal received, finishing in-flight tick");
    let _ = shutdown_tx.send(true);

    let orchestrator = handle.await.context("scheduler task failed")?;
    for state in orchestrator.snapshot() {
        info!(
            service = %state.name,
            status = %state.status,
            attempts = state.attempts,
            open_incident = ?state.open_incident,
            "final state"
        );
    }

    info!("healwatch daemon stopped");
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
