//! One-shot subcommands: `check-config`, `init`, `incidents`, `probe`.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Context};
use tracing::info;

use healwatch_core::{HealwatchConfig, ProbeDescriptor, ServiceSpec};
use healwatch_health::{ProbeExecutor, Prober};
use healwatch_state::{StateError, StateStore};

use crate::monitor::load_settings;

pub fn check_config(path: &Path) -> anyhow::Result<()> {
    let settings = load_settings(path)?;
    println!(
        "{} OK: {} service(s), interval {:?}, verify_recovery {}, store {}",
        path.display(),
        settings.services.len(),
        settings.interval,
        settings.verify_recovery,
        settings.store_path.display(),
    );
    print!("{}", service_table(&settings.services));
    Ok(())
}

/// Render the service table printed by `check-config`.
pub fn service_table(services: &[ServiceSpec]) -> String {
    let mut out = format!(
        "{:<20} {:<8} {:<10} {:<10} {}\n",
        "SERVICE", "PROBE", "TIMEOUT", "RECOVERY", "TARGET"
    );
    for spec in services {
        let kind = match spec.probe {
            ProbeDescriptor::Command(_) => "command",
            ProbeDescriptor::Http(_) => "http",
        };
        let recovery = if spec.has_recovery() {
            format!("{:?}", spec.recovery_timeout)
        } else {
            "-".to_string()
        };
        let _ = writeln!(
            out,
            "{:<20} {:<8} {:<10} {:<10} {}",
            spec.name,
            kind,
            format!("{:?}", spec.probe_timeout),
            recovery,
            spec.probe.target()
        );
    }
    out
}

pub fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let body = HealwatchConfig::scaffold()
        .to_toml_string()
        .context("serializing starter config")?;
    std::fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "starter config written");
    Ok(())
}

pub fn incidents(path: &Path, service: Option<&str>, open_only: bool) -> anyhow::Result<()> {
    let settings = load_settings(path)?;
    let store = match StateStore::open(&settings.store_path) {
        Ok(store) => store,
        Err(StateError::Locked(db)) => bail!(
            "{} is in use by a running healwatchd; stop the daemon or point --config at a copy of the store",
            db.display()
        ),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("opening store at {}", settings.store_path.display()));
        }
    };
    for line in incident_lines(&store, service, open_only)? {
        println!("{line}");
    }
    Ok(())
}

/// One JSON document per incident, oldest first.
pub fn incident_lines(
    store: &StateStore,
    service: Option<&str>,
    open_only: bool,
) -> anyhow::Result<Vec<String>> {
    let mut incidents = store.list_incidents(service)?;
    if open_only {
        incidents.retain(|i| i.is_open());
    }
    incidents
        .iter()
        .map(|i| serde_json::to_string(i).context("serializing incident"))
        .collect()
}

pub async fn probe(path: &Path, name: &str) -> anyhow::Result<()> {
    let settings = load_settings(path)?;
    let Some(spec) = settings.services.iter().find(|s| s.name == name) else {
        bail!("no service named {name:?} in {}", path.display());
    };

    let outcome = ProbeExecutor.probe(spec).await;
    println!(
        "{}: {} in {} ms ({})",
        spec.name,
        if outcome.healthy { "UP" } else { "DOWN" },
        outcome.latency.as_millis(),
        outcome.detail
    );
    if !outcome.healthy {
        bail!("{} is unhealthy", spec.name);
    }
    Ok(())
}
