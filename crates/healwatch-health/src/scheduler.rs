//! Scheduler loop — drives orchestrator ticks at a fixed interval.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::orchestrator::Orchestrator;

/// Owns the orchestrator for the lifetime of the monitoring loop.
pub struct Scheduler {
    orchestrator: Orchestrator,
    interval: Duration,
}

impl Scheduler {
    pub fn new(orchestrator: Orchestrator, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval,
        }
    }

    /// Tick until the shutdown signal flips (or its sender goes away).
    ///
    /// The first tick runs immediately. Shutdown is only observed between
    /// ticks, so an in-flight tick always completes. A tick that overruns
    /// the interval causes the missed slot to be skipped, not queued.
    /// Returns the orchestrator so the caller can inspect final state.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Orchestrator {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            services = self.orchestrator.services().len(),
            "scheduler started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks: u64 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            ticks += 1;
            debug!(tick = ticks, "tick starting");
            self.orchestrator.tick().await;
        }

        info!(ticks, "scheduler shutting down");
        self.orchestrator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use healwatch_core::ServiceSpec;
    use healwatch_notify::LogNotifier;
    use healwatch_state::StateStore;

    use crate::orchestrator::ServiceStatus;
    use crate::probe::{ProbeFuture, ProbeOutcome, Prober};

    /// Healthy prober that takes `delay` per probe and tracks concurrency.
    struct SlowProber {
        delay: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl SlowProber {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }
    }

    impl Prober for SlowProber {
        fn probe<'a>(&'a self, _spec: &'a ServiceSpec) -> ProbeFuture<'a> {
            Box::pin(async move {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                self.calls.fetch_add(1, Ordering::SeqCst);
                ProbeOutcome::healthy(self.delay)
            })
        }
    }

    fn scheduler(prober: Arc<SlowProber>, interval: Duration) -> Scheduler {
        let store = StateStore::open_in_memory().unwrap();
        let orch = Orchestrator::new(
            vec![ServiceSpec::new("api", "true")],
            Arc::new(store),
            Arc::new(LogNotifier),
        )
        .with_prober(prober);
        Scheduler::new(orch, interval)
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_at_interval_until_shutdown() {
        let prober = SlowProber::new(Duration::from_millis(10));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler(prober.clone(), Duration::from_secs(30)).run(rx));

        // Ticks at t=0, 30, 60, 90.
        tokio::time::sleep(Duration::from_secs(100)).await;
        tx.send(true).unwrap();
        let orch = handle.await.unwrap();

        assert_eq!(prober.calls.load(Ordering::SeqCst), 4);
        assert_eq!(orch.state("api").unwrap().status, ServiceStatus::Up);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_for_in_flight_tick() {
        let prober = SlowProber::new(Duration::from_secs(5));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler(prober.clone(), Duration::from_secs(30)).run(rx));

        // Signal mid-probe.
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();
        let orch = handle.await.unwrap();

        assert_eq!(prober.calls.load(Ordering::SeqCst), 1);
        assert_eq!(orch.state("api").unwrap().status, ServiceStatus::Up);
    }

    #[tokio::test(start_paused = true)]
    async fn overrunning_ticks_are_skipped_not_queued() {
        // Each tick takes 2.5 intervals.
        let prober = SlowProber::new(Duration::from_millis(2500));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler(prober.clone(), Duration::from_secs(1)).run(rx));

        tokio::time::sleep(Duration::from_millis(8800)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        // Back-to-back ticks, never a backlog of ten.
        let calls = prober.calls.load(Ordering::SeqCst);
        assert!((3..=4).contains(&calls), "calls = {calls}");
        assert_eq!(prober.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_runs_nothing() {
        let prober = SlowProber::new(Duration::from_millis(10));
        let (_tx, rx) = watch::channel(true);
        scheduler(prober.clone(), Duration::from_secs(1)).run(rx).await;
        assert_eq!(prober.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_sender_stops_loop() {
        let prober = SlowProber::new(Duration::from_millis(10));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler(prober.clone(), Duration::from_secs(1)).run(rx));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        drop(tx);
        handle.await.unwrap();
        assert_eq!(prober.calls.load(Ordering::SeqCst), 2);
    }
}
