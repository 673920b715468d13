// ── Periodic refresh ──
//
// Re-runs the snapshot loader on a fixed period and replaces the state
// with the result. A refresh that is still running when the next tick
// fires (or when a manual refresh is requested) causes that request to
// be dropped rather than queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::loader::SnapshotLoader;
use crate::source::DashboardSource;
use crate::store::{Mutation, Reconciler};

/// Result of a refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A fresh snapshot was loaded and committed.
    Applied,
    /// Another refresh was already in flight; nothing was done.
    Skipped,
}

// ── Gate ─────────────────────────────────────────────────────────────

/// At most one refresh in flight at a time.
#[derive(Debug, Default)]
pub(crate) struct RefreshGate {
    busy: AtomicBool,
}

/// Holds the gate until dropped.
pub(crate) struct GateGuard {
    gate: Arc<RefreshGate>,
}

impl RefreshGate {
    pub(crate) fn try_acquire(self: &Arc<Self>) -> Option<GateGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GateGuard {
                gate: Arc::clone(self),
            })
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

// ── Refresher ────────────────────────────────────────────────────────

/// Loader, reconciler and gate bundled for the poller and manual refreshes.
pub(crate) struct Refresher<S> {
    loader: SnapshotLoader<S>,
    reconciler: Reconciler,
    gate: Arc<RefreshGate>,
}

impl<S: DashboardSource> Refresher<S> {
    pub(crate) fn new(loader: SnapshotLoader<S>, reconciler: Reconciler) -> Self {
        Self {
            loader,
            reconciler,
            gate: Arc::new(RefreshGate::default()),
        }
    }

    pub(crate) fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Refresh now unless another refresh holds the gate.
    pub(crate) async fn refresh_exclusive(
        &self,
        cancel: &CancellationToken,
    ) -> Result<RefreshOutcome, CoreError> {
        let Some(_guard) = self.gate.try_acquire() else {
            debug!("refresh already in flight, skipping");
            return Ok(RefreshOutcome::Skipped);
        };
        self.refresh(cancel).await?;
        Ok(RefreshOutcome::Applied)
    }

    /// Load a snapshot and wait until the reconciler has committed it.
    pub(crate) async fn refresh(&self, cancel: &CancellationToken) -> Result<(), CoreError> {
        let view = self.loader.load(cancel).await?;
        let revision = self.reconciler.commit(Mutation::Replace(Box::new(view))).await?;
        debug!(revision, "snapshot committed");
        Ok(())
    }
}

/// Tick every `period`, starting one period from now.
pub(crate) async fn poll_task<S: DashboardSource>(
    refresher: Arc<Refresher<S>>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await; // consume the immediate first tick

    let mut in_flight: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let Some(guard) = refresher.gate.try_acquire() else {
                    warn!("previous refresh still running, dropping tick");
                    continue;
                };
                let refresher = Arc::clone(&refresher);
                let cancel = cancel.clone();
                in_flight = Some(tokio::spawn(async move {
                    let _guard = guard;
                    match refresher.refresh(&cancel).await {
                        Ok(()) => info!("periodic refresh applied"),
                        Err(CoreError::EngineClosed) => debug!("periodic refresh abandoned"),
                        Err(e) => warn!(error = %e, "periodic refresh failed, keeping previous state"),
                    }
                }));
            }
        }
    }

    if let Some(task) = in_flight {
        let _ = task.await;
    }
    debug!("poller stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use roomwatch_api::{
        CoolingResponse, EnergyResponse, Error, SecurityResponse, TemperatureResponse,
    };

    use super::*;
    use crate::broadcast::Broadcaster;
    use crate::store::ViewStore;

    /// Serves fixed data; `temperature` takes `delay` and counts calls.
    struct SlowSource {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl DashboardSource for SlowSource {
        async fn energy(&self) -> Result<EnergyResponse, Error> {
            Ok(EnergyResponse {
                current: 1.0,
                previous: 1.0,
                history: vec![],
            })
        }

        async fn temperature(&self) -> Result<TemperatureResponse, Error> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            Ok(TemperatureResponse {
                room_temp: f64::from(u32::try_from(n).unwrap()),
                outdoor_temp: 0.0,
                predicted_temp: 0.0,
            })
        }

        async fn cooling(&self) -> Result<CoolingResponse, Error> {
            Ok(CoolingResponse {
                status: false,
                speed: 0.0,
            })
        }

        async fn security(&self) -> Result<SecurityResponse, Error> {
            Ok(SecurityResponse {
                notifications: vec![],
                alerts: vec![],
                camera_status: false,
                camera_data: None,
                access_count: 0,
            })
        }
    }

    fn refresher(delay: Duration) -> (Arc<Refresher<SlowSource>>, Arc<SlowSource>, Arc<ViewStore>) {
        let source = Arc::new(SlowSource {
            calls: AtomicUsize::new(0),
            delay,
        });
        let store = Arc::new(ViewStore::new());
        let (reconciler, _task) = Reconciler::spawn(
            Arc::clone(&store),
            Broadcaster::new(4),
            None,
            8,
            CancellationToken::new(),
        );
        let loader = SnapshotLoader::new(Arc::clone(&source), Duration::from_secs(60));
        (Arc::new(Refresher::new(loader, reconciler)), source, store)
    }

    #[test]
    fn gate_admits_one_holder() {
        let gate = Arc::new(RefreshGate::default());
        let guard = gate.try_acquire().unwrap();
        assert!(gate.is_busy());
        assert!(gate.try_acquire().is_none());
        drop(guard);
        assert!(!gate.is_busy());
        assert!(gate.try_acquire().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_ticks_are_dropped() {
        let (refresher, source, _store) = refresher(Duration::from_secs(25));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_task(
            Arc::clone(&refresher),
            Duration::from_secs(10),
            cancel.clone(),
        ));

        // t=10 starts a refresh lasting until t=35; ticks at 20 and 30 are
        // dropped; t=40 starts the second one.
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn manual_refresh_is_skipped_while_busy() {
        let (refresher, _source, store) = refresher(Duration::from_secs(5));
        let cancel = CancellationToken::new();

        let background = {
            let refresher = Arc::clone(&refresher);
            let cancel = cancel.clone();
            tokio::spawn(async move { refresher.refresh_exclusive(&cancel).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;

        let outcome = refresher.refresh_exclusive(&cancel).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Skipped);
        assert_eq!(
            background.await.unwrap().unwrap(),
            RefreshOutcome::Applied
        );
        assert_eq!(store.current().room_temp, 1.0);
    }
}
