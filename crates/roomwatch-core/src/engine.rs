// ── Engine ──
//
// Full lifecycle of the live dashboard state: initial snapshot, periodic
// refresh, push stream, reconciliation and fan-out to observers.

use std::sync::{Arc, OnceLock, PoisonError};

use chrono::{DateTime, Utc};
use roomwatch_api::{
    Connector, DashboardClient, EventStreamHandle, PushEvent, StreamState, WsConnector,
};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::broadcast::{Broadcaster, Subscription, SubscriptionId};
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::loader::SnapshotLoader;
use crate::model::ViewModel;
use crate::poller::{RefreshOutcome, Refresher, poll_task};
use crate::source::DashboardSource;
use crate::store::{Mutation, Patch, Reconciler, ViewStore};

const EVENT_CHANNEL_SIZE: usize = 256;

// ── EngineState ──────────────────────────────────────────────────────

/// Lifecycle of an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum EngineState {
    /// Constructed, not started.
    Idle,
    /// Initial snapshot in progress.
    Loading,
    Running,
    /// The initial snapshot failed. `start()` may be retried.
    Failed,
    /// Shut down. Terminal.
    Stopped,
}

// ── Engine ───────────────────────────────────────────────────────────

/// The live state engine.
///
/// Cheaply cloneable via `Arc`. `S` serves the request/response resources
/// and `C` opens push stream connections; [`Engine::new`] uses the HTTP
/// client and the WebSocket connector.
pub struct Engine<S = DashboardClient, C = WsConnector> {
    inner: Arc<EngineInner<S, C>>,
}

impl<S, C> Clone for Engine<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct EngineInner<S, C> {
    config: EngineConfig,
    source: Arc<S>,
    connector: Mutex<Option<C>>,
    store: Arc<ViewStore>,
    broadcaster: Broadcaster,
    state: watch::Sender<EngineState>,
    stream_state: OnceLock<watch::Receiver<StreamState>>,
    refresher: OnceLock<Arc<Refresher<S>>>,
    cancel: CancellationToken,
    stream: Mutex<Option<EventStreamHandle>>,
    reconciler_task: Mutex<Option<JoinHandle<()>>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    observer_tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl<S, C> Drop for EngineInner<S, C> {
    fn drop(&mut self) {
        // last handle gone: stop whatever is still running
        self.cancel.cancel();
    }
}

impl Engine {
    /// Build an engine talking HTTP to `config.source` and, if configured,
    /// WebSocket to `config.stream`. Does NOT start it.
    pub fn new(config: EngineConfig) -> Result<Self, CoreError> {
        let transport = config.transport();
        let client = DashboardClient::new(config.source.base_url.clone(), &transport)?;
        let connector = config
            .stream
            .as_ref()
            .map(|stream| WsConnector::new(stream.url.clone(), transport.authorization()));
        Self::with_parts(config, client, connector)
    }
}

impl<S: DashboardSource, C: Connector> Engine<S, C> {
    /// Build an engine from explicit parts. `connector` is only used when
    /// `config.stream` is set.
    pub fn with_parts(config: EngineConfig, source: S, connector: Option<C>) -> Result<Self, CoreError> {
        config.validate()?;
        let (state, _) = watch::channel(EngineState::Idle);
        let broadcaster = Broadcaster::new(config.observer_capacity);

        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                source: Arc::new(source),
                connector: Mutex::new(connector),
                store: Arc::new(ViewStore::new()),
                broadcaster,
                state,
                stream_state: OnceLock::new(),
                refresher: OnceLock::new(),
                cancel: CancellationToken::new(),
                stream: Mutex::new(None),
                reconciler_task: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
                observer_tasks: std::sync::Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// The published view and its freshness metadata.
    pub fn store(&self) -> &Arc<ViewStore> {
        &self.inner.store
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Load the initial snapshot, then start the poller and push stream.
    ///
    /// Returns once the snapshot is committed and visible through
    /// [`current()`](Self::current). If it fails the engine is left
    /// `Failed` and the error is returned; calling `start()` again retries.
    pub async fn start(&self) -> Result<(), CoreError> {
        let mut handles = self.inner.task_handles.lock().await;
        match self.state() {
            EngineState::Idle | EngineState::Failed => {}
            EngineState::Loading | EngineState::Running => return Err(CoreError::AlreadyStarted),
            EngineState::Stopped => return Err(CoreError::EngineClosed),
        }
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::EngineClosed);
        }
        self.set_state(EngineState::Loading);

        let config = &self.inner.config;
        let cancel = &self.inner.cancel;
        let refresher = self.refresher().await;

        if let Err(e) = refresher.refresh(cancel).await {
            warn!(error = %e, "initial snapshot failed");
            self.set_state(EngineState::Failed);
            return Err(e);
        }
        info!("initial snapshot loaded");

        if let Some(period) = config.refresh_interval {
            debug!(period_secs = period.as_secs(), "starting poller");
            handles.push(tokio::spawn(poll_task(
                Arc::clone(&refresher),
                period,
                cancel.clone(),
            )));
        }

        if let Some(ref stream_config) = config.stream {
            match self.inner.connector.lock().await.take() {
                Some(connector) => {
                    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
                    let stream = EventStreamHandle::spawn(
                        connector,
                        stream_config.settings(),
                        event_tx,
                        cancel,
                    );
                    let _ = self.inner.stream_state.set(stream.subscribe_state());
                    handles.push(tokio::spawn(event_bridge_task(
                        event_rx,
                        refresher.reconciler().clone(),
                    )));
                    *self.inner.stream.lock().await = Some(stream);
                }
                None => warn!("push stream configured without a connector, running snapshot-only"),
            }
        }

        self.set_state(EngineState::Running);
        info!("engine running");
        Ok(())
    }

    /// Spawn the reconciler on first use and return the shared refresher.
    async fn refresher(&self) -> Arc<Refresher<S>> {
        if let Some(refresher) = self.inner.refresher.get() {
            return Arc::clone(refresher);
        }

        let config = &self.inner.config;
        let (reconciler, task) = Reconciler::spawn(
            Arc::clone(&self.inner.store),
            self.inner.broadcaster.clone(),
            config.retention,
            config.mutation_capacity,
            self.inner.cancel.clone(),
        );
        *self.inner.reconciler_task.lock().await = Some(task);

        let loader = SnapshotLoader::new(Arc::clone(&self.inner.source), config.source.fetch_timeout);
        let refresher = Arc::new(Refresher::new(loader, reconciler));
        let _ = self.inner.refresher.set(Arc::clone(&refresher));
        refresher
    }

    /// Stop everything.
    ///
    /// Producers stop first, the reconciler applies what was already
    /// queued, and observers receive those final views before their
    /// subscriptions end. Idempotent.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        if let Some(stream) = self.inner.stream.lock().await.take() {
            stream.shutdown();
            stream.join().await;
        }
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        if let Some(task) = self.inner.reconciler_task.lock().await.take() {
            let _ = task.await;
        }
        // no-op if the reconciler already closed it
        self.inner.broadcaster.close();

        let observers = std::mem::take(
            &mut *self
                .inner
                .observer_tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for task in observers {
            let _ = task.await;
        }

        if self.state() != EngineState::Stopped {
            self.set_state(EngineState::Stopped);
            info!("engine stopped");
        }
    }

    /// Run a full refresh now.
    ///
    /// Returns [`RefreshOutcome::Skipped`] if a refresh is already in
    /// flight. On failure the previous state is kept.
    pub async fn refresh(&self) -> Result<RefreshOutcome, CoreError> {
        match self.state() {
            EngineState::Running => {}
            EngineState::Stopped => return Err(CoreError::EngineClosed),
            EngineState::Idle | EngineState::Loading | EngineState::Failed => {
                return Err(CoreError::NotStarted);
            }
        }
        let refresher = self.inner.refresher.get().ok_or(CoreError::NotStarted)?;
        let outcome = refresher.refresh_exclusive(&self.inner.cancel).await;
        if let Err(ref e) = outcome {
            warn!(error = %e, "manual refresh failed, keeping previous state");
        }
        outcome
    }

    // ── State access ─────────────────────────────────────────────────

    /// The latest committed view. Non-blocking.
    pub fn current(&self) -> Arc<ViewModel> {
        self.inner.store.current()
    }

    pub fn state(&self) -> EngineState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<EngineState> {
        self.inner.state.subscribe()
    }

    /// Push stream state. `Disconnected` until the stream has been started.
    pub fn stream_state(&self) -> StreamState {
        self.inner
            .stream_state
            .get()
            .map_or(StreamState::Disconnected, |rx| rx.borrow().clone())
    }

    /// `None` until the push stream has been started.
    pub fn subscribe_stream_state(&self) -> Option<watch::Receiver<StreamState>> {
        self.inner.stream_state.get().cloned()
    }

    /// Time of the most recent commit, snapshot or event.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.inner.store.last_updated()
    }

    /// Age of the last full snapshot.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.inner.store.data_age()
    }

    // ── Observers ────────────────────────────────────────────────────

    /// Subscribe to view updates. Starts from the latest view if one has
    /// been published.
    pub fn subscribe(&self) -> Subscription {
        self.inner.broadcaster.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.broadcaster.unsubscribe(id)
    }

    /// Call `observer` with every view delivered to a new subscription,
    /// on its own task. Must be called from within a Tokio runtime.
    ///
    /// A panicking observer only ends its own task.
    pub fn spawn_observer<F>(&self, mut observer: F) -> SubscriptionId
    where
        F: FnMut(Arc<ViewModel>) + Send + 'static,
    {
        let mut subscription = self.subscribe();
        let id = subscription.id();
        let task = tokio::spawn(async move {
            while let Some(view) = subscription.recv().await {
                observer(view);
            }
            trace!(%id, "observer finished");
        });
        self.inner
            .observer_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
        id
    }

    fn set_state(&self, state: EngineState) {
        debug!(%state, "engine state");
        self.inner.state.send_replace(state);
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Turn decoded push events into patches, preserving arrival order.
async fn event_bridge_task(mut events: mpsc::Receiver<PushEvent>, reconciler: Reconciler) {
    while let Some(event) = events.recv().await {
        let name = event.name();
        match Patch::try_from(event) {
            Ok(patch) => {
                if reconciler.submit(Mutation::Patch(patch)).await.is_err() {
                    break;
                }
                trace!(event = name, "event queued");
            }
            Err(e) => warn!(event = name, error = %e, "dropping malformed event"),
        }
    }
    debug!("event bridge stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_display() {
        assert_eq!(EngineState::Running.to_string(), "running");
        assert_eq!(EngineState::Failed.to_string(), "failed");
    }
}
