// ── Snapshot loader ──
//
// Fetches all four resources concurrently and assembles one complete
// `ViewModel`. A single failing or slow resource fails the whole load;
// partial snapshots are never produced.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::convert;
use crate::error::CoreError;
use crate::model::ViewModel;
use crate::source::DashboardSource;

/// Performs full snapshot loads against a [`DashboardSource`].
pub struct SnapshotLoader<S> {
    source: Arc<S>,
    fetch_timeout: Duration,
}

impl<S> Clone for SnapshotLoader<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            fetch_timeout: self.fetch_timeout,
        }
    }
}

impl<S: DashboardSource> SnapshotLoader<S> {
    pub fn new(source: Arc<S>, fetch_timeout: Duration) -> Self {
        Self {
            source,
            fetch_timeout,
        }
    }

    /// Fetch and assemble a snapshot.
    ///
    /// Returns on the first failure, abandoning the fetches still in
    /// flight. Cancelling `cancel` aborts the load with `EngineClosed`.
    pub async fn load(&self, cancel: &CancellationToken) -> Result<ViewModel, CoreError> {
        let timeout = self.fetch_timeout;
        let fetch_all = async {
            tokio::try_join!(
                fetch("energy", timeout, self.source.energy()),
                fetch("temperature", timeout, self.source.temperature()),
                fetch("cooling", timeout, self.source.cooling()),
                fetch("security", timeout, self.source.security()),
            )
        };

        let (energy, temperature, cooling, security) = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CoreError::EngineClosed),
            result = fetch_all => result?,
        };

        let view = convert::assemble(energy, temperature, cooling, security)?;
        debug!(
            history = view.energy.history.len(),
            notifications = view.notifications.len(),
            alerts = view.alerts.len(),
            "snapshot loaded"
        );
        Ok(view)
    }
}

async fn fetch<T>(
    resource: &'static str,
    timeout: Duration,
    request: impl Future<Output = Result<T, roomwatch_api::Error>>,
) -> Result<T, CoreError> {
    match tokio::time::timeout(timeout, request).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(CoreError::unavailable(resource, e)),
        Err(_) => Err(CoreError::unavailable(
            resource,
            format!("no response within {}ms", timeout.as_millis()),
        )),
    }
}
