// ── Reconciler task ──
//
// The single writer. Producers (loader, poller, push bridge) enqueue
// mutations; this task applies them one at a time in arrival order,
// commits the result and hands it to the broadcaster.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::reconcile::{Mutation, Patch, apply};
use super::view_store::ViewStore;
use crate::broadcast::Broadcaster;
use crate::error::CoreError;
use crate::model::ViewModel;

/// Handle for submitting mutations to the reconciler task.
///
/// Cheap to clone. Every clone feeds the same FIFO queue, so mutations
/// from different producers are serialized by arrival.
#[derive(Clone)]
pub struct Reconciler {
    tx: mpsc::Sender<Envelope>,
    store: Arc<ViewStore>,
}

impl Reconciler {
    /// Spawn the reconciler task.
    ///
    /// On cancellation the task stops accepting mutations, applies the
    /// ones already queued, then closes the broadcaster.
    pub fn spawn(
        store: Arc<ViewStore>,
        broadcaster: Broadcaster,
        retention: Option<usize>,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        let task = tokio::spawn(reconcile_task(
            rx,
            Arc::clone(&store),
            broadcaster,
            retention,
            cancel,
        ));
        (Self { tx, store }, task)
    }

    /// Queue a full snapshot.
    pub async fn replace(&self, view: ViewModel) -> Result<(), CoreError> {
        self.submit(Mutation::Replace(Box::new(view))).await
    }

    /// Queue an incremental patch.
    pub async fn patch(&self, patch: Patch) -> Result<(), CoreError> {
        self.submit(Mutation::Patch(patch)).await
    }

    /// Queue a mutation, waiting while the queue is full.
    pub async fn submit(&self, mutation: Mutation) -> Result<(), CoreError> {
        self.tx
            .send(Envelope { mutation, ack: None })
            .await
            .map_err(|_| CoreError::EngineClosed)
    }

    /// Queue a mutation and wait until it is committed.
    ///
    /// Returns the revision the mutation produced.
    pub async fn commit(&self, mutation: Mutation) -> Result<u64, CoreError> {
        let (ack, committed) = oneshot::channel();
        self.tx
            .send(Envelope {
                mutation,
                ack: Some(ack),
            })
            .await
            .map_err(|_| CoreError::EngineClosed)?;
        committed.await.map_err(|_| CoreError::EngineClosed)
    }

    /// The latest committed view.
    pub fn current(&self) -> Arc<ViewModel> {
        self.store.current()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

struct Envelope {
    mutation: Mutation,
    ack: Option<oneshot::Sender<u64>>,
}

async fn reconcile_task(
    mut rx: mpsc::Receiver<Envelope>,
    store: Arc<ViewStore>,
    broadcaster: Broadcaster,
    retention: Option<usize>,
    cancel: CancellationToken,
) {
    loop {
        let envelope = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(m) => m,
                None => break,
            },
        };
        commit(&store, &broadcaster, envelope, retention);
    }

    // Finish what producers already queued, then stop delivery.
    rx.close();
    let mut drained = 0_usize;
    while let Some(envelope) = rx.recv().await {
        commit(&store, &broadcaster, envelope, retention);
        drained += 1;
    }
    broadcaster.close();
    debug!(drained, "reconciler stopped");
}

fn commit(store: &ViewStore, broadcaster: &Broadcaster, envelope: Envelope, retention: Option<usize>) {
    let Envelope { mutation, ack } = envelope;
    let origin = mutation.origin();
    let next = apply(&store.current(), mutation, retention);
    let (revision, view) = store.commit(next, origin);
    trace!(revision, ?origin, "committed");
    broadcaster.publish(revision, view);
    if let Some(ack) = ack {
        // the waiter may have given up
        let _ = ack.send(revision);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::model::{Alert, ItemId, Severity};

    fn spawn(retention: Option<usize>) -> (Reconciler, Broadcaster, CancellationToken, JoinHandle<()>) {
        let broadcaster = Broadcaster::new(16);
        let cancel = CancellationToken::new();
        let (reconciler, task) = Reconciler::spawn(
            Arc::new(ViewStore::new()),
            broadcaster.clone(),
            retention,
            8,
            cancel.clone(),
        );
        (reconciler, broadcaster, cancel, task)
    }

    fn alert(id: i64) -> Patch {
        Patch::PrependAlert(Alert {
            id: ItemId::Number(id),
            message: "door opened".into(),
            timestamp: "10:00 AM".into(),
            severity: Severity::Critical,
        })
    }

    #[tokio::test]
    async fn mutations_are_applied_in_order_and_published() {
        let (reconciler, broadcaster, cancel, task) = spawn(None);
        let mut sub = broadcaster.subscribe();

        reconciler.patch(alert(1)).await.unwrap();
        reconciler.patch(alert(2)).await.unwrap();

        let first = sub.recv().await.unwrap();
        let second = sub.recv().await.unwrap();
        assert_eq!(first.alerts.len(), 1);
        assert_eq!(second.alerts[0].id, ItemId::Number(2));
        assert_eq!(reconciler.current().alerts.len(), 2);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn commit_waits_for_the_new_view() {
        let (reconciler, _broadcaster, cancel, task) = spawn(Some(1));

        let snapshot = ViewModel {
            room_temp: 22.5,
            ..ViewModel::default()
        };
        let rev = reconciler
            .commit(Mutation::Replace(Box::new(snapshot)))
            .await
            .unwrap();
        assert_eq!(rev, 1);
        assert_eq!(reconciler.current().room_temp, 22.5);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_drains_queue_then_closes_broadcaster() {
        let (reconciler, broadcaster, cancel, task) = spawn(None);
        let mut sub = broadcaster.subscribe();

        reconciler.patch(alert(1)).await.unwrap();
        reconciler.patch(alert(2)).await.unwrap();
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(reconciler.current().alerts.len(), 2);
        assert!(reconciler.is_closed());
        assert!(matches!(
            reconciler.patch(alert(3)).await,
            Err(CoreError::EngineClosed)
        ));

        // queued updates are still delivered, then the subscription ends
        let mut seen = 0;
        while sub.recv().await.is_some() {
            seen += 1;
        }
        assert_eq!(seen, 2);
    }
}
