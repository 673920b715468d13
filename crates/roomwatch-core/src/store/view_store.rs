// ── Published view ──
//
// Copy-on-read storage for the current `ViewModel`. Readers load an
// `Arc` without locking; only the reconciler task ever stores.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::reconcile::Origin;
use crate::model::ViewModel;

/// The current dashboard state plus freshness metadata.
pub struct ViewStore {
    current: ArcSwap<ViewModel>,
    revision: AtomicU64,
    last_snapshot: watch::Sender<Option<DateTime<Utc>>>,
    last_event: watch::Sender<Option<DateTime<Utc>>>,
}

impl ViewStore {
    pub fn new() -> Self {
        let (last_snapshot, _) = watch::channel(None);
        let (last_event, _) = watch::channel(None);

        Self {
            current: ArcSwap::from_pointee(ViewModel::default()),
            revision: AtomicU64::new(0),
            last_snapshot,
            last_event,
        }
    }

    /// The latest committed view. Never blocks and never observes a
    /// half-applied mutation.
    pub fn current(&self) -> Arc<ViewModel> {
        self.current.load_full()
    }

    /// Number of commits so far. `0` means nothing has been loaded yet.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Store `view` as the new current value and return it with its revision.
    pub(crate) fn commit(&self, view: ViewModel, origin: Origin) -> (u64, Arc<ViewModel>) {
        let view = Arc::new(view);
        self.current.store(Arc::clone(&view));
        let revision = self.revision.fetch_add(1, Ordering::AcqRel) + 1;

        let now = Some(Utc::now());
        match origin {
            Origin::Snapshot => self.last_snapshot.send_replace(now),
            Origin::Event => self.last_event.send_replace(now),
        };
        (revision, view)
    }

    // ── Metadata ─────────────────────────────────────────────────────

    pub fn last_snapshot(&self) -> Option<DateTime<Utc>> {
        *self.last_snapshot.borrow()
    }

    pub fn last_event(&self) -> Option<DateTime<Utc>> {
        *self.last_event.borrow()
    }

    /// Most recent commit of either kind.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_snapshot().max(self.last_event())
    }

    /// How long ago the last full snapshot landed, or `None` if never loaded.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_snapshot().map(|t| Utc::now() - t)
    }

    pub fn subscribe_last_snapshot(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.last_snapshot.subscribe()
    }

    pub fn subscribe_last_event(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.last_event.subscribe()
    }
}

impl Default for ViewStore {
    fn default() -> Self {
        Self::new()
    }
}
