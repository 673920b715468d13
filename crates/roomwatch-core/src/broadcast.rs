// ── Subscription broadcaster ──
//
// Fan-out of committed views to observers. Every subscriber owns a
// bounded mailbox; publishing pushes into each mailbox without awaiting,
// evicting the oldest queued view when a mailbox is full. A slow observer
// therefore only ever falls behind on its own queue.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use futures_util::Stream;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::model::ViewModel;

/// Identifies one subscription for `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// ── Mailbox ──────────────────────────────────────────────────────────

struct Queue {
    items: VecDeque<Arc<ViewModel>>,
    /// Revision of the newest view ever pushed; older ones are ignored.
    newest: u64,
}

struct Mailbox {
    queue: Mutex<Queue>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl Mailbox {
    fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(Queue {
                items: VecDeque::with_capacity(capacity),
                newest: 0,
            }),
            capacity,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    fn push(&self, revision: u64, view: Arc<ViewModel>) {
        {
            let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            if revision <= queue.newest {
                return;
            }
            queue.newest = revision;
            if queue.items.len() >= self.capacity {
                queue.items.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            queue.items.push_back(view);
        }
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<Arc<ViewModel>> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .items
            .pop_front()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

// ── Broadcaster ──────────────────────────────────────────────────────

struct Registry {
    subscribers: DashMap<SubscriptionId, Arc<Mailbox>>,
    latest: ArcSwapOption<(u64, Arc<ViewModel>)>,
    next_id: AtomicU64,
    capacity: usize,
    closed: AtomicBool,
}

impl Registry {
    fn remove(&self, id: SubscriptionId) -> bool {
        match self.subscribers.remove(&id) {
            Some((_, mailbox)) => {
                mailbox.close();
                true
            }
            None => false,
        }
    }
}

/// Delivers every published view to all current subscribers.
///
/// Cloning is cheap (`Arc` inner); clones share the same registry.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Registry>,
}

impl Broadcaster {
    /// `capacity` is the per-subscriber queue length.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Registry {
                subscribers: DashMap::new(),
                latest: ArcSwapOption::empty(),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Register a new subscriber.
    ///
    /// If anything has been published already, the latest view is queued
    /// immediately so the subscriber starts from the current state.
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let mailbox = Arc::new(Mailbox::new(self.inner.capacity));

        if self.inner.closed.load(Ordering::Acquire) {
            mailbox.close();
        } else {
            self.inner.subscribers.insert(id, Arc::clone(&mailbox));
        }

        // Seed after registering: a publish racing with us lands in the
        // mailbox with a newer revision and the stale seed is ignored.
        if let Some(latest) = self.inner.latest.load_full() {
            let (revision, view) = &*latest;
            mailbox.push(*revision, Arc::clone(view));
        }

        // Closing may have raced with the insert above.
        if self.inner.closed.load(Ordering::Acquire) {
            self.inner.remove(id);
        }

        debug!(%id, "subscriber added");
        Subscription {
            id,
            mailbox,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a subscriber. Its pending views stay readable, then `recv`
    /// returns `None`. Returns `false` if the id is unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.inner.remove(id);
        if removed {
            debug!(%id, "subscriber removed");
        }
        removed
    }

    /// Deliver `view` to every subscriber. Never blocks on observers.
    pub fn publish(&self, revision: u64, view: Arc<ViewModel>) {
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }
        self.inner
            .latest
            .store(Some(Arc::new((revision, Arc::clone(&view)))));
        for entry in &self.inner.subscribers {
            entry.value().push(revision, Arc::clone(&view));
        }
        trace!(revision, subscribers = self.inner.subscribers.len(), "published");
    }

    /// Stop delivery. Subscribers drain what is queued, then see `None`.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let ids: Vec<SubscriptionId> = self.inner.subscribers.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.inner.remove(id);
        }
        debug!("broadcaster closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

// ── Subscription ─────────────────────────────────────────────────────

/// One observer's view of the broadcast.
///
/// Dropping the subscription unregisters it.
pub struct Subscription {
    id: SubscriptionId,
    mailbox: Arc<Mailbox>,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next view. `None` once unsubscribed or closed and
    /// everything queued has been read.
    pub async fn recv(&mut self) -> Option<Arc<ViewModel>> {
        loop {
            if let Some(view) = self.mailbox.pop() {
                return Some(view);
            }
            if self.mailbox.is_closed() {
                // a push may have landed between pop and the flag check
                return self.mailbox.pop();
            }
            self.mailbox.notify.notified().await;
        }
    }

    /// Take the next queued view without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<ViewModel>> {
        self.mailbox.pop()
    }

    /// Views evicted from this subscriber's queue because it fell behind.
    pub fn dropped(&self) -> u64 {
        self.mailbox.dropped.load(Ordering::Relaxed)
    }

    /// Adapt into a `Stream` of views.
    pub fn into_stream(self) -> impl Stream<Item = Arc<ViewModel>> + Send + 'static {
        futures_util::stream::unfold(self, |mut sub| async move {
            let view = sub.recv().await?;
            Some((view, sub))
        })
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("closed", &self.mailbox.is_closed())
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}
