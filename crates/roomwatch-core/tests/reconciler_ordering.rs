//! Property tests for the reconciler's ordering guarantee.
//!
//! Whatever mix of snapshots and patches is submitted, the committed view
//! equals a sequential fold of `apply` over the same mutations in
//! submission order.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use std::sync::Arc;

use proptest::prelude::*;
use roomwatch_core::store::apply;
use roomwatch_core::{
    Alert, Broadcaster, ItemId, Mutation, Notification, Patch, Reconciler, Severity, ViewModel,
    ViewStore,
};
use tokio_util::sync::CancellationToken;

// ── Strategies ──────────────────────────────────────────────────────

fn item_id() -> impl Strategy<Value = ItemId> {
    prop_oneof![
        (0i64..8).prop_map(ItemId::Number),
        "[a-c]{1,2}".prop_map(ItemId::Text),
    ]
}

fn alert() -> impl Strategy<Value = Alert> {
    (item_id(), any::<bool>()).prop_map(|(id, critical)| Alert {
        id,
        message: "door opened".into(),
        timestamp: "10:00 AM".into(),
        severity: if critical {
            Severity::Critical
        } else {
            Severity::Warning
        },
    })
}

fn notification() -> impl Strategy<Value = Notification> {
    item_id().prop_map(|id| Notification {
        id,
        message: "Admin accessed control panel".into(),
        timestamp: "09:45 AM".into(),
    })
}

fn snapshot() -> impl Strategy<Value = ViewModel> {
    (
        -10i32..40,
        prop::collection::vec(alert(), 0..6),
        prop::collection::vec(notification(), 0..6),
        0u32..100,
    )
        .prop_map(|(room, alerts, notifications, access_count)| ViewModel {
            room_temp: f64::from(room),
            alerts,
            notifications,
            access_count,
            ..ViewModel::default()
        })
}

fn mutation() -> impl Strategy<Value = Mutation> {
    prop_oneof![
        1 => snapshot().prop_map(|view| Mutation::Replace(Box::new(view))),
        2 => (-10i32..45, prop::option::of("[0-9]{2}:00")).prop_map(|(value, predicted_for)| {
            Mutation::Patch(Patch::PredictedTemperature {
                value: f64::from(value),
                predicted_for,
            })
        }),
        3 => alert().prop_map(|a| Mutation::Patch(Patch::PrependAlert(a))),
        3 => notification().prop_map(|n| Mutation::Patch(Patch::PrependNotification(n))),
    ]
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Submit every mutation, let the reconciler drain, and return the
/// committed view and revision.
fn run_through_reconciler(
    mutations: Vec<Mutation>,
    retention: Option<usize>,
) -> (ViewModel, u64) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async move {
        let store = Arc::new(ViewStore::new());
        let cancel = CancellationToken::new();
        let (reconciler, task) = Reconciler::spawn(
            Arc::clone(&store),
            Broadcaster::new(4),
            retention,
            4,
            cancel.clone(),
        );

        for mutation in mutations {
            reconciler.submit(mutation).await.unwrap();
        }
        cancel.cancel();
        task.await.unwrap();

        ((*reconciler.current()).clone(), store.revision())
    })
}

// ═════════════════════════════════════════════════════════════════════
// Committed view equals the in-order fold
// ═════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn committed_view_matches_sequential_fold(
        mutations in prop::collection::vec(mutation(), 0..40),
        retention in prop::option::of(1usize..6),
    ) {
        let expected = mutations
            .iter()
            .cloned()
            .fold(ViewModel::default(), |view, m| apply(&view, m, retention));
        let submitted = u64::try_from(mutations.len()).unwrap();

        let (committed, revision) = run_through_reconciler(mutations, retention);

        prop_assert_eq!(committed, expected);
        prop_assert_eq!(revision, submitted);
    }
}

// ═════════════════════════════════════════════════════════════════════
// Feeds never exceed the retention cap
// ═════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn feeds_stay_within_retention(
        mutations in prop::collection::vec(mutation(), 1..40),
        retention in 1usize..6,
    ) {
        let (committed, _) = run_through_reconciler(mutations, Some(retention));

        prop_assert!(committed.alerts.len() <= retention);
        prop_assert!(committed.notifications.len() <= retention);
    }
}
