// ── Mutation rules ──
//
// Pure functions: given the current view and one mutation, produce the
// next view. No I/O and no locking, so the ordering rules can be tested
// without a runtime.

use crate::model::{Alert, Notification, ViewModel};

/// An incremental change carried by a push event.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// New forecast for the outdoor temperature.
    PredictedTemperature {
        value: f64,
        predicted_for: Option<String>,
    },
    /// A new alert, shown first.
    PrependAlert(Alert),
    /// A new notification, shown first.
    PrependNotification(Notification),
}

/// One unit of work for the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// A complete snapshot. Wins over every patch applied before it.
    Replace(Box<ViewModel>),
    Patch(Patch),
}

/// Where a committed mutation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Snapshot,
    Event,
}

impl Mutation {
    pub fn origin(&self) -> Origin {
        match self {
            Self::Replace(_) => Origin::Snapshot,
            Self::Patch(_) => Origin::Event,
        }
    }
}

/// Compute the view that results from applying `mutation` to `current`.
///
/// Feed entries are never de-duplicated by id. With a `retention` limit,
/// both feeds keep only the newest `retention` entries.
pub fn apply(current: &ViewModel, mutation: Mutation, retention: Option<usize>) -> ViewModel {
    let mut next = match mutation {
        Mutation::Replace(snapshot) => *snapshot,
        Mutation::Patch(patch) => {
            let mut next = current.clone();
            match patch {
                Patch::PredictedTemperature {
                    value,
                    predicted_for,
                } => {
                    next.predicted_outdoor_temp = value;
                    next.predicted_for = predicted_for;
                }
                Patch::PrependAlert(alert) => next.alerts.insert(0, alert),
                Patch::PrependNotification(notification) => {
                    next.notifications.insert(0, notification);
                }
            }
            next
        }
    };

    if let Some(max) = retention {
        next.alerts.truncate(max);
        next.notifications.truncate(max);
    }
    next
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{ItemId, Severity};

    fn alert(id: i64) -> Alert {
        Alert {
            id: ItemId::Number(id),
            message: format!("alert {id}"),
            timestamp: "09:15 AM".into(),
            severity: Severity::Warning,
        }
    }

    fn notification(id: i64) -> Notification {
        Notification {
            id: ItemId::Number(id),
            message: format!("note {id}"),
            timestamp: "09:15 AM".into(),
        }
    }

    fn ids(alerts: &[Alert]) -> Vec<String> {
        alerts.iter().map(|a| a.id.to_string()).collect()
    }

    #[test]
    fn prediction_patch_touches_only_forecast() {
        let current = ViewModel {
            room_temp: 22.5,
            outdoor_temp: 28.3,
            predicted_outdoor_temp: 29.0,
            ..ViewModel::default()
        };

        let next = apply(
            &current,
            Mutation::Patch(Patch::PredictedTemperature {
                value: 30.1,
                predicted_for: None,
            }),
            None,
        );

        assert_eq!(next.predicted_outdoor_temp, 30.1);
        assert_eq!(next.room_temp, 22.5);
        assert_eq!(next.outdoor_temp, 28.3);
        // input left untouched
        assert_eq!(current.predicted_outdoor_temp, 29.0);
    }

    #[test]
    fn alerts_are_prepended_in_arrival_order() {
        let mut view = ViewModel::default();
        for id in [1, 2] {
            view = apply(&view, Mutation::Patch(Patch::PrependAlert(alert(id))), None);
        }
        assert_eq!(ids(&view.alerts), ["2", "1"]);
    }

    #[test]
    fn duplicate_ids_are_kept() {
        let mut view = ViewModel::default();
        for _ in 0..2 {
            view = apply(
                &view,
                Mutation::Patch(Patch::PrependNotification(notification(7))),
                None,
            );
        }
        assert_eq!(view.notifications.len(), 2);
    }

    #[test]
    fn retention_drops_oldest_entry() {
        let mut view = ViewModel::default();
        for id in 1..=4 {
            view = apply(&view, Mutation::Patch(Patch::PrependAlert(alert(id))), Some(3));
        }
        assert_eq!(ids(&view.alerts), ["4", "3", "2"]);
    }

    #[test]
    fn retention_applies_to_snapshots() {
        let snapshot = ViewModel {
            notifications: (1..=5).map(notification).collect(),
            ..ViewModel::default()
        };
        let next = apply(
            &ViewModel::default(),
            Mutation::Replace(Box::new(snapshot)),
            Some(2),
        );
        assert_eq!(next.notifications.len(), 2);
        assert_eq!(next.notifications[0].id, ItemId::Number(1));
    }

    #[test]
    fn replace_discards_earlier_patches() {
        let patched = apply(
            &ViewModel::default(),
            Mutation::Patch(Patch::PrependAlert(alert(9))),
            None,
        );
        let snapshot = ViewModel {
            room_temp: 21.0,
            ..ViewModel::default()
        };

        let next = apply(&patched, Mutation::Replace(Box::new(snapshot.clone())), None);
        assert_eq!(next, snapshot);
    }

    #[test]
    fn mutation_origin() {
        assert_eq!(
            Mutation::Replace(Box::default()).origin(),
            Origin::Snapshot
        );
        assert_eq!(
            Mutation::Patch(Patch::PrependAlert(alert(1))).origin(),
            Origin::Event
        );
    }
}
