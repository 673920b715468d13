// ── Wire → domain conversions ──
//
// Snapshot assembly from the four resource responses, and push events
// into incremental patches. Everything the engine stores passes through
// here, so this is where the view-model invariants are established.

use indexmap::IndexMap;
use roomwatch_api::{
    CoolingResponse, EnergyResponse, FeedItemResponse, PushEvent, SecurityResponse,
    TemperatureResponse,
};
use tracing::debug;

use crate::error::CoreError;
use crate::model::{Alert, Camera, Energy, EnergyPoint, Fan, Notification, Severity, ViewModel};
use crate::store::Patch;

// ── Snapshot assembly ────────────────────────────────────────────────

/// Build a complete view-model from the four resource responses.
///
/// All-or-nothing: if any part is unusable the whole snapshot is rejected.
pub fn assemble(
    energy: EnergyResponse,
    temperature: TemperatureResponse,
    cooling: CoolingResponse,
    security: SecurityResponse,
) -> Result<ViewModel, CoreError> {
    let alerts = security
        .alerts
        .into_iter()
        .map(Alert::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CoreError::unavailable("security", e))?;

    Ok(ViewModel {
        energy: Energy::from(energy),
        room_temp: temperature.room_temp,
        outdoor_temp: temperature.outdoor_temp,
        predicted_outdoor_temp: temperature.predicted_temp,
        predicted_for: None,
        fan: Fan::from(cooling),
        notifications: security
            .notifications
            .into_iter()
            .map(Notification::from)
            .collect(),
        alerts,
        camera: Camera {
            online: security.camera_status,
            frame_ref: security.camera_data,
        },
        access_count: security.access_count,
    })
}

impl From<EnergyResponse> for Energy {
    /// History stays in producer order; a repeated date keeps its first
    /// position and takes the later value.
    fn from(resp: EnergyResponse) -> Self {
        let mut by_date = IndexMap::with_capacity(resp.history.len());
        for point in resp.history {
            if by_date.insert(point.date, point.value).is_some() {
                debug!(date = %point.date, "duplicate energy history date, keeping latest value");
            }
        }

        Self {
            current: resp.current,
            previous: resp.previous,
            history: by_date
                .into_iter()
                .map(|(date, value)| EnergyPoint { date, value })
                .collect(),
        }
    }
}

impl From<CoolingResponse> for Fan {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
    fn from(resp: CoolingResponse) -> Self {
        // clamped to 0..=100 first, so the cast is lossless
        let speed = resp.speed.round().clamp(0.0, 100.0) as u8;
        Self {
            active: resp.status,
            speed_percent: speed,
        }
    }
}

impl From<FeedItemResponse> for Notification {
    fn from(item: FeedItemResponse) -> Self {
        Self {
            id: item.id,
            message: item.message,
            timestamp: item.time,
        }
    }
}

impl TryFrom<FeedItemResponse> for Alert {
    type Error = CoreError;

    fn try_from(item: FeedItemResponse) -> Result<Self, Self::Error> {
        let severity = item
            .kind
            .parse::<Severity>()
            .ok()
            .filter(|s| s.is_alert())
            .ok_or_else(|| CoreError::MalformedEvent {
                reason: format!("alert {} has severity '{}'", item.id, item.kind),
            })?;

        Ok(Self {
            id: item.id,
            message: item.message,
            timestamp: item.time,
            severity,
        })
    }
}

// ── Push events ──────────────────────────────────────────────────────

impl TryFrom<PushEvent> for Patch {
    type Error = CoreError;

    fn try_from(event: PushEvent) -> Result<Self, Self::Error> {
        match event {
            PushEvent::TemperaturePrediction {
                temperature,
                predicted_for,
            } => Ok(Self::PredictedTemperature {
                value: temperature,
                predicted_for,
            }),
            PushEvent::SecurityAlert(item) => Alert::try_from(item).map(Self::PrependAlert),
            PushEvent::Notification(item) => Ok(Self::PrependNotification(item.into())),
        }
    }
}
