// ── ViewModel ──
//
// The single canonical dashboard state. Immutable once published: the
// reconciler builds a new value for every mutation and observers only
// ever hold `Arc<ViewModel>`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Alert, Notification};

/// Complete dashboard state.
///
/// `Default` is the empty engine-start state: zeros, `false`, and empty lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    pub energy: Energy,
    /// Room temperature in °C.
    pub room_temp: f64,
    /// Outdoor temperature in °C.
    pub outdoor_temp: f64,
    /// Forecast outdoor temperature in °C.
    pub predicted_outdoor_temp: f64,
    /// What the forecast refers to, when the producer says so.
    pub predicted_for: Option<String>,
    pub fan: Fan,
    /// Most recent first, by arrival.
    pub notifications: Vec<Notification>,
    /// Most recent first, by arrival.
    pub alerts: Vec<Alert>,
    pub camera: Camera,
    /// Number of recorded room accesses.
    pub access_count: u32,
}

/// Energy draw summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Energy {
    /// Current period, kWh.
    pub current: f64,
    /// Previous period, kWh.
    pub previous: f64,
    /// Chronological, unique by date.
    pub history: Vec<EnergyPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Direction of the current energy period against the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
}

impl Energy {
    /// `Up` only when strictly above the previous period.
    pub fn trend(&self) -> Trend {
        if self.current > self.previous {
            Trend::Up
        } else {
            Trend::Down
        }
    }

    /// Absolute change against the previous period, in percent.
    ///
    /// `None` when there is no previous value to compare with.
    pub fn change_percent(&self) -> Option<f64> {
        if self.previous.abs() < f64::EPSILON {
            return None;
        }
        Some(((self.current - self.previous) / self.previous * 100.0).abs())
    }
}

/// Cooling fan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fan {
    pub active: bool,
    /// 0–100. Only meaningful while `active`.
    pub speed_percent: u8,
}

impl Fan {
    /// Speed to show: the reported speed while active, 0 otherwise.
    pub fn display_speed(self) -> u8 {
        if self.active { self.speed_percent } else { 0 }
    }
}

/// Security camera.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    pub online: bool,
    /// Opaque frame reference (URL or path), if the camera publishes one.
    pub frame_ref: Option<String>,
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn default_view_is_empty() {
        let view = ViewModel::default();
        assert!(view.energy.history.is_empty());
        assert!(view.notifications.is_empty());
        assert!(view.alerts.is_empty());
        assert!(!view.fan.active);
        assert!(!view.camera.online);
        assert!(view.camera.frame_ref.is_none());
        assert_eq!(view.access_count, 0);
    }

    #[test]
    fn inactive_fan_displays_zero_speed() {
        let fan = Fan {
            active: false,
            speed_percent: 60,
        };
        assert_eq!(fan.display_speed(), 0);
        assert_eq!(fan.speed_percent, 60);

        let running = Fan {
            active: true,
            ..fan
        };
        assert_eq!(running.display_speed(), 60);
    }

    #[test]
    fn energy_trend_and_change() {
        let energy = Energy {
            current: 245.0,
            previous: 210.0,
            history: Vec::new(),
        };
        assert_eq!(energy.trend(), Trend::Up);
        let pct = energy.change_percent().unwrap_or_default();
        assert!((pct - 16.666_666).abs() < 0.001);

        let flat = Energy {
            current: 210.0,
            ..energy.clone()
        };
        assert_eq!(flat.trend(), Trend::Down);

        let no_baseline = Energy {
            previous: 0.0,
            ..energy
        };
        assert!(no_baseline.change_percent().is_none());
    }
}
