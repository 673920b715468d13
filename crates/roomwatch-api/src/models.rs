// Wire types for the four request/response resources.
//
// These mirror the JSON the backend serves (camelCase keys). Conversion
// into the canonical view-model lives in `roomwatch-core`.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier of a notification or alert.
///
/// The backend emits numeric ids today, but string ids are accepted so a
/// producer switching to UUIDs does not break decoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ItemId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

/// `GET /api/energy`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyResponse {
    pub current: f64,
    pub previous: f64,
    #[serde(default)]
    pub history: Vec<EnergyPointResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyPointResponse {
    pub date: NaiveDate,
    pub value: f64,
}

/// `GET /api/temperature`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureResponse {
    pub room_temp: f64,
    pub outdoor_temp: f64,
    pub predicted_temp: f64,
}

/// `GET /api/cooling`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoolingResponse {
    /// Whether the fan is running.
    pub status: bool,
    /// Fan speed in percent.
    pub speed: f64,
}

/// `GET /api/security`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityResponse {
    #[serde(default)]
    pub notifications: Vec<FeedItemResponse>,
    #[serde(default)]
    pub alerts: Vec<FeedItemResponse>,
    pub camera_status: bool,
    #[serde(default)]
    pub camera_data: Option<String>,
    /// Number of recorded room accesses. Older backends omit it.
    #[serde(default)]
    pub access_count: u32,
}

/// One entry of the notification or alert feed, as sent on the wire.
///
/// Shared by the security resource and the `securityAlert` /
/// `notification` push events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItemResponse {
    pub id: ItemId,
    pub message: String,
    /// Display timestamp, opaque ("10:23 AM", "Yesterday", ISO-8601...).
    pub time: String,
    /// `normal`, `warning` or `critical`.
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "normal".into()
}
