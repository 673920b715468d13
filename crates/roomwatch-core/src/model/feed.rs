// ── Notification and alert feeds ──

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::ItemId;

/// How loud a feed entry is.
///
/// Notifications are always `Normal`; alerts are `Warning` or `Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

impl Severity {
    /// Whether this severity is valid for the alert feed.
    pub fn is_alert(self) -> bool {
        matches!(self, Self::Warning | Self::Critical)
    }
}

/// An entry of the notification feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: ItemId,
    pub message: String,
    /// Display timestamp as sent by the producer. Not used for ordering.
    pub timestamp: String,
}

impl Notification {
    pub fn severity(&self) -> Severity {
        Severity::Normal
    }
}

/// An entry of the alert feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: ItemId,
    pub message: String,
    /// Display timestamp as sent by the producer. Not used for ordering.
    pub timestamp: String,
    pub severity: Severity,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!("critical".parse::<Severity>().unwrap(), Severity::Critical);
        assert_eq!("WARNING".parse::<Severity>().unwrap(), Severity::Warning);
        assert!("panic".parse::<Severity>().is_err());
    }

    #[test]
    fn only_warning_and_critical_are_alert_levels() {
        assert!(!Severity::Normal.is_alert());
        assert!(Severity::Warning.is_alert());
        assert!(Severity::Critical.is_alert());
    }

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"critical\""
        );
        assert_eq!(Severity::Warning.to_string(), "warning");
    }
}
