// ── Domain model ──
//
// The canonical view-model and its parts. These are the only types
// observers ever see; wire shapes stay in `roomwatch-api`.

mod feed;
mod view;

pub use feed::{Alert, Notification, Severity};
pub use view::{Camera, Energy, EnergyPoint, Fan, Trend, ViewModel};

pub use roomwatch_api::ItemId;
