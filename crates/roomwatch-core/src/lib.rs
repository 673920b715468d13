// roomwatch-core: Live state synchronization between the dashboard sources and observers.

pub mod broadcast;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod loader;
pub mod model;
pub mod poller;
pub mod source;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use broadcast::{Broadcaster, Subscription, SubscriptionId};
pub use config::{EngineConfig, SourceConfig, StreamConfig, TlsVerification};
pub use engine::{Engine, EngineState};
pub use error::CoreError;
pub use loader::SnapshotLoader;
pub use poller::RefreshOutcome;
pub use source::DashboardSource;
pub use store::{Mutation, Origin, Patch, Reconciler, ViewStore};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Alert, Camera, Energy, EnergyPoint, Fan, ItemId, Notification, Severity, Trend, ViewModel,
};

// Stream types consumers observe through the engine.
pub use roomwatch_api::{ReconnectConfig, StreamState};
