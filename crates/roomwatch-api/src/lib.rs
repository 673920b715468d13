// roomwatch-api: Async clients for the dashboard resources and push event stream

pub mod client;
pub mod error;
pub mod models;
pub mod push;
pub mod stream;
pub mod transport;

pub use client::DashboardClient;
pub use error::Error;
pub use models::{
    CoolingResponse, EnergyPointResponse, EnergyResponse, FeedItemResponse, ItemId,
    SecurityResponse, TemperatureResponse,
};
pub use push::{Frame, PushEvent};
pub use stream::{
    Connection, Connector, EventStreamHandle, Inbound, ReconnectConfig, StreamLifecycle,
    StreamSettings, StreamState, WsConnector,
};
pub use transport::{TlsMode, TransportConfig};
