// ── Request/response sources ──
//
// The loader and poller only need "fetch the four resources". Abstracting
// that behind a trait keeps the engine independent of HTTP, so tests and
// embedders can supply their own producer.

use std::future::Future;

use roomwatch_api::{
    CoolingResponse, DashboardClient, EnergyResponse, Error, SecurityResponse,
    TemperatureResponse,
};

/// Something that can serve the four dashboard resources.
pub trait DashboardSource: Send + Sync + 'static {
    fn energy(&self) -> impl Future<Output = Result<EnergyResponse, Error>> + Send;
    fn temperature(&self) -> impl Future<Output = Result<TemperatureResponse, Error>> + Send;
    fn cooling(&self) -> impl Future<Output = Result<CoolingResponse, Error>> + Send;
    fn security(&self) -> impl Future<Output = Result<SecurityResponse, Error>> + Send;
}

impl DashboardSource for DashboardClient {
    async fn energy(&self) -> Result<EnergyResponse, Error> {
        DashboardClient::energy(self).await
    }

    async fn temperature(&self) -> Result<TemperatureResponse, Error> {
        DashboardClient::temperature(self).await
    }

    async fn cooling(&self) -> Result<CoolingResponse, Error> {
        DashboardClient::cooling(self).await
    }

    async fn security(&self) -> Result<SecurityResponse, Error> {
        DashboardClient::security(self).await
    }
}
