// Resource HTTP client
//
// Wraps `reqwest::Client` with base-URL handling and body decoding for the
// four named dashboard resources. Every method is a single GET; the caller
// decides about concurrency, deadlines, and cancellation.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{CoolingResponse, EnergyResponse, SecurityResponse, TemperatureResponse};
use crate::transport::TransportConfig;

/// HTTP client for the dashboard backend's resource endpoints.
///
/// Resources live under `{base}/api/{name}`. The client is cheap to clone
/// (the inner `reqwest::Client` is reference counted).
#[derive(Debug, Clone)]
pub struct DashboardClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl DashboardClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the backend root (e.g. `http://localhost:8000`).
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, transport.timeout))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, timeout: Duration) -> Self {
        Self {
            http,
            base_url: with_trailing_slash(base_url),
            timeout,
        }
    }

    /// Convenience constructor for tests and scripts.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let url = Url::parse(base_url)?;
        Ok(Self::with_client(http, url, Duration::from_secs(10)))
    }

    /// The backend base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Resources ────────────────────────────────────────────────────

    /// Energy draw: current, previous, and the daily history.
    pub async fn energy(&self) -> Result<EnergyResponse, Error> {
        self.get("energy").await
    }

    /// Room, outdoor, and predicted outdoor temperatures.
    pub async fn temperature(&self) -> Result<TemperatureResponse, Error> {
        self.get("temperature").await
    }

    /// Fan status and speed.
    pub async fn cooling(&self) -> Result<CoolingResponse, Error> {
        self.get("cooling").await
    }

    /// Notifications, alerts, and camera status.
    pub async fn security(&self) -> Result<SecurityResponse, Error> {
        self.get("security").await
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn resource_url(&self, resource: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(&format!("api/{resource}"))?)
    }

    /// Send a GET request and decode the JSON body.
    async fn get<T: DeserializeOwned>(&self, resource: &str) -> Result<T, Error> {
        let url = self.resource_url(resource)?;
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Http {
                resource: resource.to_owned(),
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(|e| self.map_transport(e))?;

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{resource}: {e}"),
            body,
        })
    }

    fn map_transport(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            Error::Transport(err)
        }
    }
}

/// `Url::join` drops the last path segment unless the base ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn resource_urls_keep_base_path() {
        let client =
            DashboardClient::from_reqwest("http://gateway.local/dashboard", reqwest::Client::new())
                .unwrap();
        assert_eq!(
            client.resource_url("energy").unwrap().as_str(),
            "http://gateway.local/dashboard/api/energy"
        );
    }

    #[test]
    fn resource_urls_from_root() {
        let client =
            DashboardClient::from_reqwest("http://localhost:8000", reqwest::Client::new()).unwrap();
        assert_eq!(
            client.resource_url("security").unwrap().as_str(),
            "http://localhost:8000/api/security"
        );
    }
}
