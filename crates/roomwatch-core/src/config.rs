// ── Runtime engine configuration ──
//
// These types describe *where* the sources live and how the engine is
// tuned. They never touch disk: `roomwatch-config` (or the embedding
// application) builds an `EngineConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use roomwatch_api::{ReconnectConfig, StreamSettings, TlsMode, TransportConfig};
use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed gateways).
    DangerAcceptInvalid,
}

/// Request/response sources used by the loader and the poller.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Backend root; resources live under `{base_url}/api/`.
    pub base_url: Url,
    pub tls: TlsVerification,
    /// Bearer token, if the backend requires one.
    pub api_token: Option<SecretString>,
    /// Deadline for each individual fetch.
    pub fetch_timeout: Duration,
}

impl SourceConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            tls: TlsVerification::default(),
            api_token: None,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// Push stream settings.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Push endpoint (server root or full Socket.IO URL).
    pub url: Url,
    pub reconnect: ReconnectConfig,
    /// Deadline for one connection attempt, handshake included.
    pub connect_timeout: Duration,
    /// Force a reconnect after this long without inbound traffic.
    pub idle_timeout: Duration,
}

impl StreamConfig {
    pub fn new(url: Url) -> Self {
        let defaults = StreamSettings::default();
        Self {
            url,
            reconnect: defaults.reconnect,
            connect_timeout: defaults.connect_timeout,
            idle_timeout: defaults.idle_timeout,
        }
    }

    pub(crate) fn settings(&self) -> StreamSettings {
        StreamSettings {
            reconnect: self.reconnect.clone(),
            connect_timeout: self.connect_timeout,
            idle_timeout: self.idle_timeout,
        }
    }
}

/// Configuration for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub source: SourceConfig,
    /// `None` disables the push stream.
    pub stream: Option<StreamConfig>,
    /// Full refresh period. `None` disables the poller.
    pub refresh_interval: Option<Duration>,
    /// Maximum length of the notification and alert feeds. `None` = unbounded.
    pub retention: Option<usize>,
    /// Per-observer queue length before the oldest update is dropped.
    pub observer_capacity: usize,
    /// Pending mutations the reconciler queue holds before producers wait.
    pub mutation_capacity: usize,
}

impl EngineConfig {
    /// Snapshot-only configuration: no poller, no push stream.
    pub fn new(base_url: Url) -> Self {
        Self {
            source: SourceConfig::new(base_url),
            stream: None,
            refresh_interval: None,
            retention: None,
            observer_capacity: 16,
            mutation_capacity: 256,
        }
    }

    pub fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    pub fn with_retention(mut self, max_items: usize) -> Self {
        self.retention = Some(max_items);
        self
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.source.fetch_timeout.is_zero() {
            return Err(invalid("fetch timeout must be greater than zero"));
        }
        if self.refresh_interval.is_some_and(|i| i.is_zero()) {
            return Err(invalid("refresh interval must be greater than zero"));
        }
        if self.retention == Some(0) {
            return Err(invalid("retention must keep at least one item"));
        }
        if self.observer_capacity == 0 || self.mutation_capacity == 0 {
            return Err(invalid("queue capacities must be greater than zero"));
        }
        if let Some(ref stream) = self.stream {
            if stream.idle_timeout.is_zero() {
                return Err(invalid("stream idle timeout must be greater than zero"));
            }
            if stream.connect_timeout.is_zero() {
                return Err(invalid("stream connect timeout must be greater than zero"));
            }
            if stream.reconnect.max_delay < stream.reconnect.initial_delay {
                return Err(invalid("reconnect max delay is below the initial delay"));
            }
        }
        Ok(())
    }

    /// Transport settings for the resource client.
    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.source.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.source.fetch_timeout,
            api_token: self.source.api_token.clone(),
        }
    }
}

fn invalid(message: &str) -> CoreError {
    CoreError::Config {
        message: message.to_owned(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base() -> EngineConfig {
        EngineConfig::new("http://localhost:8000".parse().unwrap())
    }

    #[test]
    fn defaults_are_valid() {
        let config = base();
        assert!(config.validate().is_ok());
        assert!(config.stream.is_none());
        assert!(config.refresh_interval.is_none());
    }

    #[test]
    fn zero_retention_is_rejected() {
        assert!(base().with_retention(0).validate().is_err());
        assert!(base().with_retention(1).validate().is_ok());
    }

    #[test]
    fn zero_refresh_interval_is_rejected() {
        let config = base().with_refresh_interval(Duration::ZERO);
        assert!(matches!(config.validate(), Err(CoreError::Config { .. })));
    }

    #[test]
    fn inverted_backoff_bounds_are_rejected() {
        let mut stream = StreamConfig::new("http://localhost:8000".parse().unwrap());
        stream.reconnect.initial_delay = Duration::from_secs(60);
        assert!(base().with_stream(stream).validate().is_err());
    }

    #[test]
    fn zero_connect_timeout_is_rejected() {
        let mut stream = StreamConfig::new("http://localhost:8000".parse().unwrap());
        assert_eq!(stream.settings().connect_timeout, Duration::from_secs(10));
        stream.connect_timeout = Duration::ZERO;
        assert!(base().with_stream(stream).validate().is_err());
    }

    #[test]
    fn transport_mirrors_source_settings() {
        let mut config = base();
        config.source.tls = TlsVerification::DangerAcceptInvalid;
        config.source.fetch_timeout = Duration::from_secs(3);

        let transport = config.transport();
        assert!(matches!(transport.tls, TlsMode::DangerAcceptInvalid));
        assert_eq!(transport.timeout, Duration::from_secs(3));
    }
}
