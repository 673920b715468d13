//! Configuration for the roomwatch engine and CLI.
//!
//! One TOML file layered under `ROOMWATCH_*` environment variables, and
//! its translation into [`roomwatch_core::EngineConfig`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use roomwatch_core::{EngineConfig, ReconnectConfig, SourceConfig, StreamConfig, TlsVerification};

/// Environment variable prefix. Nested keys use `__`, e.g.
/// `ROOMWATCH_SOURCE__BASE_URL`.
pub const ENV_PREFIX: &str = "ROOMWATCH_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file already exists at {}", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceSection,

    #[serde(default)]
    pub refresh: RefreshSection,

    #[serde(default)]
    pub stream: StreamSection,

    #[serde(default)]
    pub feeds: FeedsSection,

    #[serde(default)]
    pub observers: ObserversSection,
}

/// Where the dashboard backend lives.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SourceSection {
    /// Backend root, e.g. "http://localhost:8000".
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token (plaintext; prefer `api_token_env`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Environment variable holding the bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token_env: Option<String>,

    /// Path to a custom CA certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    /// Accept invalid TLS certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Per-resource fetch timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token: None,
            api_token_env: None,
            ca_cert: None,
            insecure: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RefreshSection {
    /// Full refresh period. `0` disables periodic refresh.
    #[serde(default)]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StreamSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Push endpoint. Defaults to the source `base_url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Abandon a connection attempt that has not completed the handshake.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Reconnect after this long without any inbound traffic.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_secs: default_max_delay_secs(),
            multiplier: default_multiplier(),
            connect_timeout_secs: default_connect_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FeedsSection {
    /// Maximum notifications and alerts kept. `0` keeps everything.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

impl Default for FeedsSection {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObserversSection {
    /// Updates queued per observer before the oldest is dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for ObserversSection {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".into()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_initial_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_secs() -> u64 {
    30
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_idle_timeout_secs() -> u64 {
    45
}
fn default_max_items() -> usize {
    50
}
fn default_queue_capacity() -> usize {
    16
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "roomwatch", "roomwatch").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("roomwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Defaults, then the TOML file at `path` (if present), then environment.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load the config from `path`, or from [`config_path()`] when `None`.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    let config: Config = figment(&path).extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Write a starter config with default values. Refuses to overwrite an
/// existing file unless `force` is set.
pub fn write_default(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    save_config(&Config::default(), path)
}

// ── Translation to engine settings ──────────────────────────────────

impl Config {
    /// Bearer token: the `api_token_env` variable wins over `api_token`.
    pub fn api_token(&self) -> Option<SecretString> {
        self.source
            .api_token_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .or_else(|| self.source.api_token.clone())
            .filter(|t| !t.is_empty())
            .map(SecretString::from)
    }

    /// Copy with the plaintext token masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.source.api_token.is_some() {
            copy.source.api_token = Some("********".into());
        }
        copy
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Build the engine configuration.
    pub fn to_engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let base_url = parse_url("source.base_url", &self.source.base_url)?;

        let tls = if self.source.insecure {
            TlsVerification::DangerAcceptInvalid
        } else if let Some(ref ca) = self.source.ca_cert {
            TlsVerification::CustomCa(ca.clone())
        } else {
            TlsVerification::SystemDefaults
        };

        let source = SourceConfig {
            base_url: base_url.clone(),
            tls,
            api_token: self.api_token(),
            fetch_timeout: Duration::from_secs(self.source.timeout_secs),
        };

        let stream = if self.stream.enabled {
            let url = match self.stream.url {
                Some(ref raw) => parse_url("stream.url", raw)?,
                None => base_url,
            };
            if !self.stream.multiplier.is_finite() || self.stream.multiplier < 1.0 {
                return Err(invalid("stream.multiplier", "must be a number >= 1.0"));
            }
            Some(StreamConfig {
                url,
                reconnect: ReconnectConfig {
                    initial_delay: Duration::from_millis(self.stream.initial_delay_ms),
                    max_delay: Duration::from_secs(self.stream.max_delay_secs),
                    multiplier: self.stream.multiplier,
                },
                connect_timeout: Duration::from_secs(self.stream.connect_timeout_secs),
                idle_timeout: Duration::from_secs(self.stream.idle_timeout_secs),
            })
        } else {
            None
        };

        let mut config = EngineConfig::new(source.base_url.clone());
        config.source = source;
        config.stream = stream;
        config.refresh_interval = (self.refresh.interval_secs > 0)
            .then(|| Duration::from_secs(self.refresh.interval_secs));
        config.retention = (self.feeds.max_items > 0).then_some(self.feeds.max_items);
        config.observer_capacity = self.observers.queue_capacity;

        config
            .validate()
            .map_err(|e| invalid("engine settings", e.to_string()))?;
        Ok(config)
    }
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    raw.parse()
        .map_err(|e: url::ParseError| invalid(field, format!("'{raw}': {e}")))
}
