// ── Core error types ──
//
// Engine-level errors. Consumers never see HTTP status codes or frame
// parse failures directly: the `From<roomwatch_api::Error>` impl folds
// transport-layer errors into the three failure classes the engine
// distinguishes (source unavailable, stream disconnected, malformed event).

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Source errors ────────────────────────────────────────────────
    /// A fetch failed or timed out. Recoverable: the poller retries on its
    /// next tick; only the initial load surfaces it to the caller.
    #[error("Source '{resource}' unavailable: {reason}")]
    SourceUnavailable { resource: String, reason: String },

    /// The push stream dropped. Recovered automatically by backoff.
    #[error("Push stream disconnected: {reason}")]
    StreamDisconnected { reason: String },

    /// An event with an unexpected shape. Dropped and logged.
    #[error("Malformed event: {reason}")]
    MalformedEvent { reason: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Engine is shut down")]
    EngineClosed,

    #[error("Engine already started")]
    AlreadyStarted,

    #[error("Engine not started")]
    NotStarted,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub(crate) fn unavailable(resource: &str, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            resource: resource.to_owned(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` if the engine keeps running through this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable { .. }
                | Self::StreamDisconnected { .. }
                | Self::MalformedEvent { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<roomwatch_api::Error> for CoreError {
    fn from(err: roomwatch_api::Error) -> Self {
        use roomwatch_api::Error as Api;

        match err {
            Api::Http { ref resource, .. } => Self::unavailable(resource, &err),
            Api::Deserialization { ref message, .. } => {
                let resource = message.split(':').next().unwrap_or("resource").to_owned();
                Self::unavailable(&resource, &err)
            }
            Api::Transport(ref e) => {
                let resource = e
                    .url()
                    .and_then(|u| u.path_segments()?.next_back().map(str::to_owned))
                    .unwrap_or_else(|| "resource".into());
                Self::unavailable(&resource, &err)
            }
            Api::Timeout { .. } => Self::unavailable("resource", &err),
            Api::InvalidUrl(e) => Self::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Tls(msg) => Self::Config {
                message: format!("TLS error: {msg}"),
            },
            Api::WebSocketConnect(_) | Api::WebSocketClosed { .. } | Api::IdleTimeout { .. } => {
                Self::StreamDisconnected {
                    reason: err.to_string(),
                }
            }
            Api::MalformedFrame { reason } => Self::MalformedEvent { reason },
        }
    }
}
