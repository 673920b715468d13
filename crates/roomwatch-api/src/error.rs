use thiserror::Error;

/// Top-level error type for the `roomwatch-api` crate.
///
/// Covers every failure mode of the two inbound channels: the
/// request/response resources and the push event stream.
/// `roomwatch-core` maps these into engine-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Resources ───────────────────────────────────────────────────
    /// A resource answered with a non-success status.
    #[error("Resource '{resource}' returned HTTP {status}")]
    Http { resource: String, status: u16 },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Push stream ─────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed by the peer.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// No traffic at all within the liveness window.
    #[error("Push stream idle for {idle_secs}s")]
    IdleTimeout { idle_secs: u64 },

    /// A push frame that does not match any known shape.
    #[error("Malformed push frame: {reason}")]
    MalformedFrame { reason: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => *status >= 500,
            Self::Timeout { .. }
            | Self::WebSocketConnect(_)
            | Self::WebSocketClosed { .. }
            | Self::IdleTimeout { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Http { status: 404, .. } => true,
            _ => false,
        }
    }
}
