//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use roomwatch_config::ConfigError;
use roomwatch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Sources ──────────────────────────────────────────────────────
    #[error("Could not load '{resource}' from the dashboard backend")]
    #[diagnostic(
        code(roomwatch::source_unavailable),
        help(
            "{reason}\n\
             Check that the backend is running and reachable, or pass --url."
        )
    )]
    SourceUnavailable { resource: String, reason: String },

    #[error("Received an event the engine could not apply")]
    #[diagnostic(code(roomwatch::malformed_event), help("{reason}"))]
    MalformedEvent { reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(
        code(roomwatch::validation),
        help("Run: roomwatch config show  to inspect the effective settings")
    )]
    Validation { field: String, reason: String },

    #[error("{message}")]
    #[diagnostic(
        code(roomwatch::config),
        help(
            "Create a starter file with: roomwatch config init\n\
             Expected at: {path}"
        )
    )]
    Config { message: String, path: String },

    // ── Engine ───────────────────────────────────────────────────────
    #[error("Engine error: {message}")]
    #[diagnostic(code(roomwatch::engine))]
    Engine { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(roomwatch::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SourceUnavailable { .. } => exit_code::CONNECTION,
            Self::Validation { .. } | Self::Config { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    pub fn from_config(err: ConfigError, path: &std::path::Path) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config {
                message: other.to_string(),
                path: path.display().to_string(),
            },
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::SourceUnavailable { resource, reason } => {
                Self::SourceUnavailable { resource, reason }
            }
            CoreError::MalformedEvent { reason } => Self::MalformedEvent { reason },
            CoreError::Config { message } => Self::Validation {
                field: "engine settings".into(),
                reason: message,
            },
            other => Self::Engine {
                message: other.to_string(),
            },
        }
    }
}
