//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use btrate_config::ConfigError;
use btrate_core::{CoreError, DecodeError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const BACKEND: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const REBUILD: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Audio backend ────────────────────────────────────────────────
    #[error("Audio backend unavailable: {reason}")]
    #[diagnostic(
        code(btrate::backend_unavailable),
        help(
            "Check that PipeWire (with pipewire-pulse) or PulseAudio is running.\n\
             Try: pactl info\n\
             Pin a listing source with --backend pactl|pw-dump"
        )
    )]
    BackendUnavailable { reason: String },

    #[error("Audio backend timed out: {reason}")]
    #[diagnostic(
        code(btrate::timeout),
        help("Raise [monitor].enumerate_timeout_ms in the config file if the server is slow.")
    )]
    Timeout { reason: String },

    #[error("No connected device matches '{identifier}'")]
    #[diagnostic(
        code(btrate::device_not_found),
        help("Run: btrate status  to list connected devices")
    )]
    DeviceNotFound { identifier: String },

    // ── Rebuild ──────────────────────────────────────────────────────
    #[error(
        "Codec rebuild failed{}: {message}",
        exit_code.map(|c| format!(" (exit status {c})")).unwrap_or_default()
    )]
    #[diagnostic(
        code(btrate::rebuild_failed),
        help("The tool restores its own backup on failure. Re-run with -v for its full output.")
    )]
    RebuildFailed {
        message: String,
        exit_code: Option<i32>,
    },

    #[error("No rebuild tool configured")]
    #[diagnostic(
        code(btrate::no_rebuild_tool),
        help(
            "Set [rebuild].program (and optionally args) in {path}\n\
             Or export BTRATE_REBUILD__PROGRAM=/path/to/tool"
        )
    )]
    NoRebuildTool { path: String },

    // ── Input ────────────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(btrate::validation))]
    Validation { field: String, reason: String },

    #[error("Could not decode configuration: {0}")]
    #[diagnostic(
        code(btrate::decode),
        help("Expected four SBC configuration bytes, e.g. 2115022f.")
    )]
    Decode(#[from] DecodeError),

    // ── Configuration ────────────────────────────────────────────────
    #[error("Config file already exists at {path}")]
    #[diagnostic(code(btrate::config_exists), help("Use --force to overwrite it."))]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(btrate::config))]
    Config(ConfigError),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BackendUnavailable { .. } => exit_code::BACKEND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::RebuildFailed { .. } => exit_code::REBUILD,
            Self::Validation { .. }
            | Self::Decode(_)
            | Self::NoRebuildTool { .. }
            | Self::ConfigExists { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Enumeration(e) if e.timed_out() => Self::Timeout {
                reason: e.to_string(),
            },
            CoreError::Enumeration(e) => {
                let btrate_core::EnumerationError::BackendUnavailable { reason, .. } = e;
                Self::BackendUnavailable { reason }
            }
            CoreError::Decode(e) => Self::Decode(e),
            CoreError::Fetch(e) => Self::Internal(e.to_string()),
            CoreError::Rebuild { message, exit_code } => Self::RebuildFailed { message, exit_code },
            CoreError::Validation { message } => Self::Validation {
                field: "input".into(),
                reason: message,
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}
