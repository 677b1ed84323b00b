// ── Core error types ──
//
// Decode and fetch failures are per-device and travel inside snapshots,
// so they are plain data (`Clone + Eq + Serialize`). Enumeration failure
// aborts a cycle. `CoreError` is what public entry points return; the
// `From<btrate_api::Error>` impl keeps process details out of the domain.

use serde::Serialize;
use thiserror::Error;

/// Bitfield of the SBC configuration layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SbcField {
    SampleRate,
    ChannelMode,
    BlockLength,
    Subbands,
    AllocationMethod,
}

/// Why a configuration blob could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodeError {
    #[error("configuration is {actual} bytes, expected {expected}")]
    MalformedLength { expected: usize, actual: usize },

    #[error("unrecognized {field} bits {bits:#04x}")]
    UnknownField { field: SbcField, bits: u8 },

    #[error("bitpool {min}..{max} outside legal range {low}..={high}")]
    BitpoolOutOfRange { min: u8, max: u8, low: u8, high: u8 },

    #[error("no decodable configuration layout for {codec}")]
    UnsupportedCodec { codec: String },
}

/// Why the negotiated configuration could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    /// Profile without a readable configuration, or negotiation in progress.
    #[error("no configuration exposed: {reason}")]
    NoConfigurationExposed { reason: String },

    /// The transport disappeared between enumeration and fetch.
    #[error("transport gone: {path}")]
    TransportGone { path: String },

    #[error("configuration fetch timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// The audio server could not be queried at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnumerationError {
    #[error("audio backend unavailable: {reason}")]
    BackendUnavailable { reason: String, timed_out: bool },
}

impl EnumerationError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            reason: reason.into(),
            timed_out: false,
        }
    }

    pub fn timed_out(&self) -> bool {
        let Self::BackendUnavailable { timed_out, .. } = self;
        *timed_out
    }
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Enumeration(#[from] EnumerationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    // ── Rebuild tool ─────────────────────────────────────────────────
    #[error("codec rebuild failed: {message}")]
    Rebuild {
        message: String,
        exit_code: Option<i32>,
    },

    // ── Caller input ─────────────────────────────────────────────────
    #[error("validation failed: {message}")]
    Validation { message: String },
}

// ── Conversion from adapter errors ───────────────────────────────────

impl From<btrate_api::Error> for EnumerationError {
    fn from(err: btrate_api::Error) -> Self {
        Self::BackendUnavailable {
            timed_out: err.is_timeout(),
            reason: err.to_string(),
        }
    }
}

impl From<btrate_api::Error> for FetchError {
    fn from(err: btrate_api::Error) -> Self {
        match err {
            btrate_api::Error::Timeout { timeout_ms, .. } => Self::Timeout { timeout_ms },
            other => Self::NoConfigurationExposed {
                reason: format!("device manager unreachable: {other}"),
            },
        }
    }
}
