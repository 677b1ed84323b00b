use thiserror::Error;

/// Top-level error type for the `btrate-api` crate.
///
/// Covers every failure mode of the platform adapters: spawning the
/// reporting tools, their exit status, timeouts, and output parsing.
/// `btrate-core` maps these into the domain taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Process ─────────────────────────────────────────────────────
    /// The program could not be started at all (missing binary, permissions).
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran but reported failure.
    #[error("{program} exited with {}: {stderr}", code.map_or_else(|| "signal".to_owned(), |c| format!("status {c}")))]
    ExitStatus {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The program did not finish within the configured deadline.
    #[error("{program} timed out after {timeout_ms}ms")]
    Timeout { program: String, timeout_ms: u64 },

    // ── Data ────────────────────────────────────────────────────────
    /// Output could not be parsed, with the raw body for debugging.
    #[error("deserialization error: {message}")]
    Deserialization { message: String, body: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if the program itself is missing or unusable, as
    /// opposed to running and failing.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Spawn { .. })
    }

    /// Returns `true` if this error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
