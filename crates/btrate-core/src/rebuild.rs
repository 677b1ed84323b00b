// ── Codec rebuild contract ──
//
// Domain-side wrapper around `btrate_api::RebuildTool`: validates the
// requested operating point, fills in the configured release tag and
// turns tool failure into `CoreError::Rebuild`.

use tokio::sync::mpsc;
use tracing::{info, warn};

use btrate_api::{OutputLine, RebuildOutcome, RebuildRequest, RebuildTool};

use crate::codec::{bitpool_range, stock_dual_channel_bitpool};
use crate::error::CoreError;
use crate::model::{ChannelMode, SampleRate, Subbands};

/// Runs the external rebuild tool for dual channel SBC-XQ bitpools.
#[derive(Debug, Clone)]
pub struct CodecRebuild {
    tool: RebuildTool,
    default_tag: Option<String>,
}

impl CodecRebuild {
    pub fn new(tool: RebuildTool) -> Self {
        Self {
            tool,
            default_tag: None,
        }
    }

    /// Release tag used when a request names none.
    #[must_use]
    pub fn with_default_tag(mut self, tag: Option<String>) -> Self {
        self.default_tag = tag.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn tool(&self) -> &RebuildTool {
        &self.tool
    }

    /// Validate a request and apply defaults, without running anything.
    ///
    /// The patched encoder drives dual channel mode at 8 subbands, so both
    /// bitpools must lie inside that mode's legal range.
    pub fn prepare(&self, request: RebuildRequest) -> Result<RebuildRequest, CoreError> {
        let (low, high) = bitpool_range(ChannelMode::DualChannel, Subbands::Eight);
        check_bitpool("bitpool", request.bitpool, low, high)?;
        if let Some(bitpool_48k) = request.bitpool_48k {
            check_bitpool("bitpool-48k", bitpool_48k, low, high)?;
        }
        if request.bitpool <= stock_dual_channel_bitpool(SampleRate::Hz44100) {
            warn!(
                bitpool = request.bitpool,
                "bitpool does not exceed the stock dual channel ceiling"
            );
        }
        if let Some(ref tag) = request.pipewire_tag {
            if tag.trim().is_empty() || tag.chars().any(char::is_whitespace) {
                return Err(CoreError::Validation {
                    message: format!("invalid PipeWire tag `{tag}`"),
                });
            }
        }

        Ok(RebuildRequest {
            pipewire_tag: request.pipewire_tag.or_else(|| self.default_tag.clone()),
            ..request
        })
    }

    /// Run the tool to completion, forwarding its output to `lines`.
    ///
    /// Only a successful outcome is returned; any other result becomes
    /// [`CoreError::Rebuild`] carrying the tool's exit code and last
    /// error line.
    pub async fn run(
        &self,
        request: RebuildRequest,
        lines: Option<mpsc::UnboundedSender<OutputLine>>,
    ) -> Result<RebuildOutcome, CoreError> {
        let request = self.prepare(request)?;
        let outcome = self
            .tool
            .run(&request, lines)
            .await
            .map_err(|e| CoreError::Rebuild {
                message: e.to_string(),
                exit_code: None,
            })?;

        if !outcome.success {
            let message = outcome.last_error_line.clone().unwrap_or_else(|| {
                outcome.exit_code.map_or_else(
                    || "terminated by signal".to_owned(),
                    |code| format!("exited with status {code}"),
                )
            });
            return Err(CoreError::Rebuild {
                message,
                exit_code: outcome.exit_code,
            });
        }

        info!(
            backup = ?outcome.backup_path,
            "codec rebuild installed; reconnect the device to renegotiate"
        );
        Ok(outcome)
    }
}

fn check_bitpool(name: &str, value: u8, low: u8, high: u8) -> Result<(), CoreError> {
    if (low..=high).contains(&value) {
        Ok(())
    } else {
        Err(CoreError::Validation {
            message: format!("{name} {value} outside {low}..={high}"),
        })
    }
}
