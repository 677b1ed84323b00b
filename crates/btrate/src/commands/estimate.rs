//! Bitrate calculator for hand-picked SBC parameters.

use btrate_core::{
    AllocationMethod, BlockLength, ChannelMode, DecodedSbcParams, SampleRate, Subbands, codec,
};

use crate::cli::{AllocationArg, EstimateArgs, ModeArg};
use crate::error::CliError;
use crate::output;

use super::Ctx;
use super::decode::CodecReport;

fn invalid(field: &str, reason: impl Into<String>) -> CliError {
    CliError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

/// Validated parameter set from the command line.
pub fn params_from_args(args: &EstimateArgs) -> Result<DecodedSbcParams, CliError> {
    let rate = SampleRate::from_hz(args.rate)
        .ok_or_else(|| invalid("rate", "expected 16000, 32000, 44100 or 48000"))?;
    let blocks = BlockLength::from_count(args.blocks)
        .ok_or_else(|| invalid("blocks", "expected 4, 8, 12 or 16"))?;
    let subbands =
        Subbands::from_count(args.subbands).ok_or_else(|| invalid("subbands", "expected 4 or 8"))?;
    let mode = match args.mode {
        ModeArg::Mono => ChannelMode::Mono,
        ModeArg::Dual => ChannelMode::DualChannel,
        ModeArg::Stereo => ChannelMode::Stereo,
        ModeArg::Joint => ChannelMode::JointStereo,
    };
    let allocation = match args.allocation {
        AllocationArg::Loudness => AllocationMethod::Loudness,
        AllocationArg::Snr => AllocationMethod::Snr,
    };

    DecodedSbcParams::try_new(
        rate,
        mode,
        blocks,
        subbands,
        allocation,
        codec::MIN_BITPOOL,
        args.bitpool,
    )
    .map_err(|e| invalid("bitpool", e.to_string()))
}

pub fn handle(args: &EstimateArgs, ctx: Ctx) -> Result<(), CliError> {
    let report = CodecReport::new(params_from_args(args)?);
    let out = output::render_single(ctx.format, &report, CodecReport::detail, CodecReport::plain);
    output::print_output(&out, ctx.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn args() -> EstimateArgs {
        EstimateArgs {
            rate: 44_100,
            mode: ModeArg::Dual,
            blocks: 16,
            subbands: 8,
            allocation: AllocationArg::Loudness,
            bitpool: 47,
        }
    }

    #[test]
    fn defaults_are_the_xq_operating_point() {
        let params = params_from_args(&args()).unwrap();
        assert!(params.is_dual_channel_xq);
        assert_eq!(params.min_bitpool, codec::MIN_BITPOOL);
        assert_eq!(params.block_length, BlockLength::Sixteen);
    }

    #[test]
    fn unsupported_values_are_rejected() {
        let bad_rate = EstimateArgs {
            rate: 22_050,
            ..args()
        };
        assert!(matches!(
            params_from_args(&bad_rate),
            Err(CliError::Validation { ref field, .. }) if field == "rate"
        ));

        let bad_bitpool = EstimateArgs {
            bitpool: 200,
            ..args()
        };
        assert!(params_from_args(&bad_bitpool).is_err());
    }
}
