//! Offline decode of a configuration blob, and the report shared with `estimate`.

use serde::Serialize;

use btrate_core::{BitrateEstimate, Codec, DecodedSbcParams, RawTransportConfig, codec};

use crate::cli::{CodecArg, DecodeArgs};
use crate::error::CliError;
use crate::output;

use super::Ctx;
use super::status::khz;

/// Everything derivable from one SBC parameter set.
#[derive(Debug, Serialize)]
pub struct CodecReport {
    pub configuration: String,
    pub params: DecodedSbcParams,
    pub bitrate: BitrateEstimate,
    /// Bytes per SBC frame.
    pub frame_length: u32,
}

impl CodecReport {
    pub fn new(params: DecodedSbcParams) -> Self {
        let configuration = RawTransportConfig::new(Codec::Sbc, codec::encode(&params)).hex();
        Self {
            configuration,
            params,
            bitrate: codec::estimate(&params),
            frame_length: codec::frame_length(&params),
        }
    }

    pub fn detail(&self) -> String {
        let p = &self.params;
        let mut lines = vec![
            format!("Configuration: {}", self.configuration),
            format!("Sample rate:   {}", khz(p.sample_rate_hz.hz())),
            format!("Channel mode:  {}", p.channel_mode.label()),
            format!("Blocks:        {}", p.block_length.count()),
            format!("Subbands:      {}", p.subbands.count()),
            format!("Allocation:    {}", p.allocation_method),
            format!("Bitpool:       {}..{}", p.min_bitpool, p.bitpool),
            format!("Frame length:  {} bytes", self.frame_length),
            format!("Bitrate:       {}", self.bitrate),
        ];
        if let Some(per_channel) = self.bitrate.per_channel_kbps {
            lines.push(format!("Per channel:   {per_channel:.1} kbps"));
        }
        let xq = if p.is_dual_channel_xq {
            format!(
                "likely (dual channel above the stock bitpool {})",
                codec::stock_dual_channel_bitpool(p.sample_rate_hz)
            )
        } else {
            "no".to_owned()
        };
        lines.push(format!("SBC-XQ:        {xq}"));
        lines.join("\n")
    }

    pub fn plain(&self) -> String {
        format!("{:.1}", self.bitrate.kbps)
    }
}

/// Parse `2115022f`, `0x2115022f`, `21 15 02 2f` or `21:15:02:2f`.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, CliError> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<u8> = body
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && !matches!(b, b':' | b'-' | b'_'))
        .collect();

    let invalid = |reason: &str| CliError::Validation {
        field: "hex".into(),
        reason: reason.into(),
    };
    if digits.is_empty() {
        return Err(invalid("no bytes given"));
    }
    if digits.len() % 2 != 0 {
        return Err(invalid("odd number of hex digits"));
    }
    digits
        .chunks_exact(2)
        .map(|pair| {
            let hi = hex_value(pair[0]).ok_or_else(|| invalid("not a hex digit"))?;
            let lo = hex_value(pair[1]).ok_or_else(|| invalid("not a hex digit"))?;
            Ok((hi << 4) | lo)
        })
        .collect()
}

fn hex_value(digit: u8) -> Option<u8> {
    char::from(digit)
        .to_digit(16)
        .and_then(|v| u8::try_from(v).ok())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: &DecodeArgs, ctx: Ctx) -> Result<(), CliError> {
    let kind = match args.codec {
        CodecArg::Sbc => Codec::Sbc,
        CodecArg::SbcXq => Codec::SbcXq,
    };
    let raw = RawTransportConfig::new(kind, parse_hex(&args.hex)?);
    let params = codec::decode(&raw)?;
    let report = CodecReport::new(params);

    let out = output::render_single(ctx.format, &report, CodecReport::detail, CodecReport::plain);
    output::print_output(&out, ctx.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hex_forms_are_accepted() {
        let expected = vec![0x21, 0x15, 0x02, 0x2f];
        assert_eq!(parse_hex("2115022f").unwrap(), expected);
        assert_eq!(parse_hex("0x2115022F").unwrap(), expected);
        assert_eq!(parse_hex(" 21 15 02 2f ").unwrap(), expected);
        assert_eq!(parse_hex("21:15:02:2f").unwrap(), expected);
    }

    #[test]
    fn bad_hex_is_rejected() {
        assert!(parse_hex("").is_err());
        assert!(parse_hex("211").is_err());
        assert!(parse_hex("21zz").is_err());
    }

    #[test]
    fn report_round_trips_the_configuration() {
        let raw = RawTransportConfig::new(Codec::Sbc, parse_hex("2415022f").unwrap());
        let report = CodecReport::new(codec::decode(&raw).unwrap());
        assert_eq!(report.configuration, "2415022f");
        assert!(report.params.is_dual_channel_xq);
        assert!(report.detail().contains("Dual Channel"));
        assert!(report.bitrate.per_channel_kbps.is_some());
    }
}
