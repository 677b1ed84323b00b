// ── SBC configuration decoder ──
//
// A2DP SBC codec-specific information element, as stored by BlueZ in
// `MediaTransport1.Configuration`. SBC-XQ reuses the same layout.
//
//   byte 0: sampling frequency (7..4) | channel mode (3..0)
//   byte 1: block length (7..4) | subbands (3..2) | allocation (1..0)
//   byte 2: minimum bitpool
//   byte 3: maximum bitpool
//
// A negotiated configuration has exactly one bit set in each field.

use crate::error::{DecodeError, SbcField};
use crate::model::{
    AllocationMethod, BlockLength, ChannelMode, DecodedSbcParams, RawTransportConfig, SampleRate,
    Subbands,
};

pub const SBC_CONFIG_LEN: usize = 4;
pub const MIN_BITPOOL: u8 = 2;
pub const MAX_BITPOOL: u8 = 250;

/// Decode a raw transport configuration into validated SBC parameters.
pub fn decode(raw: &RawTransportConfig) -> Result<DecodedSbcParams, DecodeError> {
    if !raw.codec.is_sbc_family() {
        return Err(DecodeError::UnsupportedCodec {
            codec: raw.codec.to_string(),
        });
    }
    let &[b0, b1, min_bitpool, max_bitpool] = raw.bytes.as_slice() else {
        return Err(DecodeError::MalformedLength {
            expected: SBC_CONFIG_LEN,
            actual: raw.bytes.len(),
        });
    };

    let sample_rate_hz = match b0 & 0xf0 {
        0x80 => SampleRate::Hz16000,
        0x40 => SampleRate::Hz32000,
        0x20 => SampleRate::Hz44100,
        0x10 => SampleRate::Hz48000,
        bits => return Err(unknown(SbcField::SampleRate, bits)),
    };
    let channel_mode = match b0 & 0x0f {
        0x08 => ChannelMode::Mono,
        0x04 => ChannelMode::DualChannel,
        0x02 => ChannelMode::Stereo,
        0x01 => ChannelMode::JointStereo,
        bits => return Err(unknown(SbcField::ChannelMode, bits)),
    };
    let block_length = match b1 & 0xf0 {
        0x80 => BlockLength::Four,
        0x40 => BlockLength::Eight,
        0x20 => BlockLength::Twelve,
        0x10 => BlockLength::Sixteen,
        bits => return Err(unknown(SbcField::BlockLength, bits)),
    };
    let subbands = match b1 & 0x0c {
        0x08 => Subbands::Four,
        0x04 => Subbands::Eight,
        bits => return Err(unknown(SbcField::Subbands, bits)),
    };
    let allocation_method = match b1 & 0x03 {
        0x02 => AllocationMethod::Snr,
        0x01 => AllocationMethod::Loudness,
        bits => return Err(unknown(SbcField::AllocationMethod, bits)),
    };

    DecodedSbcParams::try_new(
        sample_rate_hz,
        channel_mode,
        block_length,
        subbands,
        allocation_method,
        min_bitpool,
        max_bitpool,
    )
}

/// Inverse of [`decode`]: the four configuration bytes for a parameter set.
pub fn encode(params: &DecodedSbcParams) -> [u8; SBC_CONFIG_LEN] {
    let rate = match params.sample_rate_hz {
        SampleRate::Hz16000 => 0x80,
        SampleRate::Hz32000 => 0x40,
        SampleRate::Hz44100 => 0x20,
        SampleRate::Hz48000 => 0x10,
    };
    let mode = match params.channel_mode {
        ChannelMode::Mono => 0x08,
        ChannelMode::DualChannel => 0x04,
        ChannelMode::Stereo => 0x02,
        ChannelMode::JointStereo => 0x01,
    };
    let blocks = match params.block_length {
        BlockLength::Four => 0x80,
        BlockLength::Eight => 0x40,
        BlockLength::Twelve => 0x20,
        BlockLength::Sixteen => 0x10,
    };
    let subbands = match params.subbands {
        Subbands::Four => 0x08,
        Subbands::Eight => 0x04,
    };
    let allocation = match params.allocation_method {
        AllocationMethod::Snr => 0x02,
        AllocationMethod::Loudness => 0x01,
    };
    [
        rate | mode,
        blocks | subbands | allocation,
        params.min_bitpool,
        params.bitpool,
    ]
}

/// Legal bitpool range `(low, high)` for a channel mode and subband count.
pub fn bitpool_range(channel_mode: ChannelMode, subbands: Subbands) -> (u8, u8) {
    let per_subband: u32 = match channel_mode {
        ChannelMode::Mono | ChannelMode::DualChannel => 16,
        ChannelMode::Stereo | ChannelMode::JointStereo => 32,
    };
    let high = (per_subband * subbands.count()).min(u32::from(MAX_BITPOOL));
    (MIN_BITPOOL, u8::try_from(high).unwrap_or(MAX_BITPOOL))
}

/// Highest bitpool a stock encoder offers in dual channel mode.
pub fn stock_dual_channel_bitpool(sample_rate: SampleRate) -> u8 {
    match sample_rate {
        SampleRate::Hz48000 => 29,
        SampleRate::Hz16000 | SampleRate::Hz32000 | SampleRate::Hz44100 => 32,
    }
}

/// SBC-XQ heuristic: dual channel driven above the stock ceiling.
///
/// SBC-XQ is not signalled on the wire. This is an inference from the
/// operating point and must not be treated as codec identification.
pub fn is_dual_channel_xq(channel_mode: ChannelMode, sample_rate: SampleRate, bitpool: u8) -> bool {
    channel_mode == ChannelMode::DualChannel && bitpool > stock_dual_channel_bitpool(sample_rate)
}

impl DecodedSbcParams {
    /// Build a validated parameter set; the bitpool bounds are checked and
    /// the SBC-XQ flag derived.
    pub fn try_new(
        sample_rate_hz: SampleRate,
        channel_mode: ChannelMode,
        block_length: BlockLength,
        subbands: Subbands,
        allocation_method: AllocationMethod,
        min_bitpool: u8,
        bitpool: u8,
    ) -> Result<Self, DecodeError> {
        let (low, high) = bitpool_range(channel_mode, subbands);
        if min_bitpool < low || bitpool > high || min_bitpool > bitpool {
            return Err(DecodeError::BitpoolOutOfRange {
                min: min_bitpool,
                max: bitpool,
                low,
                high,
            });
        }
        Ok(Self {
            sample_rate_hz,
            channel_mode,
            block_length,
            subbands,
            allocation_method,
            min_bitpool,
            bitpool,
            is_dual_channel_xq: is_dual_channel_xq(channel_mode, sample_rate_hz, bitpool),
        })
    }
}

fn unknown(field: SbcField, bits: u8) -> DecodeError {
    DecodeError::UnknownField { field, bits }
}
