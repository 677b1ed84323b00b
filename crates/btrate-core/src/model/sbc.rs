// ── SBC configuration types ──
//
// Every field is a closed enumeration. Numeric fields serialize as their
// numeric value so JSON output reads `"sample_rate_hz": 44100`.

use serde::{Deserialize, Serialize};
use strum::EnumIter;

use super::device::Codec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum SampleRate {
    Hz16000,
    Hz32000,
    Hz44100,
    Hz48000,
}

impl SampleRate {
    pub const fn hz(self) -> u32 {
        match self {
            Self::Hz16000 => 16_000,
            Self::Hz32000 => 32_000,
            Self::Hz44100 => 44_100,
            Self::Hz48000 => 48_000,
        }
    }

    pub fn from_hz(hz: u32) -> Option<Self> {
        match hz {
            16_000 => Some(Self::Hz16000),
            32_000 => Some(Self::Hz32000),
            44_100 => Some(Self::Hz44100),
            48_000 => Some(Self::Hz48000),
            _ => None,
        }
    }
}

impl From<SampleRate> for u32 {
    fn from(rate: SampleRate) -> Self {
        rate.hz()
    }
}

impl TryFrom<u32> for SampleRate {
    type Error = String;

    fn try_from(hz: u32) -> Result<Self, Self::Error> {
        Self::from_hz(hz).ok_or_else(|| format!("unsupported SBC sample rate {hz}"))
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChannelMode {
    Mono,
    DualChannel,
    Stereo,
    JointStereo,
}

impl ChannelMode {
    /// Audio channels carried in each frame.
    pub const fn channels(self) -> u32 {
        match self {
            Self::Mono => 1,
            Self::DualChannel | Self::Stereo | Self::JointStereo => 2,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Mono => "Mono",
            Self::DualChannel => "Dual Channel",
            Self::Stereo => "Stereo",
            Self::JointStereo => "Joint Stereo",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum BlockLength {
    Four,
    Eight,
    Twelve,
    Sixteen,
}

impl BlockLength {
    pub const fn count(self) -> u32 {
        match self {
            Self::Four => 4,
            Self::Eight => 8,
            Self::Twelve => 12,
            Self::Sixteen => 16,
        }
    }

    pub fn from_count(count: u32) -> Option<Self> {
        match count {
            4 => Some(Self::Four),
            8 => Some(Self::Eight),
            12 => Some(Self::Twelve),
            16 => Some(Self::Sixteen),
            _ => None,
        }
    }
}

impl From<BlockLength> for u32 {
    fn from(blocks: BlockLength) -> Self {
        blocks.count()
    }
}

impl TryFrom<u32> for BlockLength {
    type Error = String;

    fn try_from(count: u32) -> Result<Self, Self::Error> {
        Self::from_count(count).ok_or_else(|| format!("unsupported SBC block length {count}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum Subbands {
    Four,
    Eight,
}

impl Subbands {
    pub const fn count(self) -> u32 {
        match self {
            Self::Four => 4,
            Self::Eight => 8,
        }
    }

    pub fn from_count(count: u32) -> Option<Self> {
        match count {
            4 => Some(Self::Four),
            8 => Some(Self::Eight),
            _ => None,
        }
    }
}

impl From<Subbands> for u32 {
    fn from(subbands: Subbands) -> Self {
        subbands.count()
    }
}

impl TryFrom<u32> for Subbands {
    type Error = String;

    fn try_from(count: u32) -> Result<Self, Self::Error> {
        Self::from_count(count).ok_or_else(|| format!("unsupported SBC subband count {count}"))
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AllocationMethod {
    Loudness,
    Snr,
}

/// Validated SBC operating point.
///
/// Equality is field-wise; two parameter sets are "the same negotiation"
/// exactly when every field matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecodedSbcParams {
    pub sample_rate_hz: SampleRate,
    pub channel_mode: ChannelMode,
    pub block_length: BlockLength,
    pub subbands: Subbands,
    pub allocation_method: AllocationMethod,
    /// Lower bound the peer accepts; kept so the blob can be re-encoded.
    pub min_bitpool: u8,
    /// Effective bitpool (the negotiated maximum).
    pub bitpool: u8,
    /// Heuristic: dual channel with a bitpool above the stock SBC ceiling.
    /// Not a protocol flag; see [`crate::codec::is_dual_channel_xq`].
    pub is_dual_channel_xq: bool,
}

/// Raw negotiated configuration as read from the device-management side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawTransportConfig {
    pub codec: Codec,
    pub bytes: Vec<u8>,
}

impl RawTransportConfig {
    pub fn new(codec: Codec, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            codec,
            bytes: bytes.into(),
        }
    }

    /// Lower-case hex rendering of the blob, e.g. `2115022f`.
    pub fn hex(&self) -> String {
        use std::fmt::Write;
        self.bytes.iter().fold(String::new(), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
    }
}
