// ── Device domain types ──

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use super::estimate::{BitrateEstimate, BitrateFormula};

/// Dual channel bitpool 47 at 44.1 kHz, rounded the way players report it.
const ASSUMED_SBC_XQ_KBPS: f64 = 552.0;
/// Joint stereo bitpool 53 at 44.1 kHz.
const ASSUMED_SBC_KBPS: f64 = 328.0;

// ── DeviceId ────────────────────────────────────────────────────────

/// Stable identifier for one Bluetooth audio endpoint.
///
/// Normally the peer's MAC address in upper case (`AC:80:0A:12:34:56`);
/// falls back to the audio server's node name when no address is reported.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ── TransportRef ────────────────────────────────────────────────────

/// Handle used to fetch the negotiated configuration of a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TransportRef {
    /// BlueZ device object path, e.g. `/org/bluez/hci0/dev_AC_80_0A_12_34_56`.
    pub device_path: String,
    /// Codec the audio server reported; selects the decode layout when the
    /// device-management side is ambiguous (SBC vs SBC-XQ share a byte id).
    pub codec_hint: Codec,
}

// ── Codec ───────────────────────────────────────────────────────────

/// LDAC quality mode, when the server reports one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum LdacQuality {
    #[strum(to_string = "HQ")]
    High,
    #[strum(to_string = "SQ")]
    Standard,
    #[strum(to_string = "adaptive")]
    Adaptive,
}

/// Bluetooth audio codec in use on a transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Codec {
    Sbc,
    SbcXq,
    Aac,
    Aptx,
    AptxHd,
    Ldac(LdacQuality),
    Msbc,
    Cvsd,
    /// Hands-free profile without a more specific codec name.
    HandsFree,
    Other(String),
}

impl Codec {
    /// Map an `api.bluez5.codec` value (`sbc`, `sbc_xq`, `aptx_hd`, `ldac`, ...).
    pub fn from_bluez_name(name: &str) -> Self {
        let lower = name.trim().to_ascii_lowercase();
        if lower.contains("msbc") {
            Self::Msbc
        } else if lower.contains("sbc") {
            if lower.contains("xq") {
                Self::SbcXq
            } else {
                Self::Sbc
            }
        } else if lower.contains("aac") {
            Self::Aac
        } else if lower.contains("aptx_hd") || lower.contains("aptx-hd") {
            Self::AptxHd
        } else if lower.contains("aptx") {
            Self::Aptx
        } else if lower.contains("ldac") {
            Self::Ldac(if lower.contains("hq") {
                LdacQuality::High
            } else if lower.contains("sq") {
                LdacQuality::Standard
            } else {
                LdacQuality::Adaptive
            })
        } else if lower.contains("cvsd") {
            Self::Cvsd
        } else {
            Self::Other(name.trim().to_owned())
        }
    }

    /// Fall back to the profile name (`a2dp-sink-sbc_xq`, `headset-head-unit`).
    pub fn from_profile(profile: &str) -> Option<Self> {
        let lower = profile.to_ascii_lowercase();
        if lower.contains("headset") || lower.contains("hfp") || lower.contains("hsp") {
            return Some(Self::HandsFree);
        }
        match Self::from_bluez_name(&lower) {
            Self::Other(_) => None,
            codec => Some(codec),
        }
    }

    /// Whether the transport carries the SBC configuration layout.
    pub fn is_sbc_family(&self) -> bool {
        matches!(self, Self::Sbc | Self::SbcXq)
    }

    /// Typical bitrate for codecs whose configuration we do not decode.
    ///
    /// These are published operating points rather than computed values, so
    /// the estimate is tagged [`BitrateFormula::Nominal`].
    pub fn nominal_estimate(&self) -> Option<BitrateEstimate> {
        let kbps = match self {
            Self::Aac => 256.0,
            Self::Aptx => 352.0,
            Self::AptxHd => 576.0,
            Self::Ldac(LdacQuality::High) => 990.0,
            Self::Ldac(LdacQuality::Standard) => 660.0,
            Self::Msbc | Self::Cvsd | Self::HandsFree => 64.0,
            // Adaptive LDAC spans 330..990; SBC is computed, not guessed.
            Self::Ldac(LdacQuality::Adaptive) | Self::Sbc | Self::SbcXq | Self::Other(_) => {
                return None;
            }
        };
        Some(BitrateEstimate {
            kbps,
            formula: BitrateFormula::Nominal,
            per_channel_kbps: None,
        })
    }

    /// Bitrate to show for an SBC transport whose configuration could not
    /// be read: the usual SBC-XQ dual channel or high-quality joint stereo
    /// point, tagged [`BitrateFormula::Assumed`].
    pub fn assumed_sbc_estimate(&self) -> Option<BitrateEstimate> {
        let kbps = match self {
            Self::SbcXq => ASSUMED_SBC_XQ_KBPS,
            Self::Sbc => ASSUMED_SBC_KBPS,
            _ => return None,
        };
        Some(BitrateEstimate {
            kbps,
            formula: BitrateFormula::Assumed,
            per_channel_kbps: None,
        })
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sbc => f.write_str("SBC"),
            Self::SbcXq => f.write_str("SBC-XQ"),
            Self::Aac => f.write_str("AAC"),
            Self::Aptx => f.write_str("aptX"),
            Self::AptxHd => f.write_str("aptX HD"),
            Self::Ldac(LdacQuality::Adaptive) => f.write_str("LDAC"),
            Self::Ldac(quality) => write!(f, "LDAC {quality}"),
            Self::Msbc => f.write_str("mSBC"),
            Self::Cvsd => f.write_str("CVSD"),
            Self::HandsFree => f.write_str("mSBC/CVSD"),
            Self::Other(name) => f.write_str(&name.to_ascii_uppercase()),
        }
    }
}

impl Serialize for Codec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ── DeviceRecord ────────────────────────────────────────────────────

/// One connected Bluetooth audio endpoint, normalized from a sink listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    pub device_id: DeviceId,
    pub display_name: String,
    /// `None` when the listing carries no address to locate a transport.
    pub transport_ref: Option<TransportRef>,
    pub codec: Codec,
    /// Codec string exactly as the server reported it.
    pub codec_raw: Option<String>,
    pub profile: Option<String>,
    /// Server-side stream format, not the negotiated SBC rate.
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    /// Node name the record was derived from.
    pub node_name: String,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn maps_bluez_codec_names() {
        assert_eq!(Codec::from_bluez_name("sbc"), Codec::Sbc);
        assert_eq!(Codec::from_bluez_name("sbc_xq"), Codec::SbcXq);
        assert_eq!(Codec::from_bluez_name("msbc"), Codec::Msbc);
        assert_eq!(Codec::from_bluez_name("aptx_hd"), Codec::AptxHd);
        assert_eq!(Codec::from_bluez_name("aptx_ll"), Codec::Aptx);
        assert_eq!(Codec::from_bluez_name("ldac_hq"), Codec::Ldac(LdacQuality::High));
        assert_eq!(Codec::from_bluez_name("ldac"), Codec::Ldac(LdacQuality::Adaptive));
        assert_eq!(Codec::from_bluez_name("faststream"), Codec::Other("faststream".into()));
    }

    #[test]
    fn profile_fallback() {
        assert_eq!(Codec::from_profile("a2dp-sink-sbc_xq"), Some(Codec::SbcXq));
        assert_eq!(Codec::from_profile("headset-head-unit"), Some(Codec::HandsFree));
        assert_eq!(Codec::from_profile("a2dp-sink"), None);
    }

    #[test]
    fn nominal_rates() {
        assert_eq!(Codec::Aac.nominal_estimate().map(|e| e.kbps), Some(256.0));
        assert_eq!(
            Codec::Ldac(LdacQuality::Standard).nominal_estimate().map(|e| e.kbps),
            Some(660.0)
        );
        assert!(Codec::Sbc.nominal_estimate().is_none());
        assert!(Codec::Ldac(LdacQuality::Adaptive).nominal_estimate().is_none());
    }

    #[test]
    fn assumed_sbc_rates() {
        assert_eq!(Codec::SbcXq.assumed_sbc_estimate().map(|e| e.kbps), Some(552.0));
        assert_eq!(Codec::Sbc.assumed_sbc_estimate().map(|e| e.kbps), Some(328.0));
        assert!(Codec::Aac.assumed_sbc_estimate().is_none());
    }

    #[test]
    fn codec_serializes_as_label() {
        let json = serde_json::to_string(&Codec::SbcXq).unwrap_or_default();
        assert_eq!(json, "\"SBC-XQ\"");
        assert_eq!(Codec::Ldac(LdacQuality::High).to_string(), "LDAC HQ");
    }
}
