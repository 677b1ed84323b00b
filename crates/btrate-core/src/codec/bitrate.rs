// ── SBC bitrate calculator ──
//
// Frame layout (A2DP spec, SBC appendix):
//
//   header         4 bytes (sync, params, bitpool, crc)
//   scale factors  4 bits per subband per channel
//   join bits      one per subband, joint stereo only
//   audio          blocks x bitpool per channel (mono/dual)
//                  blocks x bitpool shared (stereo/joint)
//
// One frame carries blocks x subbands samples per channel.

use crate::model::{BitrateEstimate, BitrateFormula, ChannelMode, DecodedSbcParams};

const HEADER_BITS: u32 = 32;

/// Effective bitrate for a decoded parameter set.
pub fn estimate(params: &DecodedSbcParams) -> BitrateEstimate {
    let subbands = params.subbands.count();
    let blocks = params.block_length.count();
    let bitpool = u32::from(params.bitpool);
    let frames_per_sec =
        f64::from(params.sample_rate_hz.hz()) / f64::from(blocks * subbands);
    let kbps = |bits: u32| f64::from(bits) * frames_per_sec / 1000.0;

    match params.channel_mode {
        ChannelMode::Mono => BitrateEstimate {
            kbps: kbps(HEADER_BITS + byte_align(4 * subbands + blocks * bitpool)),
            formula: BitrateFormula::Mono,
            per_channel_kbps: None,
        },
        ChannelMode::DualChannel => {
            // Each channel is allocated independently from its own bitpool.
            let channel_bits = 4 * subbands + blocks * bitpool;
            BitrateEstimate {
                kbps: kbps(HEADER_BITS + byte_align(2 * channel_bits)),
                formula: BitrateFormula::DualChannel,
                per_channel_kbps: Some(kbps(channel_bits)),
            }
        }
        ChannelMode::Stereo | ChannelMode::JointStereo => {
            let joint = params.channel_mode == ChannelMode::JointStereo;
            let join_bits = if joint { subbands } else { 0 };
            BitrateEstimate {
                kbps: kbps(
                    HEADER_BITS + 2 * 4 * subbands + byte_align(join_bits + blocks * bitpool),
                ),
                formula: if joint {
                    BitrateFormula::JointStereo
                } else {
                    BitrateFormula::Stereo
                },
                per_channel_kbps: None,
            }
        }
    }
}

/// SBC frame length in bytes for a parameter set.
pub fn frame_length(params: &DecodedSbcParams) -> u32 {
    let subbands = params.subbands.count();
    let blocks = params.block_length.count();
    let channels = params.channel_mode.channels();
    let bitpool = u32::from(params.bitpool);
    let audio_bits = match params.channel_mode {
        ChannelMode::Mono | ChannelMode::DualChannel => blocks * channels * bitpool,
        ChannelMode::Stereo => blocks * bitpool,
        ChannelMode::JointStereo => subbands + blocks * bitpool,
    };
    4 + (4 * subbands * channels) / 8 + audio_bits.div_ceil(8)
}

fn byte_align(bits: u32) -> u32 {
    bits.div_ceil(8) * 8
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::codec::decode::bitpool_range;
    use crate::model::{AllocationMethod, BlockLength, SampleRate, Subbands};

    fn params(rate: SampleRate, mode: ChannelMode, bitpool: u8) -> DecodedSbcParams {
        DecodedSbcParams::try_new(
            rate,
            mode,
            BlockLength::Sixteen,
            Subbands::Eight,
            AllocationMethod::Loudness,
            2,
            bitpool,
        )
        .unwrap()
    }

    fn close(actual: f64, expected: f64, tolerance: f64) -> bool {
        (actual - expected).abs() <= tolerance
    }

    #[test]
    fn joint_stereo_reference_point() {
        let p = params(SampleRate::Hz44100, ChannelMode::JointStereo, 53);
        let est = estimate(&p);
        assert_eq!(frame_length(&p), 119);
        assert!(close(est.kbps, 328.0, 0.5), "got {}", est.kbps);
        assert_eq!(est.formula, BitrateFormula::JointStereo);
    }

    #[test]
    fn dual_channel_xq_is_roughly_double_mono() {
        let dual = estimate(&params(SampleRate::Hz44100, ChannelMode::DualChannel, 94));
        let mono = estimate(&params(SampleRate::Hz44100, ChannelMode::Mono, 94));
        assert!(close(dual.kbps, 1069.4, 0.5), "got {}", dual.kbps);
        assert!(close(mono.kbps, 540.2, 0.5), "got {}", mono.kbps);
        let ratio = dual.kbps / mono.kbps;
        assert!((1.9..=2.05).contains(&ratio), "ratio {ratio}");
        assert_eq!(dual.formula, BitrateFormula::DualChannel);
        let per_channel = dual.per_channel_kbps.unwrap();
        assert!(per_channel * 2.0 <= dual.kbps);
    }

    #[test]
    fn bitrate_matches_frame_length() {
        for mode in ChannelMode::iter() {
            for rate in SampleRate::iter() {
                let p = params(rate, mode, 40);
                let from_frame = f64::from(frame_length(&p) * 8) * f64::from(rate.hz())
                    / f64::from(16 * 8)
                    / 1000.0;
                assert!(close(estimate(&p).kbps, from_frame, 1e-9), "{mode:?} {rate:?}");
            }
        }
    }

    #[test]
    fn monotonic_in_bitpool() {
        for mode in ChannelMode::iter() {
            for subbands in Subbands::iter() {
                for blocks in BlockLength::iter() {
                    let (low, high) = bitpool_range(mode, subbands);
                    let mut previous = 0.0;
                    for bitpool in low..=high {
                        let p = DecodedSbcParams::try_new(
                            SampleRate::Hz48000,
                            mode,
                            blocks,
                            subbands,
                            AllocationMethod::Snr,
                            low,
                            bitpool,
                        )
                        .unwrap();
                        let kbps = estimate(&p).kbps;
                        assert!(kbps >= previous, "{mode:?} bitpool {bitpool} decreased");
                        previous = kbps;
                    }
                }
            }
        }
    }
}
