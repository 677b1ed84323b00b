// ── Pure codec logic ──
//
// No I/O and no state: identical input always yields identical output.

pub mod bitrate;
pub mod decode;

pub use bitrate::{estimate, frame_length};
pub use decode::{
    MAX_BITPOOL, MIN_BITPOOL, SBC_CONFIG_LEN, bitpool_range, decode, encode, is_dual_channel_xq,
    stock_dual_channel_bitpool,
};
