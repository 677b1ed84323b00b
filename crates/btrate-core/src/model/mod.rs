// ── Domain model ──
//
// Canonical types shared by the decoder, the calculator and the monitor.

pub mod device;
pub mod estimate;
pub mod sbc;
pub mod snapshot;

pub use device::{Codec, DeviceId, DeviceRecord, LdacQuality, TransportRef};
pub use estimate::{BitrateEstimate, BitrateFormula};
pub use sbc::{
    AllocationMethod, BlockLength, ChannelMode, DecodedSbcParams, RawTransportConfig, SampleRate,
    Subbands,
};
pub use snapshot::{ChangeEvent, ConfigIssue, ConfigStatus, DeviceSnapshot, MonitorEvent};
