// btrate-core: SBC transport decoding and change tracking between btrate-api and consumers (CLI).

pub mod codec;
pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod monitor;
pub mod rebuild;
pub mod source;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{BackendChoice, MonitorConfig, Trigger};
pub use error::{CoreError, DecodeError, EnumerationError, FetchError, SbcField};
pub use monitor::{FetchOutcome, Monitor, Observation, SnapshotTable, reconcile};
pub use rebuild::CodecRebuild;
pub use source::{Backend, ConfigFetcher, DeviceEnumerator, SystemBackend};
pub use stream::EventStream;

// Rebuild contract types come straight from the adapter layer.
pub use btrate_api::{OutputLine, OutputStream, RebuildOutcome, RebuildRequest, RebuildTool};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    // Devices
    Codec, DeviceId, DeviceRecord, LdacQuality, TransportRef,
    // SBC parameters
    AllocationMethod, BlockLength, ChannelMode, DecodedSbcParams, RawTransportConfig, SampleRate,
    Subbands,
    // Estimates
    BitrateEstimate, BitrateFormula,
    // Snapshots / events
    ChangeEvent, ConfigIssue, ConfigStatus, DeviceSnapshot, MonitorEvent,
};
