// btrate-api: Async adapters for the audio-server and BlueZ reporting tools

pub mod bluez;
pub mod error;
pub mod pactl;
pub mod pipewire;
pub mod rebuild;
pub mod runner;
pub mod sink;

pub use bluez::{BluezClient, ManagedObjects, TransportInfo};
pub use error::Error;
pub use pactl::{ChangeFeed, PactlClient, ServerEvent, ServerEventKind};
pub use pipewire::PwDumpClient;
pub use rebuild::{OutputLine, OutputStream, RebuildOutcome, RebuildRequest, RebuildTool};
pub use runner::{CommandOutput, CommandRunner, RunnerConfig, SystemRunner};
pub use sink::SinkEntry;
