// ── Device enumerator and configuration fetcher ──
//
// Traits at the platform seam plus the real implementation over
// `btrate-api`. The monitor only sees the traits, so tests drive it with
// scripted backends.

use std::future::Future;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use btrate_api::{
    BluezClient, ChangeFeed, CommandRunner, PactlClient, PwDumpClient, RunnerConfig, SinkEntry,
    SystemRunner,
};

use crate::config::{BackendChoice, MonitorConfig};
use crate::convert::records_from_sinks;
use crate::error::{EnumerationError, FetchError};
use crate::model::{Codec, DeviceRecord, RawTransportConfig, TransportRef};

/// A2DP codec ids as reported in `MediaTransport1.Codec`.
const A2DP_CODEC_SBC: u8 = 0x00;
const A2DP_CODEC_MPEG24: u8 = 0x02;

const CHANGE_SIGNAL_SIZE: usize = 1;

/// Lists the Bluetooth audio endpoints the audio server currently knows.
pub trait DeviceEnumerator: Send + Sync + 'static {
    /// An empty list is "no devices", not an error.
    fn list_devices(
        &self,
    ) -> impl Future<Output = Result<Vec<DeviceRecord>, EnumerationError>> + Send;
}

/// Reads the negotiated codec configuration of one transport.
pub trait ConfigFetcher: Send + Sync + 'static {
    fn fetch_config(
        &self,
        transport: &TransportRef,
    ) -> impl Future<Output = Result<RawTransportConfig, FetchError>> + Send;
}

/// Everything the monitor needs from the platform.
pub trait Backend: DeviceEnumerator + ConfigFetcher {
    /// Push notifications that something changed; each `()` asks for an
    /// early cycle. `None` when the platform offers no such feed.
    fn change_signal(&self) -> Option<mpsc::Receiver<()>> {
        None
    }
}

// ── System backend ──────────────────────────────────────────────────

/// Backend over `pactl` / `pw-dump` and BlueZ via `busctl`.
#[derive(Debug, Clone)]
pub struct SystemBackend<R = SystemRunner> {
    pactl: PactlClient<R>,
    pw_dump: PwDumpClient<R>,
    bluez: BluezClient<R>,
    pactl_program: String,
    adapter: String,
    choice: BackendChoice,
}

impl SystemBackend<SystemRunner> {
    pub fn from_config(config: &MonitorConfig) -> Self {
        let runner = SystemRunner::new(RunnerConfig {
            timeout: config.enumerate_timeout.max(config.fetch_timeout),
            ..RunnerConfig::default()
        });
        Self::with_runner(runner, config)
    }
}

impl<R: CommandRunner + Clone> SystemBackend<R> {
    pub fn with_runner(runner: R, config: &MonitorConfig) -> Self {
        let program = |p: &Option<std::path::PathBuf>, default: &str| {
            p.as_ref()
                .map_or_else(|| default.to_owned(), |p| p.to_string_lossy().into_owned())
        };
        let pactl_program = program(&config.pactl_program, btrate_api::pactl::PACTL);
        Self {
            pactl: PactlClient::new(runner.clone()).with_program(pactl_program.clone()),
            pw_dump: PwDumpClient::new(runner.clone())
                .with_program(program(&config.pw_dump_program, btrate_api::pipewire::PW_DUMP)),
            bluez: BluezClient::new(runner)
                .with_program(program(&config.busctl_program, btrate_api::bluez::BUSCTL)),
            pactl_program,
            adapter: config.adapter.clone(),
            choice: config.backend,
        }
    }
}

impl<R: CommandRunner> SystemBackend<R> {
    async fn list_sinks(&self) -> Result<Vec<SinkEntry>, EnumerationError> {
        match self.choice {
            BackendChoice::Pactl => Ok(self.pactl.list_sinks().await?),
            BackendChoice::PwDump => Ok(self.pw_dump.list_sinks().await?),
            BackendChoice::Auto => {
                let pactl = self.pactl.list_sinks().await;
                match pactl {
                    Ok(sinks) if sinks.iter().any(SinkEntry::is_bluetooth) => Ok(sinks),
                    Ok(sinks) => match self.pw_dump.list_sinks().await {
                        Ok(dump) => Ok(dump),
                        Err(e) => {
                            debug!(error = %e, "pw-dump fallback failed; keeping pactl listing");
                            Ok(sinks)
                        }
                    },
                    Err(pactl_err) => {
                        debug!(error = %pactl_err, "pactl unavailable; trying pw-dump");
                        self.pw_dump.list_sinks().await.map_err(|dump_err| {
                            EnumerationError::BackendUnavailable {
                                timed_out: pactl_err.is_timeout() && dump_err.is_timeout(),
                                reason: format!("pactl: {pactl_err}; pw-dump: {dump_err}"),
                            }
                        })
                    }
                }
            }
        }
    }

    async fn fetch(&self, transport: &TransportRef) -> Result<RawTransportConfig, FetchError> {
        let objects = self.bluez.managed_objects().await?;
        if !objects.has_device(&transport.device_path) {
            return Err(FetchError::TransportGone {
                path: transport.device_path.clone(),
            });
        }
        let Some(info) = objects.transport_for(&transport.device_path) else {
            return Err(FetchError::NoConfigurationExposed {
                reason: "no media transport for device (non-A2DP profile?)".into(),
            });
        };
        let Some(bytes) = info.configuration.clone() else {
            return Err(FetchError::NoConfigurationExposed {
                reason: format!("{} has no Configuration property", info.path),
            });
        };

        let codec = match info.codec {
            // SBC and SBC-XQ share the id; the server's codec name decides.
            Some(A2DP_CODEC_SBC) if transport.codec_hint == Codec::SbcXq => Codec::SbcXq,
            Some(A2DP_CODEC_SBC) => Codec::Sbc,
            Some(A2DP_CODEC_MPEG24) => Codec::Aac,
            _ => transport.codec_hint.clone(),
        };
        Ok(RawTransportConfig { codec, bytes })
    }
}

impl<R: CommandRunner> DeviceEnumerator for SystemBackend<R> {
    async fn list_devices(&self) -> Result<Vec<DeviceRecord>, EnumerationError> {
        let sinks = self.list_sinks().await?;
        Ok(records_from_sinks(&sinks, &self.adapter))
    }
}

impl<R: CommandRunner> ConfigFetcher for SystemBackend<R> {
    async fn fetch_config(&self, transport: &TransportRef) -> Result<RawTransportConfig, FetchError> {
        self.fetch(transport).await
    }
}

impl<R: CommandRunner> Backend for SystemBackend<R> {
    fn change_signal(&self) -> Option<mpsc::Receiver<()>> {
        let mut feed = match ChangeFeed::spawn(&self.pactl_program) {
            Ok(feed) => feed,
            Err(e) => {
                warn!(error = %e, "change notifications unavailable; polling only");
                return None;
            }
        };
        let (tx, rx) = mpsc::channel(CHANGE_SIGNAL_SIZE);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = tx.closed() => break,
                    event = feed.recv() => {
                        let Some(event) = event else { break };
                        debug!(?event, "audio server change");
                        // A queued signal already covers this event.
                        if let Err(mpsc::error::TrySendError::Closed(())) = tx.try_send(()) {
                            break;
                        }
                    }
                }
            }
        });
        Some(rx)
    }
}
