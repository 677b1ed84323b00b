// ── pactl adapter ──
//
// Text listing (`pactl list sinks`) and the long-running change feed
// (`pactl subscribe`). Both speak the PulseAudio protocol, so they work
// against pipewire-pulse as well as a real PulseAudio daemon.

use std::process::Stdio;

use tokio::io::BufReader;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Error;
use crate::runner::{CommandRunner, read_line_lossy, run_checked};
use crate::sink::{SinkEntry, unquote};

pub const PACTL: &str = "pactl";

const FEED_CHANNEL_SIZE: usize = 32;

/// Client for `pactl list sinks`.
#[derive(Debug, Clone)]
pub struct PactlClient<R> {
    runner: R,
    program: String,
}

impl<R: CommandRunner> PactlClient<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            program: PACTL.into(),
        }
    }

    /// Use a different executable (absolute path or wrapper).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// List every sink the server knows about, Bluetooth or not.
    pub async fn list_sinks(&self) -> Result<Vec<SinkEntry>, Error> {
        let stdout = run_checked(&self.runner, &self.program, &["list", "sinks"]).await?;
        let sinks = parse_sinks(&stdout);
        debug!(count = sinks.len(), "parsed pactl sink listing");
        Ok(sinks)
    }
}

/// Parse the block-structured output of `pactl list sinks`.
///
/// Unknown lines are ignored; a block without a `Name:` line is dropped.
pub fn parse_sinks(text: &str) -> Vec<SinkEntry> {
    let mut sinks = Vec::new();
    let mut current: Option<SinkEntry> = None;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("Sink #") {
            if let Some(done) = current.take() {
                sinks.push(done);
            }
            current = Some(SinkEntry {
                index: rest.trim().parse().ok(),
                ..SinkEntry::default()
            });
            continue;
        }

        let Some(sink) = current.as_mut() else {
            continue;
        };
        let trimmed = line.trim();

        if let Some(name) = trimmed.strip_prefix("Name:") {
            sink.name = name.trim().to_owned();
        } else if let Some(desc) = trimmed.strip_prefix("Description:") {
            sink.description = Some(desc.trim().to_owned());
        } else if let Some(spec) = trimmed.strip_prefix("Sample Specification:") {
            let (channels, rate) = parse_sample_spec(spec);
            sink.channels = channels;
            sink.sample_rate = rate;
        } else if let Some((key, value)) = trimmed.split_once(" = ") {
            sink.properties
                .insert(key.trim().to_owned(), unquote(value.trim()).to_owned());
        }
    }

    if let Some(done) = current {
        sinks.push(done);
    }
    sinks.retain(|s| !s.name.is_empty());
    sinks
}

/// Extract `(channels, rate)` from e.g. `s16le 2ch 48000Hz`.
fn parse_sample_spec(spec: &str) -> (Option<u8>, Option<u32>) {
    let mut channels = None;
    let mut rate = None;
    for token in spec.split_whitespace() {
        if let Some(ch) = token.strip_suffix("ch") {
            channels = ch.parse().ok().or(channels);
        } else if let Some(hz) = token.strip_suffix("Hz") {
            rate = hz.parse().ok().or(rate);
        }
    }
    (channels, rate)
}

// ── Change feed ─────────────────────────────────────────────────────

/// What happened to a server object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEventKind {
    New,
    Change,
    Remove,
}

/// One line of `pactl subscribe`, e.g. `Event 'new' on sink #63`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEvent {
    pub kind: ServerEventKind,
    /// Facility name: `sink`, `card`, `source`, `client`, ...
    pub facility: String,
    pub index: Option<u32>,
}

impl ServerEvent {
    /// Sink and card events are the ones that can change a Bluetooth transport.
    pub fn affects_sinks(&self) -> bool {
        matches!(self.facility.as_str(), "sink" | "card")
    }
}

pub fn parse_event_line(line: &str) -> Option<ServerEvent> {
    let rest = line.trim().strip_prefix("Event '")?;
    let (kind, rest) = rest.split_once('\'')?;
    let kind = match kind {
        "new" => ServerEventKind::New,
        "change" => ServerEventKind::Change,
        "remove" => ServerEventKind::Remove,
        _ => return None,
    };
    let rest = rest.trim().strip_prefix("on ")?;
    let (facility, index) = match rest.split_once(" #") {
        Some((facility, index)) => (facility, index.trim().parse().ok()),
        None => (rest, None),
    };
    Some(ServerEvent {
        kind,
        facility: facility.trim().to_owned(),
        index,
    })
}

/// Running `pactl subscribe` process forwarding sink-affecting events.
///
/// Dropping the feed stops the reader task, which drops (and kills) the child.
pub struct ChangeFeed {
    rx: mpsc::Receiver<ServerEvent>,
    task: JoinHandle<()>,
}

impl ChangeFeed {
    /// Spawn `<program> subscribe` and start forwarding events.
    pub fn spawn(program: &str) -> Result<Self, Error> {
        let mut child = Command::new(program)
            .arg("subscribe")
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                program: program.to_owned(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| Error::Spawn {
            program: program.to_owned(),
            source: std::io::Error::other("stdout not captured"),
        })?;

        let (tx, rx) = mpsc::channel(FEED_CHANNEL_SIZE);
        let task = tokio::spawn(async move {
            let _child = child;
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            loop {
                match read_line_lossy(&mut reader, &mut buf).await {
                    Ok(Some(line)) => {
                        let Some(event) = parse_event_line(&line) else {
                            continue;
                        };
                        if !event.affects_sinks() {
                            continue;
                        }
                        // A full queue already guarantees a pending cycle.
                        if let Err(mpsc::error::TrySendError::Closed(_)) = tx.try_send(event) {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("pactl subscribe exited");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "pactl subscribe read failed");
                        break;
                    }
                }
            }
        });

        Ok(Self { rx, task })
    }

    /// Wait for the next sink-affecting event; `None` once the feed ended.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.rx.recv().await
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const LISTING: &str = "\
Sink #47
\tState: SUSPENDED
\tName: alsa_output.pci-0000_00_1f.3.analog-stereo
\tDescription: Built-in Audio Analog Stereo
\tDriver: PipeWire
\tSample Specification: s32le 2ch 48000Hz
\tProperties:
\t\tdevice.api = \"alsa\"
\t\tmedia.class = \"Audio/Sink\"
Sink #62
\tState: RUNNING
\tName: bluez_output.AC_80_0A_12_34_56.1
\tDescription: WH-1000XM4
\tDriver: PipeWire
\tSample Specification: s16le 2ch 44100Hz
\tChannel Map: front-left,front-right
\tProperties:
\t\tapi.bluez5.address = \"AC:80:0A:12:34:56\"
\t\tapi.bluez5.codec = \"sbc_xq\"
\t\tapi.bluez5.profile = \"a2dp-sink\"
\t\tdevice.api = \"bluez5\"
\t\tdevice.description = \"WH-1000XM4\"
\tPorts:
\t\theadphone-output: Headphone (type: Headphones, priority: 0, available)
";

    #[test]
    fn parses_both_sinks() {
        let sinks = parse_sinks(LISTING);
        assert_eq!(sinks.len(), 2);
        assert_eq!(sinks[0].index, Some(47));
        assert!(!sinks[0].is_bluetooth());
    }

    #[test]
    fn parses_bluetooth_sink_fields() {
        let sinks = parse_sinks(LISTING);
        let bt = &sinks[1];
        assert_eq!(bt.index, Some(62));
        assert_eq!(bt.name, "bluez_output.AC_80_0A_12_34_56.1");
        assert_eq!(bt.description.as_deref(), Some("WH-1000XM4"));
        assert_eq!(bt.channels, Some(2));
        assert_eq!(bt.sample_rate, Some(44_100));
        assert_eq!(bt.bluez_address(), Some("AC:80:0A:12:34:56"));
        assert_eq!(bt.bluez_codec(), Some("sbc_xq"));
        assert_eq!(bt.bluez_profile(), Some("a2dp-sink"));
        assert!(bt.is_bluetooth());
    }

    #[test]
    fn property_description_does_not_override_header() {
        let sinks = parse_sinks(LISTING);
        assert_eq!(
            sinks[1].property("device.description"),
            Some("WH-1000XM4")
        );
        assert_eq!(sinks[0].description.as_deref(), Some("Built-in Audio Analog Stereo"));
    }

    #[test]
    fn empty_listing_yields_nothing() {
        assert!(parse_sinks("").is_empty());
    }

    #[test]
    fn sample_spec_tolerates_missing_parts() {
        assert_eq!(parse_sample_spec("s16le 1ch 16000Hz"), (Some(1), Some(16_000)));
        assert_eq!(parse_sample_spec("garbage"), (None, None));
    }

    #[test]
    fn parses_subscribe_lines() {
        let event = parse_event_line("Event 'new' on sink #63").unwrap();
        assert_eq!(event.kind, ServerEventKind::New);
        assert_eq!(event.facility, "sink");
        assert_eq!(event.index, Some(63));
        assert!(event.affects_sinks());

        let event = parse_event_line("Event 'change' on server").unwrap();
        assert_eq!(event.index, None);
        assert!(!event.affects_sinks());

        let event = parse_event_line("Event 'remove' on card #50").unwrap();
        assert_eq!(event.kind, ServerEventKind::Remove);
        assert!(event.affects_sinks());

        assert!(parse_event_line("something else").is_none());
    }
}
