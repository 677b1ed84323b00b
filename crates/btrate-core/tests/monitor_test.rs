#![allow(clippy::unwrap_used)]
// Integration tests for `Monitor` driven by a scripted backend.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

use btrate_core::{
    Backend, ChangeEvent, Codec, ConfigFetcher, ConfigIssue, ConfigStatus, CoreError, DeviceEnumerator,
    DeviceId, DeviceRecord, EnumerationError, EventStream, FetchError, Monitor, MonitorConfig,
    MonitorEvent, RawTransportConfig, TransportRef, Trigger,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// Pops scripted results in order; the last one repeats forever.
struct Script<T>(Mutex<VecDeque<T>>);

impl<T: Clone> Script<T> {
    fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self(Mutex::new(items.into_iter().collect()))
    }

    fn next(&self) -> Option<T> {
        let mut queue = self.0.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

type Listing = Result<Vec<DeviceRecord>, EnumerationError>;
type Fetch = Result<RawTransportConfig, FetchError>;

struct FakeBackend {
    listings: Script<Listing>,
    fetches: HashMap<String, Script<Fetch>>,
    delays: HashMap<String, Script<Duration>>,
    signal: Mutex<Option<mpsc::Receiver<()>>>,
    list_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl FakeBackend {
    fn new(listings: impl IntoIterator<Item = Listing>) -> Self {
        Self {
            listings: Script::new(listings),
            fetches: HashMap::new(),
            delays: HashMap::new(),
            signal: Mutex::new(None),
            list_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    fn fetch(mut self, id: &str, results: impl IntoIterator<Item = Fetch>) -> Self {
        self.fetches.insert(path(id), Script::new(results));
        self
    }

    /// How long each successive fetch for `id` takes to answer.
    fn delay(mut self, id: &str, delays: impl IntoIterator<Item = Duration>) -> Self {
        self.delays.insert(path(id), Script::new(delays));
        self
    }
}

impl DeviceEnumerator for FakeBackend {
    async fn list_devices(&self) -> Result<Vec<DeviceRecord>, EnumerationError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.listings.next().unwrap_or_else(|| Ok(Vec::new()))
    }
}

impl ConfigFetcher for FakeBackend {
    async fn fetch_config(&self, transport: &TransportRef) -> Result<RawTransportConfig, FetchError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(&transport.device_path).and_then(Script::next) {
            tokio::time::sleep(delay).await;
        }
        self.fetches
            .get(&transport.device_path)
            .and_then(Script::next)
            .unwrap_or_else(|| {
                Err(FetchError::TransportGone {
                    path: transport.device_path.clone(),
                })
            })
    }
}

impl Backend for FakeBackend {
    fn change_signal(&self) -> Option<mpsc::Receiver<()>> {
        self.signal.lock().unwrap().take()
    }
}

fn path(id: &str) -> String {
    format!("/org/bluez/hci0/dev_{}", id.replace(':', "_"))
}

fn device(id: &str, codec: Codec) -> DeviceRecord {
    DeviceRecord {
        device_id: DeviceId::from(id),
        display_name: format!("Headphones {id}"),
        transport_ref: Some(TransportRef {
            device_path: path(id),
            codec_hint: codec.clone(),
        }),
        codec,
        codec_raw: None,
        profile: Some("a2dp-sink".into()),
        sample_rate: Some(44_100),
        channels: Some(2),
        node_name: format!("bluez_output.{}.1", id.replace(':', "_")),
    }
}

/// 44.1 kHz joint stereo, 16 blocks, 8 subbands, loudness, bitpool 2..=53.
fn joint_stereo(max_bitpool: u8) -> Fetch {
    Ok(RawTransportConfig::new(Codec::Sbc, [0x21, 0x15, 2, max_bitpool]))
}

/// 44.1 kHz dual channel at an SBC-XQ bitpool.
fn dual_channel_xq() -> Fetch {
    Ok(RawTransportConfig::new(Codec::SbcXq, [0x24, 0x15, 2, 47]))
}

fn not_exposed() -> Fetch {
    Err(FetchError::NoConfigurationExposed {
        reason: "negotiating".into(),
    })
}

const A: &str = "AC:80:0A:12:34:56";
const B: &str = "00:1B:66:AA:BB:CC";

fn config() -> MonitorConfig {
    MonitorConfig {
        interval: Duration::from_secs(1),
        ..MonitorConfig::default()
    }
}

/// Collect the change events of the next `cycles` completed cycles.
async fn next_cycles(stream: &mut EventStream, cycles: usize) -> Vec<Vec<ChangeEvent>> {
    let mut out = vec![Vec::new()];
    while out.len() <= cycles {
        match stream.recv().await.unwrap() {
            MonitorEvent::Change(change) => out.last_mut().unwrap().push(change),
            MonitorEvent::CycleCompleted { .. } => out.push(Vec::new()),
            other => panic!("unexpected event: {other:?}"),
        }
    }
    out.pop();
    out
}

fn kinds(events: &[ChangeEvent]) -> Vec<&'static str> {
    events.iter().map(ChangeEvent::kind).collect()
}

// ── Single-shot sampling ────────────────────────────────────────────

#[tokio::test]
async fn test_sample_decodes_and_estimates() {
    let backend = FakeBackend::new([Ok(vec![device(A, Codec::SbcXq)])]).fetch(A, [dual_channel_xq()]);
    let monitor = Monitor::new(backend, config()).unwrap();

    let snapshots = monitor.sample().await.unwrap();
    assert_eq!(snapshots.len(), 1);
    let snapshot = &snapshots[0];
    assert_eq!(snapshot.status, ConfigStatus::Decoded);

    let params = snapshot.params.unwrap();
    assert_eq!(params.bitpool, 47);
    assert!(params.is_dual_channel_xq);
    assert!(snapshot.bitrate.is_some_and(|b| b.kbps > 500.0));
    assert_eq!(snapshot.raw.as_ref().map(RawTransportConfig::hex).as_deref(), Some("2415022f"));
    assert!(monitor.last_cycle().borrow().is_some());
}

#[tokio::test]
async fn test_sample_with_no_devices_is_ok() {
    let monitor = Monitor::new(FakeBackend::new([Ok(Vec::new())]), config()).unwrap();
    assert!(monitor.sample().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_backend_unavailable_fails_sample_and_keeps_table() {
    let backend = FakeBackend::new([
        Ok(vec![device(A, Codec::Sbc)]),
        Err(EnumerationError::unavailable("pactl: connection refused")),
    ])
    .fetch(A, [joint_stereo(53)]);
    let monitor = Monitor::new(backend, config()).unwrap();

    monitor.sample().await.unwrap();
    let result = monitor.sample().await;
    assert!(
        matches!(result, Err(CoreError::Enumeration(EnumerationError::BackendUnavailable { .. }))),
        "expected BackendUnavailable, got: {result:?}"
    );
    assert_eq!(monitor.snapshots().len(), 1);
}

#[tokio::test]
async fn test_non_sbc_codec_is_not_fetched() {
    let backend = FakeBackend::new([Ok(vec![device(A, Codec::Aac)])]);
    let monitor = Monitor::new(backend, config()).unwrap();

    let snapshots = monitor.sample().await.unwrap();
    assert_eq!(snapshots[0].status, ConfigStatus::NotApplicable);
    assert!(snapshots[0].params.is_none());
    assert!(snapshots[0].bitrate.is_some_and(|b| b.is_nominal()));
    assert_eq!(monitor.backend().fetch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_address_is_unknown_configuration() {
    let mut record = device(A, Codec::Sbc);
    record.transport_ref = None;
    let monitor = Monitor::new(FakeBackend::new([Ok(vec![record])]), config()).unwrap();

    let snapshots = monitor.sample().await.unwrap();
    assert!(matches!(
        snapshots[0].status,
        ConfigStatus::Unknown(ConfigIssue::Fetch(FetchError::NoConfigurationExposed { .. }))
    ));
}

#[tokio::test]
async fn test_malformed_blob_is_unknown_configuration() {
    let backend = FakeBackend::new([Ok(vec![device(A, Codec::Sbc)])])
        .fetch(A, [Ok(RawTransportConfig::new(Codec::Sbc, [0x21, 0x15]))]);
    let monitor = Monitor::new(backend, config()).unwrap();

    let snapshots = monitor.sample().await.unwrap();
    assert!(matches!(snapshots[0].status, ConfigStatus::Unknown(ConfigIssue::Decode(_))));
    assert_eq!(
        snapshots[0].bitrate.map(|b| b.to_string()).as_deref(),
        Some("~328 kbps (est.)")
    );
}

#[tokio::test]
async fn test_unknown_xq_configuration_assumes_xq_rate() {
    let backend = FakeBackend::new([Ok(vec![device(A, Codec::SbcXq)])]).fetch(A, [not_exposed()]);
    let monitor = Monitor::new(backend, config()).unwrap();

    let snapshots = monitor.sample().await.unwrap();
    assert!(snapshots[0].params.is_none());
    let bitrate = snapshots[0].bitrate.unwrap();
    assert!(bitrate.is_estimated());
    assert_eq!(bitrate.to_string(), "~552 kbps (est.)");
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetch_leaves_device_out_of_the_cycle() {
    let backend = FakeBackend::new([Ok(vec![device(A, Codec::Sbc), device(B, Codec::Sbc)])])
        .fetch(A, [joint_stereo(53)])
        .fetch(B, [joint_stereo(35)])
        .delay(A, [Duration::from_secs(30)]);
    let config = MonitorConfig {
        fetch_timeout: Duration::from_millis(500),
        ..config()
    };
    let monitor = Monitor::new(backend, config).unwrap();

    let snapshots = monitor.sample().await.unwrap();
    let ids: Vec<_> = snapshots.iter().map(|s| s.device_id().as_str()).collect();
    assert_eq!(ids, [B]);
    assert!(monitor.snapshot(&DeviceId::from(A)).is_none());
}

#[tokio::test]
async fn test_vanished_transport_is_not_listed() {
    let backend = FakeBackend::new([Ok(vec![device(A, Codec::Sbc)])])
        .fetch(A, [Err(FetchError::TransportGone { path: path(A) })]);
    let monitor = Monitor::new(backend, config()).unwrap();

    assert!(monitor.sample().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let config = MonitorConfig {
        interval: Duration::ZERO,
        ..MonitorConfig::default()
    };
    let result = Monitor::new(FakeBackend::new([Ok(Vec::new())]), config);
    assert!(matches!(result, Err(CoreError::Validation { .. })));
}

// ── Continuous monitoring ───────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_configuration_appears_after_negotiation() {
    let backend = FakeBackend::new([Ok(vec![device(A, Codec::Sbc)])])
        .fetch(A, [not_exposed(), joint_stereo(53)]);
    let monitor = Monitor::new(backend, config()).unwrap();
    let mut stream = monitor.subscribe();

    let cycles = next_cycles(&mut stream, 3).await;
    assert_eq!(kinds(&cycles[0]), ["connected"]);
    assert!(cycles[0][0].snapshot().unwrap().params.is_none());

    assert_eq!(kinds(&cycles[1]), ["renegotiated"]);
    let ChangeEvent::Renegotiated { old, new } = &cycles[1][0] else {
        unreachable!()
    };
    assert!(old.params.is_none());
    assert_eq!(new.params.map(|p| p.bitpool), Some(53));

    assert_eq!(kinds(&cycles[2]), ["unchanged"]);
    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_disappearing_device_disconnects_once() {
    let backend = FakeBackend::new([
        Ok(vec![device(A, Codec::Sbc), device(B, Codec::Sbc)]),
        Ok(vec![device(B, Codec::Sbc)]),
    ])
    .fetch(A, [joint_stereo(53)])
    .fetch(B, [joint_stereo(35)]);
    let monitor = Monitor::new(backend, config()).unwrap();
    let mut stream = monitor.subscribe();

    let cycles = next_cycles(&mut stream, 3).await;
    assert_eq!(kinds(&cycles[0]), ["connected", "connected"]);
    assert_eq!(kinds(&cycles[1]), ["unchanged", "disconnected"]);
    assert_eq!(cycles[1][1].device_id().as_str(), A);
    assert_eq!(kinds(&cycles[2]), ["unchanged"]);

    let ids: Vec<_> = monitor
        .snapshots()
        .iter()
        .map(|s| s.device_id().as_str().to_owned())
        .collect();
    assert_eq!(ids, [B]);
    assert!(monitor.snapshot(&DeviceId::from(A)).is_none());
    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_vanished_transport_disconnects_then_reconnects() {
    let backend = FakeBackend::new([Ok(vec![device(A, Codec::Sbc)])]).fetch(
        A,
        [
            joint_stereo(53),
            Err(FetchError::TransportGone { path: path(A) }),
            Err(FetchError::TransportGone { path: path(A) }),
            joint_stereo(53),
        ],
    );
    let monitor = Monitor::new(backend, config()).unwrap();
    let mut stream = monitor.subscribe();

    let cycles = next_cycles(&mut stream, 2).await;
    assert_eq!(kinds(&cycles[0]), ["connected"]);
    assert_eq!(kinds(&cycles[1]), ["disconnected"]);
    assert_eq!(cycles[1][0].device_id().as_str(), A);
    assert!(monitor.snapshot(&DeviceId::from(A)).is_none());

    let cycles = next_cycles(&mut stream, 2).await;
    assert!(cycles[0].is_empty(), "second miss must stay quiet: {:?}", cycles[0]);
    assert_eq!(kinds(&cycles[1]), ["connected"]);
    assert_eq!(
        monitor.snapshot(&DeviceId::from(A)).and_then(|s| s.params).map(|p| p.bitpool),
        Some(53)
    );
    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_fetch_timeout_disconnects_then_reconnects() {
    let backend = FakeBackend::new([Ok(vec![device(A, Codec::Sbc)])])
        .fetch(A, [joint_stereo(53)])
        .delay(A, [Duration::ZERO, Duration::from_secs(30), Duration::ZERO]);
    let config = MonitorConfig {
        fetch_timeout: Duration::from_millis(500),
        ..config()
    };
    let monitor = Monitor::new(backend, config).unwrap();
    let mut stream = monitor.subscribe();

    let cycles = next_cycles(&mut stream, 3).await;
    assert_eq!(kinds(&cycles[0]), ["connected"]);
    assert_eq!(kinds(&cycles[1]), ["disconnected"]);
    assert_eq!(kinds(&cycles[2]), ["connected"]);
    assert!(monitor.snapshot(&DeviceId::from(A)).is_some());
    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_lost_parameters_report_configuration_unknown() {
    let backend = FakeBackend::new([Ok(vec![device(A, Codec::Sbc)])])
        .fetch(A, [joint_stereo(53), not_exposed()]);
    let monitor = Monitor::new(backend, config()).unwrap();
    let mut stream = monitor.subscribe();

    let cycles = next_cycles(&mut stream, 3).await;
    assert_eq!(kinds(&cycles[1]), ["configuration_unknown"]);
    assert_eq!(kinds(&cycles[2]), ["unchanged"]);
    assert!(monitor.snapshot(&DeviceId::from(A)).is_some());
    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_backend_outage_is_reported_and_retried() {
    let backend = FakeBackend::new([
        Err(EnumerationError::unavailable("pactl: connection refused")),
        Ok(vec![device(A, Codec::Sbc)]),
    ])
    .fetch(A, [joint_stereo(53)]);
    let monitor = Monitor::new(backend, config()).unwrap();
    let mut stream = monitor.subscribe();

    let first = stream.recv().await.unwrap();
    assert!(matches!(first, MonitorEvent::BackendUnavailable { .. }), "got {first:?}");

    let cycles = next_cycles(&mut stream, 1).await;
    assert_eq!(kinds(&cycles[0]), ["connected"]);
    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_subscription_starts_from_current_snapshots() {
    let backend = FakeBackend::new([Ok(vec![device(A, Codec::Sbc)])]).fetch(A, [joint_stereo(53)]);
    let monitor = Monitor::new(backend, config()).unwrap();
    monitor.sample().await.unwrap();

    let mut stream = monitor.subscribe();
    assert_eq!(stream.initial().len(), 1);

    // The device is already known, so the stream's first cycle is quiet.
    let cycles = next_cycles(&mut stream, 1).await;
    assert_eq!(kinds(&cycles[0]), ["unchanged"]);
    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_slow_subscriber_sees_lagged() {
    let backend = FakeBackend::new([Ok(vec![device(A, Codec::Sbc)])]).fetch(A, [joint_stereo(53)]);
    let config = MonitorConfig {
        event_buffer: 1,
        ..config()
    };
    let monitor = Monitor::new(backend, config).unwrap();
    let mut stream = monitor.subscribe();

    tokio::time::sleep(Duration::from_secs(5)).await;
    let event = stream.recv().await.unwrap();
    assert!(matches!(event, MonitorEvent::Lagged { missed } if missed > 0), "got {event:?}");
    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_cycling() {
    let backend = FakeBackend::new([Ok(vec![device(A, Codec::Sbc)])]).fetch(A, [joint_stereo(53)]);
    let monitor = Monitor::new(backend, config()).unwrap();
    let mut stream = monitor.subscribe();
    next_cycles(&mut stream, 1).await;

    monitor.shutdown().await;
    monitor.shutdown().await;
    let calls = monitor.backend().list_calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(monitor.backend().list_calls.load(Ordering::SeqCst), calls);
}

#[tokio::test(start_paused = true)]
async fn test_last_subscriber_drop_stops_cycling() {
    let backend = FakeBackend::new([Ok(vec![device(A, Codec::Sbc)])]).fetch(A, [joint_stereo(53)]);
    let monitor = Monitor::new(backend, config()).unwrap();
    let mut stream = monitor.subscribe();
    next_cycles(&mut stream, 2).await;
    drop(stream);

    let calls = monitor.backend().list_calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(monitor.backend().list_calls.load(Ordering::SeqCst), calls);

    // A new subscription restarts the cycle task.
    let mut stream = monitor.subscribe();
    next_cycles(&mut stream, 1).await;
    assert!(monitor.backend().list_calls.load(Ordering::SeqCst) > calls);
    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_change_signal_triggers_early_cycle() {
    let (tx, rx) = mpsc::channel(1);
    let backend = FakeBackend::new([Ok(vec![device(A, Codec::Sbc)])]).fetch(A, [joint_stereo(53)]);
    *backend.signal.lock().unwrap() = Some(rx);
    let config = MonitorConfig {
        interval: Duration::from_secs(60),
        trigger: Trigger::Events,
        ..config()
    };
    let monitor = Monitor::new(backend, config).unwrap();
    let mut stream = monitor.subscribe();
    next_cycles(&mut stream, 1).await;

    let started = tokio::time::Instant::now();
    tx.send(()).await.unwrap();
    next_cycles(&mut stream, 1).await;
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(monitor.backend().list_calls.load(Ordering::SeqCst), 2);
    monitor.shutdown().await;
}
