// ── Change-tracking monitor ──
//
// One cycle: enumerate -> fetch+decode every device concurrently ->
// reconcile against the previous table -> swap the table -> broadcast.
// Cycles never overlap (`cycle_lock`). Everything up to the swap is
// side-effect free, so a cycle cancelled at any await leaves the table
// exactly as it was.

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use indexmap::IndexMap;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec;
use crate::config::{MonitorConfig, Trigger};
use crate::error::{CoreError, EnumerationError, FetchError};
use crate::model::{
    ChangeEvent, ConfigIssue, ConfigStatus, DecodedSbcParams, DeviceId, DeviceRecord,
    DeviceSnapshot, MonitorEvent, RawTransportConfig,
};
use crate::source::Backend;
use crate::stream::EventStream;

/// Snapshot table keyed by device, in enumeration order.
pub type SnapshotTable = IndexMap<DeviceId, Arc<DeviceSnapshot>>;

// ── Observations ────────────────────────────────────────────────────

/// What one cycle learned about one device, before diffing.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub record: DeviceRecord,
    pub outcome: FetchOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Decoded {
        raw: RawTransportConfig,
        params: DecodedSbcParams,
    },
    Failed(ConfigIssue),
    /// Codec without a decodable layout; nothing was fetched.
    NotApplicable,
    /// The transport vanished or stopped answering between listing and
    /// fetch. Treated as absent for this cycle.
    Gone(FetchError),
}

impl Observation {
    /// `None` when the device is not part of this cycle.
    fn into_snapshot(self, now: DateTime<Utc>) -> Option<DeviceSnapshot> {
        let (params, bitrate, status, raw) = match self.outcome {
            FetchOutcome::Decoded { raw, params } => (
                Some(params),
                Some(codec::estimate(&params)),
                ConfigStatus::Decoded,
                Some(raw),
            ),
            FetchOutcome::Failed(issue) => (
                None,
                self.record.codec.assumed_sbc_estimate(),
                ConfigStatus::Unknown(issue),
                None,
            ),
            FetchOutcome::Gone(_) => return None,
            FetchOutcome::NotApplicable => (
                None,
                self.record.codec.nominal_estimate(),
                ConfigStatus::NotApplicable,
                None,
            ),
        };
        Some(DeviceSnapshot {
            record: self.record,
            params,
            bitrate,
            status,
            raw,
            last_seen_at: now,
        })
    }
}

// ── Reconcile ───────────────────────────────────────────────────────

/// Diff a cycle's observations against the previous table.
///
/// Returns the complete replacement table and the per-device events.
/// Devices absent from `observations`, or observed as [`FetchOutcome::Gone`],
/// are dropped with one `Disconnected` each. Parameter comparison is
/// field-wise on [`DecodedSbcParams`]; a bitrate difference alone is never a
/// renegotiation.
pub fn reconcile(
    previous: &SnapshotTable,
    observations: Vec<Observation>,
    now: DateTime<Utc>,
) -> (SnapshotTable, Vec<ChangeEvent>) {
    let mut table = SnapshotTable::with_capacity(observations.len());
    let mut events = Vec::with_capacity(observations.len() + previous.len());

    for observation in observations {
        let id = observation.record.device_id.clone();
        if table.contains_key(&id) {
            continue;
        }
        let Some(snapshot) = observation.into_snapshot(now) else {
            continue;
        };
        let snapshot = Arc::new(snapshot);
        let event = match previous.get(&id) {
            None => ChangeEvent::Connected {
                snapshot: Arc::clone(&snapshot),
            },
            Some(old) => transition(old, &snapshot),
        };
        events.push(event);
        table.insert(id, snapshot);
    }

    for id in previous.keys().filter(|id| !table.contains_key(*id)) {
        events.push(ChangeEvent::Disconnected {
            device_id: id.clone(),
        });
    }

    (table, events)
}

fn transition(old: &Arc<DeviceSnapshot>, new: &Arc<DeviceSnapshot>) -> ChangeEvent {
    let renegotiated = || ChangeEvent::Renegotiated {
        old: Arc::clone(old),
        new: Arc::clone(new),
    };
    // Switching codec is a negotiation fact even when neither side decodes.
    if old.record.codec != new.record.codec {
        return renegotiated();
    }
    match (&old.params, &new.params) {
        (Some(a), Some(b)) if a == b => ChangeEvent::Unchanged {
            device_id: new.device_id().clone(),
        },
        (_, Some(_)) => renegotiated(),
        (Some(_), None) => ChangeEvent::ConfigurationUnknown {
            snapshot: Arc::clone(new),
        },
        (None, None) => ChangeEvent::Unchanged {
            device_id: new.device_id().clone(),
        },
    }
}

// ── Monitor ─────────────────────────────────────────────────────────

/// Owner of the snapshot table and the cycle engine.
///
/// Cheaply cloneable via `Arc<MonitorInner>`. Consumers only ever receive
/// `Arc<DeviceSnapshot>` copies; the table itself is swapped whole.
pub struct Monitor<B: Backend> {
    inner: Arc<MonitorInner<B>>,
}

impl<B: Backend> Clone for Monitor<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct MonitorInner<B> {
    backend: B,
    config: MonitorConfig,
    table: ArcSwap<SnapshotTable>,
    event_tx: broadcast::Sender<MonitorEvent>,
    last_cycle: watch::Sender<Option<DateTime<Utc>>>,
    cycle_lock: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
    /// Background cycle task, present while continuous mode is running.
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl<B: Backend> Monitor<B> {
    pub fn new(backend: B, config: MonitorConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(config.event_buffer);
        let (last_cycle, _) = watch::channel(None);
        Ok(Self {
            inner: Arc::new(MonitorInner {
                backend,
                config,
                table: ArcSwap::from_pointee(SnapshotTable::new()),
                event_tx,
                last_cycle,
                cycle_lock: tokio::sync::Mutex::new(()),
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Run one cycle and return the resulting snapshots.
    ///
    /// Fails only when the audio backend cannot be listed. A device whose
    /// transport vanished or timed out is left out; other per-device
    /// problems show up as [`ConfigStatus::Unknown`].
    pub async fn sample(&self) -> Result<Vec<Arc<DeviceSnapshot>>, CoreError> {
        self.run_cycle().await?;
        Ok(self.snapshots())
    }

    /// Read-only copy of the last completed cycle.
    pub fn snapshots(&self) -> Vec<Arc<DeviceSnapshot>> {
        self.inner.table.load().values().cloned().collect()
    }

    /// Look up one device in the last completed cycle.
    pub fn snapshot(&self, id: &DeviceId) -> Option<Arc<DeviceSnapshot>> {
        self.inner.table.load().get(id).cloned()
    }

    /// Completion time of the most recent cycle.
    pub fn last_cycle(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.inner.last_cycle.subscribe()
    }

    /// Start (or join) continuous monitoring.
    ///
    /// The background task is spawned on first subscription and exits on
    /// its own once every stream has been dropped. Must be called from
    /// within a Tokio runtime.
    pub fn subscribe(&self) -> EventStream {
        let mut slot = self.inner.task.lock().unwrap_or_else(PoisonError::into_inner);
        let receiver = self.inner.event_tx.subscribe();
        let running = slot.as_ref().is_some_and(|(_, handle)| !handle.is_finished());
        if !running {
            let cancel = self.inner.cancel.child_token();
            let handle = tokio::spawn(cycle_task(self.clone(), cancel.clone()));
            *slot = Some((cancel, handle));
            debug!("continuous monitoring started");
        }
        let initial = self.snapshots();
        drop(slot);
        EventStream::new(initial, receiver)
    }

    /// Stop continuous monitoring and wait for the task to finish.
    ///
    /// Idempotent. A cycle in flight is abandoned at its next await point
    /// without touching the table. Subscribing again restarts the task.
    pub async fn shutdown(&self) {
        let task = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((cancel, handle)) = task {
            cancel.cancel();
            let _ = handle.await;
            debug!("continuous monitoring stopped");
        }
    }

    // ── Cycle ───────────────────────────────────────────────────────

    async fn run_cycle(&self) -> Result<Vec<ChangeEvent>, EnumerationError> {
        let _cycle = self.inner.cycle_lock.lock().await;

        let records = match self.enumerate().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "cycle aborted");
                let _ = self.inner.event_tx.send(MonitorEvent::BackendUnavailable {
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };

        let observations = join_all(records.into_iter().map(|record| self.observe(record))).await;

        // Nothing below awaits: the swap and the broadcasts form one batch.
        let previous = self.inner.table.load_full();
        let now = Utc::now();
        let (table, events) = reconcile(&previous, observations, now);
        log_transitions(&previous, &table);
        let devices = table.len();
        self.inner.table.store(Arc::new(table));

        for event in &events {
            let _ = self.inner.event_tx.send(MonitorEvent::Change(event.clone()));
        }
        let _ = self
            .inner
            .event_tx
            .send(MonitorEvent::CycleCompleted { at: now, devices });
        self.inner.last_cycle.send_replace(Some(now));
        debug!(devices, events = events.len(), "cycle completed");
        Ok(events)
    }

    async fn enumerate(&self) -> Result<Vec<DeviceRecord>, EnumerationError> {
        let timeout = self.inner.config.enumerate_timeout;
        match tokio::time::timeout(timeout, self.inner.backend.list_devices()).await {
            Ok(result) => result,
            Err(_) => Err(EnumerationError::BackendUnavailable {
                reason: format!("device listing timed out after {}ms", timeout.as_millis()),
                timed_out: true,
            }),
        }
    }

    async fn observe(&self, record: DeviceRecord) -> Observation {
        if !record.codec.is_sbc_family() {
            return Observation {
                record,
                outcome: FetchOutcome::NotApplicable,
            };
        }
        let Some(transport) = record.transport_ref.clone() else {
            return Observation {
                record,
                outcome: FetchOutcome::Failed(ConfigIssue::Fetch(
                    FetchError::NoConfigurationExposed {
                        reason: "listing carries no Bluetooth address".into(),
                    },
                )),
            };
        };

        let timeout = self.inner.config.fetch_timeout;
        let fetched =
            match tokio::time::timeout(timeout, self.inner.backend.fetch_config(&transport)).await
            {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }),
            };

        let outcome = match fetched {
            Ok(raw) => match codec::decode(&raw) {
                Ok(params) => FetchOutcome::Decoded { raw, params },
                Err(e) => FetchOutcome::Failed(ConfigIssue::Decode(e)),
            },
            Err(e @ (FetchError::TransportGone { .. } | FetchError::Timeout { .. })) => {
                debug!(device = %record.device_id, error = %e, "transport gone for this cycle");
                FetchOutcome::Gone(e)
            }
            Err(e) => FetchOutcome::Failed(ConfigIssue::Fetch(e)),
        };
        Observation { record, outcome }
    }
}

/// Warn when a device enters a failing state; stay quiet while it persists.
fn log_transitions(previous: &SnapshotTable, table: &SnapshotTable) {
    for (id, snapshot) in table {
        let Some(issue) = snapshot.status.issue() else {
            continue;
        };
        let persisted = previous
            .get(id)
            .is_some_and(|old| old.status.issue() == Some(issue));
        if persisted {
            debug!(device = %id, issue = %issue, "configuration still unknown");
        } else {
            warn!(device = %id, issue = %issue, "configuration unknown");
        }
    }
    let added = table.keys().filter(|id| !previous.contains_key(*id)).count();
    let removed = previous.keys().filter(|id| !table.contains_key(*id)).count();
    if added > 0 || removed > 0 {
        info!(added, removed, total = table.len(), "device set changed");
    }
}

// ── Background task ─────────────────────────────────────────────────

async fn cycle_task<B: Backend>(monitor: Monitor<B>, cancel: CancellationToken) {
    let config = monitor.inner.config.clone();
    let mut interval = tokio::time::interval(config.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut signal = match config.trigger {
        Trigger::Events => monitor.inner.backend.change_signal(),
        Trigger::Interval => None,
    };

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
            notified = next_signal(&mut signal) => {
                if notified.is_none() {
                    debug!("change feed ended; falling back to the interval");
                    signal = None;
                    continue;
                }
                // Coalesce a burst into one cycle.
                if let Some(rx) = signal.as_mut() {
                    while rx.try_recv().is_ok() {}
                }
                interval.reset();
            }
        }

        if !monitor.retain_task() {
            break;
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = monitor.run_cycle() => {
                if let Err(e) = result {
                    debug!(error = %e, "retrying next cycle");
                }
            }
        }
    }
}

async fn next_signal(signal: &mut Option<mpsc::Receiver<()>>) -> Option<()> {
    match signal {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl<B: Backend> Monitor<B> {
    /// Called by the cycle task before each cycle: clears the task slot and
    /// returns `false` when nobody is listening any more. Runs under the slot
    /// lock so it cannot race a concurrent `subscribe`.
    fn retain_task(&self) -> bool {
        let mut slot = self.inner.task.lock().unwrap_or_else(PoisonError::into_inner);
        if self.inner.event_tx.receiver_count() > 0 {
            return true;
        }
        debug!("no subscribers left; stopping continuous monitoring");
        *slot = None;
        false
    }
}
