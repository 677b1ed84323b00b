// ── Snapshot and event types ──

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::device::{DeviceId, DeviceRecord};
use super::estimate::BitrateEstimate;
use super::sbc::{DecodedSbcParams, RawTransportConfig};
use crate::error::{DecodeError, FetchError};

/// Why a device's parameters are unknown this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "stage", content = "error", rename_all = "snake_case")]
pub enum ConfigIssue {
    #[error(transparent)]
    Fetch(FetchError),
    #[error(transparent)]
    Decode(DecodeError),
}

/// How far the monitor got with a device's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "issue", rename_all = "snake_case")]
pub enum ConfigStatus {
    /// Fetched and decoded; `params` is set.
    Decoded,
    /// Fetch or decode failed; retried next cycle.
    Unknown(ConfigIssue),
    /// Codec has no decodable layout; the bitrate is nominal.
    NotApplicable,
}

impl ConfigStatus {
    pub fn issue(&self) -> Option<&ConfigIssue> {
        match self {
            Self::Unknown(issue) => Some(issue),
            Self::Decoded | Self::NotApplicable => None,
        }
    }
}

/// The monitor's view of one device after a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    pub record: DeviceRecord,
    pub params: Option<DecodedSbcParams>,
    pub bitrate: Option<BitrateEstimate>,
    pub status: ConfigStatus,
    /// Last successfully fetched blob, for display.
    pub raw: Option<RawTransportConfig>,
    pub last_seen_at: DateTime<Utc>,
}

impl DeviceSnapshot {
    pub fn device_id(&self) -> &DeviceId {
        &self.record.device_id
    }
}

/// Per-device outcome of one monitor cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    Connected {
        snapshot: Arc<DeviceSnapshot>,
    },
    Disconnected {
        device_id: DeviceId,
    },
    /// Decoded parameters differ from the previous cycle (including the
    /// transition from unknown to known).
    Renegotiated {
        old: Arc<DeviceSnapshot>,
        new: Arc<DeviceSnapshot>,
    },
    /// Previously decoded parameters were lost this cycle.
    ConfigurationUnknown {
        snapshot: Arc<DeviceSnapshot>,
    },
    Unchanged {
        device_id: DeviceId,
    },
}

impl ChangeEvent {
    pub fn device_id(&self) -> &DeviceId {
        match self {
            Self::Connected { snapshot } | Self::ConfigurationUnknown { snapshot } => {
                snapshot.device_id()
            }
            Self::Renegotiated { new, .. } => new.device_id(),
            Self::Disconnected { device_id } | Self::Unchanged { device_id } => device_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Disconnected { .. } => "disconnected",
            Self::Renegotiated { .. } => "renegotiated",
            Self::ConfigurationUnknown { .. } => "configuration_unknown",
            Self::Unchanged { .. } => "unchanged",
        }
    }

    /// Snapshot after the event, when there is one.
    pub fn snapshot(&self) -> Option<&Arc<DeviceSnapshot>> {
        match self {
            Self::Connected { snapshot } | Self::ConfigurationUnknown { snapshot } => Some(snapshot),
            Self::Renegotiated { new, .. } => Some(new),
            Self::Disconnected { .. } | Self::Unchanged { .. } => None,
        }
    }
}

/// Everything a continuous subscriber can observe.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    Change(ChangeEvent),
    /// The snapshot table was replaced with this cycle's result.
    CycleCompleted { at: DateTime<Utc>, devices: usize },
    /// The cycle was aborted; the table is untouched and the next cycle retries.
    BackendUnavailable { reason: String },
    /// This subscriber fell behind and the oldest events were dropped.
    Lagged { missed: u64 },
}
