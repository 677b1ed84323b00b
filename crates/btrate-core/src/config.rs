// ── Runtime monitor configuration ──
//
// Describes how the monitor talks to the platform and how often it
// cycles. Never touches disk: the CLI builds a `MonitorConfig` and hands
// it in.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Which sink listing source(s) to query.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum BackendChoice {
    /// `pactl` first, `pw-dump` when it yields nothing or cannot run.
    #[default]
    Auto,
    Pactl,
    PwDump,
}

/// What starts a monitor cycle.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Trigger {
    /// Fixed cadence.
    #[default]
    Interval,
    /// Audio-server change notifications, with the interval as fallback.
    Events,
}

/// Configuration for one monitor instance.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between cycles.
    pub interval: Duration,
    /// Bound on one sink listing call.
    pub enumerate_timeout: Duration,
    /// Bound on one device's configuration fetch.
    pub fetch_timeout: Duration,
    /// Per-subscriber event queue depth; the oldest events drop on overflow.
    pub event_buffer: usize,
    /// BlueZ adapter the devices hang off (`hci0`).
    pub adapter: String,
    pub backend: BackendChoice,
    pub trigger: Trigger,
    /// Override executables, mostly for tests and unusual installs.
    pub pactl_program: Option<PathBuf>,
    pub pw_dump_program: Option<PathBuf>,
    pub busctl_program: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            enumerate_timeout: Duration::from_millis(5000),
            fetch_timeout: Duration::from_millis(2000),
            event_buffer: 256,
            adapter: "hci0".into(),
            backend: BackendChoice::Auto,
            trigger: Trigger::Interval,
            pactl_program: None,
            pw_dump_program: None,
            busctl_program: None,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.interval < Duration::from_secs(1) {
            return Err(CoreError::Validation {
                message: "interval must be at least 1 second".into(),
            });
        }
        if self.event_buffer == 0 {
            return Err(CoreError::Validation {
                message: "event buffer must hold at least one event".into(),
            });
        }
        if self.enumerate_timeout.is_zero() || self.fetch_timeout.is_zero() {
            return Err(CoreError::Validation {
                message: "timeouts must be non-zero".into(),
            });
        }
        if self.adapter.trim().is_empty() || self.adapter.contains('/') {
            return Err(CoreError::Validation {
                message: format!("invalid adapter name `{}`", self.adapter),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(MonitorConfig::default().validate().is_ok());
    }

    #[test]
    fn sub_second_interval_is_rejected() {
        let config = MonitorConfig {
            interval: Duration::from_millis(500),
            ..MonitorConfig::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Validation { .. })));
    }

    #[test]
    fn zero_buffer_is_rejected() {
        let config = MonitorConfig {
            event_buffer: 0,
            ..MonitorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn backend_names_parse() {
        assert_eq!("pw-dump".parse::<BackendChoice>().ok(), Some(BackendChoice::PwDump));
        assert_eq!(Trigger::Events.to_string(), "events");
    }
}
