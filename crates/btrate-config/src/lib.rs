//! Configuration for the btrate terminal client.
//!
//! One TOML file layered under `BTRATE_` environment overrides, and
//! translation to `btrate_core::MonitorConfig` / `CodecRebuild`. The core
//! crate never reads files; this is the only place that does.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use btrate_core::{BackendChoice, CodecRebuild, MonitorConfig, RebuildTool, Trigger};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "BTRATE_CONFIG";

const ENV_PREFIX: &str = "BTRATE_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorSection,

    #[serde(default)]
    pub rebuild: RebuildSection,

    /// Output defaults for the terminal client.
    #[serde(default)]
    pub defaults: Defaults,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MonitorSection {
    /// Seconds between cycles; at least 1.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_enumerate_timeout_ms")]
    pub enumerate_timeout_ms: u64,

    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Per-subscriber event queue depth.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    #[serde(default = "default_adapter")]
    pub adapter: String,

    #[serde(default)]
    pub backend: BackendChoice,

    #[serde(default)]
    pub trigger: Trigger,

    pub pactl_program: Option<PathBuf>,
    pub pw_dump_program: Option<PathBuf>,
    pub busctl_program: Option<PathBuf>,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            enumerate_timeout_ms: default_enumerate_timeout_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            event_buffer: default_event_buffer(),
            adapter: default_adapter(),
            backend: BackendChoice::default(),
            trigger: Trigger::default(),
            pactl_program: None,
            pw_dump_program: None,
            busctl_program: None,
        }
    }
}

fn default_interval_secs() -> u64 {
    2
}
fn default_enumerate_timeout_ms() -> u64 {
    5000
}
fn default_fetch_timeout_ms() -> u64 {
    2000
}
fn default_event_buffer() -> usize {
    256
}
fn default_adapter() -> String {
    "hci0".into()
}

/// The external codec-rebuild tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RebuildSection {
    /// Executable to run (the tool itself, or an interpreter / `pkexec`).
    pub program: Option<PathBuf>,

    /// Leading arguments, e.g. the script path when `program` is `bash`.
    #[serde(default)]
    pub args: Vec<String>,

    /// PipeWire release tag used when the command line names none.
    pub pipewire_tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `BTRATE_CONFIG`, else XDG / platform conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("org", "btrate", "btrate").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("btrate");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from an explicit file; a missing file means defaults.
///
/// Environment variables override the file, with `__` separating
/// sections: `BTRATE_MONITOR__INTERVAL_SECS=5`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a validated `MonitorConfig` from the `[monitor]` section.
pub fn to_monitor_config(section: &MonitorSection) -> Result<MonitorConfig, ConfigError> {
    if section.interval_secs == 0 {
        return Err(ConfigError::Validation {
            field: "monitor.interval_secs".into(),
            reason: "must be at least 1".into(),
        });
    }
    if section.event_buffer == 0 {
        return Err(ConfigError::Validation {
            field: "monitor.event_buffer".into(),
            reason: "must be at least 1".into(),
        });
    }

    let config = MonitorConfig {
        interval: Duration::from_secs(section.interval_secs),
        enumerate_timeout: Duration::from_millis(section.enumerate_timeout_ms),
        fetch_timeout: Duration::from_millis(section.fetch_timeout_ms),
        event_buffer: section.event_buffer,
        adapter: section.adapter.clone(),
        backend: section.backend,
        trigger: section.trigger,
        pactl_program: section.pactl_program.clone(),
        pw_dump_program: section.pw_dump_program.clone(),
        busctl_program: section.busctl_program.clone(),
    };
    config.validate().map_err(|e| ConfigError::Validation {
        field: "monitor".into(),
        reason: e.to_string(),
    })?;
    Ok(config)
}

/// Build the rebuild wrapper from the `[rebuild]` section.
pub fn to_codec_rebuild(section: &RebuildSection) -> Result<CodecRebuild, ConfigError> {
    let program = section.program.as_ref().ok_or_else(|| ConfigError::Validation {
        field: "rebuild.program".into(),
        reason: "no rebuild tool configured".into(),
    })?;
    let tool = RebuildTool::new(program.to_string_lossy()).with_args(section.args.iter().cloned());
    Ok(CodecRebuild::new(tool).with_default_tag(section.pipewire_tag.clone()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_jail| {
            let config = load_config_from(Path::new("absent.toml")).unwrap();
            assert_eq!(config, Config::default());
            assert_eq!(config.monitor.interval_secs, 2);
            assert_eq!(config.defaults.output, "table");
            Ok(())
        });
    }

    #[test]
    fn file_values_are_layered_over_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [monitor]
                interval_secs = 5
                backend = "pw-dump"
                trigger = "events"

                [rebuild]
                program = "/usr/local/bin/sbc-xq-rebuild"
                pipewire_tag = "1.0.5"
                "#,
            )?;
            let config = load_config_from(Path::new("config.toml")).unwrap();
            assert_eq!(config.monitor.interval_secs, 5);
            assert_eq!(config.monitor.backend, BackendChoice::PwDump);
            assert_eq!(config.monitor.trigger, Trigger::Events);
            assert_eq!(config.monitor.fetch_timeout_ms, 2000);
            assert_eq!(config.rebuild.pipewire_tag.as_deref(), Some("1.0.5"));
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[monitor]\ninterval_secs = 5\nadapter = \"hci0\"\n")?;
            jail.set_env("BTRATE_MONITOR__INTERVAL_SECS", "9");
            jail.set_env("BTRATE_MONITOR__ADAPTER", "hci1");
            let config = load_config_from(Path::new("config.toml")).unwrap();
            assert_eq!(config.monitor.interval_secs, 9);
            assert_eq!(config.monitor.adapter, "hci1");
            Ok(())
        });
    }

    #[test]
    fn zero_interval_is_rejected() {
        let section = MonitorSection {
            interval_secs: 0,
            ..MonitorSection::default()
        };
        let err = to_monitor_config(&section).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "monitor.interval_secs"));
    }

    #[test]
    fn monitor_section_translates() {
        let config = to_monitor_config(&MonitorSection::default()).unwrap();
        assert_eq!(config.interval, Duration::from_secs(2));
        assert_eq!(config.enumerate_timeout, Duration::from_millis(5000));
        assert_eq!(config.event_buffer, 256);
    }

    #[test]
    fn bad_adapter_is_rejected() {
        let section = MonitorSection {
            adapter: "/org/bluez".into(),
            ..MonitorSection::default()
        };
        assert!(to_monitor_config(&section).is_err());
    }

    #[test]
    fn rebuild_requires_a_program() {
        assert!(to_codec_rebuild(&RebuildSection::default()).is_err());

        let section = RebuildSection {
            program: Some("bash".into()),
            args: vec!["/opt/btrate/rebuild.sh".into()],
            pipewire_tag: None,
        };
        let rebuild = to_codec_rebuild(&section).unwrap();
        assert_eq!(rebuild.tool().program(), "bash");
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.monitor.interval_secs = 7;
        config.rebuild.args = vec!["--verbose".into()];

        save_config_to(&config, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("interval_secs = 7"));
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
