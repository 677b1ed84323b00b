//! CLI configuration: thin wrapper around `btrate_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--config, --backend, --adapter, --output, --color).

use std::path::PathBuf;

use clap::ValueEnum;

use btrate_core::{BackendChoice, MonitorConfig, Trigger};

use crate::cli::{BackendArg, ColorMode, GlobalOpts, OutputFormat, TriggerArg};
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use btrate_config::{Config, load_config_from, save_config_to, to_codec_rebuild};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Config file in effect: `--config` / `BTRATE_CONFIG`, else the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(btrate_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(load_config_from(&config_path(global))?)
}

/// Output format: flag > config `[defaults].output` > table.
pub fn output_format(global: &GlobalOpts, cfg: &Config) -> OutputFormat {
    global.output.unwrap_or_else(|| {
        OutputFormat::from_str(&cfg.defaults.output, true).unwrap_or(OutputFormat::Table)
    })
}

/// Color mode: flag > config `[defaults].color` > auto.
pub fn color_mode(global: &GlobalOpts, cfg: &Config) -> ColorMode {
    global
        .color
        .unwrap_or_else(|| ColorMode::from_str(&cfg.defaults.color, true).unwrap_or(ColorMode::Auto))
}

/// Translate the `[monitor]` section plus global and per-command flags
/// into a validated `MonitorConfig`.
pub fn monitor_config(
    global: &GlobalOpts,
    cfg: &Config,
    interval_secs: Option<u64>,
    trigger: Option<TriggerArg>,
) -> Result<MonitorConfig, CliError> {
    let mut section = cfg.monitor.clone();
    if let Some(backend) = global.backend {
        section.backend = match backend {
            BackendArg::Auto => BackendChoice::Auto,
            BackendArg::Pactl => BackendChoice::Pactl,
            BackendArg::PwDump => BackendChoice::PwDump,
        };
    }
    if let Some(ref adapter) = global.adapter {
        section.adapter.clone_from(adapter);
    }
    if let Some(secs) = interval_secs {
        section.interval_secs = secs;
    }
    if let Some(trigger) = trigger {
        section.trigger = match trigger {
            TriggerArg::Interval => Trigger::Interval,
            TriggerArg::Events => Trigger::Events,
        };
    }
    Ok(btrate_config::to_monitor_config(&section)?)
}
