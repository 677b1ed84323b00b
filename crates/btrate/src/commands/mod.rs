//! Command dispatch: bridges CLI args -> core Monitor / codec -> output formatting.

pub mod config_cmd;
pub mod decode;
pub mod estimate;
pub mod rebuild;
pub mod status;
pub mod watch;

use btrate_core::{Monitor, SystemBackend};

use crate::cli::{Command, GlobalOpts, OutputFormat, TriggerArg};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

/// Resolved presentation settings shared by all handlers.
#[derive(Debug, Clone, Copy)]
pub struct Ctx {
    pub format: OutputFormat,
    pub color: bool,
    pub quiet: bool,
}

impl Ctx {
    pub fn new(global: &GlobalOpts, cfg: &Config) -> Self {
        Self {
            format: config::output_format(global, cfg),
            color: output::should_color(config::color_mode(global, cfg)),
            quiet: global.quiet,
        }
    }
}

/// Dispatch a command to the appropriate handler.
pub async fn dispatch(cmd: Command, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let ctx = Ctx::new(global, cfg);
    match cmd {
        Command::Status(args) => status::handle(&args, cfg, global, ctx).await,
        Command::Watch(args) => watch::handle(&args, cfg, global, ctx).await,
        Command::Decode(args) => decode::handle(&args, ctx),
        Command::Estimate(args) => estimate::handle(&args, ctx),
        Command::Rebuild(args) => rebuild::handle(args, cfg, global, ctx).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) | Command::Manpage(_) => unreachable!(),
    }
}

/// Build a monitor over the system backend from config + flag overrides.
pub fn build_monitor(
    global: &GlobalOpts,
    cfg: &Config,
    interval_secs: Option<u64>,
    trigger: Option<TriggerArg>,
) -> Result<Monitor<SystemBackend>, CliError> {
    let monitor_config = config::monitor_config(global, cfg, interval_secs, trigger)?;
    let backend = SystemBackend::from_config(&monitor_config);
    Ok(Monitor::new(backend, monitor_config)?)
}
