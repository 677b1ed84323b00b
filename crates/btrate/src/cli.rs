//! Clap derive structures for the `btrate` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.
//! Only clap and clap_complete are used here so `build.rs` can include
//! this file to render man pages.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// btrate -- watch the negotiated codec and SBC bitrate of Bluetooth audio sinks
#[derive(Debug, Parser)]
#[command(
    name = "btrate",
    version,
    about = "Watch the negotiated codec and bitrate of Bluetooth audio sinks",
    long_about = "Reads connected Bluetooth sinks from PipeWire / PulseAudio, decodes the\n\
        SBC configuration BlueZ negotiated for each transport, and reports the\n\
        effective bitrate. Recognizes SBC-XQ (dual channel at high bitpool).",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "BTRATE_CONFIG", global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format [default: from config, else table]
    #[arg(long, short = 'o', env = "BTRATE_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output [default: from config, else auto]
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Sink listing source (overrides config)
    #[arg(long, global = true)]
    pub backend: Option<BackendArg>,

    /// BlueZ adapter name, e.g. hci0 (overrides config)
    #[arg(long, global = true)]
    pub adapter: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one device per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    /// pactl first, pw-dump as fallback
    Auto,
    /// PulseAudio protocol listing only
    Pactl,
    /// PipeWire JSON dump only
    PwDump,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TriggerArg {
    /// Fixed cadence
    Interval,
    /// Audio server change notifications, interval as fallback
    Events,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sample connected devices once and exit
    #[command(alias = "once", alias = "st")]
    Status(StatusArgs),

    /// Monitor devices continuously until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Decode a raw SBC configuration blob (hex)
    Decode(DecodeArgs),

    /// Compute the SBC bitrate for chosen parameters
    #[command(alias = "calc")]
    Estimate(EstimateArgs),

    /// Run the external SBC-XQ rebuild tool
    Rebuild(RebuildArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),

    /// Print a roff man page to stdout
    Manpage(ManpageArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  MONITORING
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Show details for one device (address or node name)
    #[arg(long, short = 'd')]
    pub device: Option<String>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Seconds between cycles (overrides config, minimum 1)
    #[arg(long, short = 'i', value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// What starts a cycle (overrides config)
    #[arg(long)]
    pub trigger: Option<TriggerArg>,

    /// Print one line per change instead of redrawing the table
    #[arg(long, short = 'e')]
    pub events: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  OFFLINE TOOLS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// Configuration bytes as hex, e.g. 2115022f or "21 15 02 2f"
    #[arg(value_name = "HEX")]
    pub hex: String,

    /// Codec the blob belongs to
    #[arg(long, default_value = "sbc")]
    pub codec: CodecArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CodecArg {
    Sbc,
    SbcXq,
}

#[derive(Debug, Args)]
pub struct EstimateArgs {
    /// Sample rate in Hz (16000, 32000, 44100, 48000)
    #[arg(long, short = 'r', default_value = "44100")]
    pub rate: u32,

    /// Channel mode
    #[arg(long, short = 'm', default_value = "dual")]
    pub mode: ModeArg,

    /// Block length (4, 8, 12, 16)
    #[arg(long, short = 'b', default_value = "16")]
    pub blocks: u32,

    /// Subbands (4, 8)
    #[arg(long, short = 's', default_value = "8")]
    pub subbands: u32,

    /// Bit allocation method
    #[arg(long, short = 'a', default_value = "loudness")]
    pub allocation: AllocationArg,

    /// Bitpool
    #[arg(long, short = 'p', default_value = "47")]
    pub bitpool: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Mono,
    Dual,
    Stereo,
    Joint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AllocationArg {
    Loudness,
    Snr,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  REBUILD
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct RebuildArgs {
    /// Dual channel SBC-XQ bitpool at 44.1 kHz
    #[arg(long)]
    pub bitpool: u8,

    /// Dual channel SBC-XQ bitpool at 48 kHz
    #[arg(long = "bitpool-48k")]
    pub bitpool_48k: Option<u8>,

    /// PipeWire release tag to build against (overrides config)
    #[arg(long)]
    pub pipewire_tag: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG / COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Display the effective configuration (file + environment)
    Show,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[derive(Debug, Args)]
pub struct ManpageArgs {
    /// Document one subcommand instead of btrate itself
    pub command: Option<String>,
}
