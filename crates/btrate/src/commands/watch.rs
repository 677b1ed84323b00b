//! Continuous monitoring: redraw the table per cycle, or print change lines.

use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use btrate_core::{ChangeEvent, DeviceSnapshot, Monitor, MonitorEvent, SystemBackend};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config::Config;
use crate::error::CliError;
use crate::output::{self, Tone, paint};

use super::Ctx;
use super::status::{khz, render_snapshots};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

pub async fn handle(
    args: &WatchArgs,
    cfg: &Config,
    global: &GlobalOpts,
    ctx: Ctx,
) -> Result<(), CliError> {
    let monitor = super::build_monitor(global, cfg, args.interval, args.trigger)?;
    let interval = monitor.config().interval;
    let mut stream = monitor.subscribe();
    tracing::info!(interval = %humantime::format_duration(interval), "watching");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = stream.recv() => {
                let Some(event) = event else { break };
                if args.events {
                    print_event(&event, ctx);
                } else {
                    redraw(&monitor, &event, interval, ctx);
                }
            }
        }
    }

    drop(stream);
    monitor.shutdown().await;
    Ok(())
}

// ── Redraw mode ─────────────────────────────────────────────────────

fn redraw(monitor: &Monitor<SystemBackend>, event: &MonitorEvent, interval: Duration, ctx: Ctx) {
    let table_mode = ctx.format == OutputFormat::Table;
    let clear = table_mode && io::stdout().is_terminal();
    match event {
        MonitorEvent::CycleCompleted { at, .. } => {
            let snapshots = monitor.snapshots();
            let body = if snapshots.is_empty() && table_mode {
                "No Bluetooth audio devices found".to_owned()
            } else {
                render_snapshots(&snapshots, ctx)
            };
            if table_mode {
                let footer = paint(
                    &format!(
                        "Updated {} · every {} · Ctrl-C to quit",
                        at.with_timezone(&chrono::Local).format("%H:%M:%S"),
                        humantime::format_duration(interval)
                    ),
                    Tone::Dim,
                    ctx.color,
                );
                emit(&format!("{body}\n{footer}"), clear, ctx.quiet);
            } else {
                emit(&body, false, ctx.quiet);
            }
        }
        MonitorEvent::BackendUnavailable { reason } => {
            let text = if table_mode {
                paint(
                    &format!("Audio backend unavailable: {reason} (retrying)"),
                    Tone::Bad,
                    ctx.color,
                )
            } else {
                outage_record(event, ctx.format)
            };
            emit(&text, clear, ctx.quiet);
        }
        MonitorEvent::Lagged { missed } => {
            tracing::debug!(missed, "display fell behind");
        }
        MonitorEvent::Change(_) => {}
    }
}

/// The outage as one record in the snapshot stream's format.
fn outage_record(event: &MonitorEvent, format: OutputFormat) -> String {
    let line = |e: &MonitorEvent| match e {
        MonitorEvent::BackendUnavailable { reason } => format!("backend unavailable: {reason}"),
        _ => String::new(),
    };
    output::render_single(format, event, line, line)
}

fn emit(text: &str, clear: bool, quiet: bool) {
    if quiet {
        return;
    }
    let mut stdout = io::stdout().lock();
    if clear {
        let _ = write!(stdout, "{CLEAR_SCREEN}");
    }
    let _ = writeln!(stdout, "{text}");
    let _ = stdout.flush();
}

// ── Event-line mode ─────────────────────────────────────────────────

fn print_event(event: &MonitorEvent, ctx: Ctx) {
    let rendered = match ctx.format {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            is_reported(event).then(|| output::render_json_compact(event))
        }
        OutputFormat::Yaml => {
            is_reported(event).then(|| format!("---\n{}", output::render_yaml(event).trim_end()))
        }
        OutputFormat::Table | OutputFormat::Plain => event_line(event, ctx.color),
    };
    if let Some(line) = rendered {
        output::print_output(&line, ctx.quiet);
    }
}

/// Events worth a line; unchanged devices and cycle ticks stay silent.
fn is_reported(event: &MonitorEvent) -> bool {
    !matches!(
        event,
        MonitorEvent::Change(ChangeEvent::Unchanged { .. }) | MonitorEvent::CycleCompleted { .. }
    )
}

fn event_line(event: &MonitorEvent, color: bool) -> Option<String> {
    let now = chrono::Local::now().format("%H:%M:%S");
    let (label, tone, text) = match event {
        MonitorEvent::Change(change) => match change {
            ChangeEvent::Connected { snapshot } => ("connected", Tone::Good, describe(snapshot)),
            ChangeEvent::Disconnected { device_id } => {
                ("disconnected", Tone::Dim, device_id.to_string())
            }
            ChangeEvent::Renegotiated { old, new } => (
                "renegotiated",
                Tone::Warn,
                format!("{} -> {}", summary(old), describe(new)),
            ),
            ChangeEvent::ConfigurationUnknown { snapshot } => {
                ("unknown", Tone::Warn, describe(snapshot))
            }
            ChangeEvent::Unchanged { .. } => return None,
        },
        MonitorEvent::BackendUnavailable { reason } => ("backend", Tone::Bad, reason.clone()),
        MonitorEvent::Lagged { missed } => {
            ("lagged", Tone::Dim, format!("{missed} events dropped"))
        }
        MonitorEvent::CycleCompleted { .. } => return None,
    };
    Some(format!("{now}  {}  {text}", paint(&format!("{label:<12}"), tone, color)))
}

/// `ID (Name): codec operating point, bitrate`.
fn describe(s: &DeviceSnapshot) -> String {
    format!("{} ({}): {}", s.device_id(), s.record.display_name, summary(s))
}

fn summary(s: &DeviceSnapshot) -> String {
    let bitrate = s
        .bitrate
        .map_or_else(String::new, |b| format!(", {b}"));
    match (s.params, s.status.issue()) {
        (Some(p), _) => format!(
            "{} {} {} bitpool {}{}{bitrate}",
            s.record.codec,
            khz(p.sample_rate_hz.hz()),
            p.channel_mode.label(),
            p.bitpool,
            if p.is_dual_channel_xq { " (XQ)" } else { "" },
        ),
        (None, Some(issue)) => {
            format!("{}{bitrate}, configuration unknown: {issue}", s.record.codec)
        }
        (None, None) => format!("{}{bitrate}", s.record.codec),
    }
}
