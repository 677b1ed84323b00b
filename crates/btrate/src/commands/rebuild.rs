//! Drive the external SBC-XQ rebuild tool and stream its output.

use std::io::{self, Write};
use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::mpsc;

use btrate_core::{OutputLine, OutputStream, RebuildRequest};

use crate::cli::{GlobalOpts, OutputFormat, RebuildArgs};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output::{self, Tone, paint};

use super::Ctx;

#[derive(Debug, Serialize)]
struct RebuildReport {
    success: bool,
    exit_code: Option<i32>,
    backup_path: Option<PathBuf>,
}

impl RebuildReport {
    fn detail(&self, color: bool) -> String {
        let mut lines = vec![paint("Codec rebuild installed", Tone::Good, color)];
        if let Some(ref backup) = self.backup_path {
            lines.push(format!("Backup: {}", backup.display()));
        }
        lines.push("Reconnect your Bluetooth device to use the new codec.".into());
        lines.join("\n")
    }
}

/// Where tool stdout goes: straight through for human formats, to stderr
/// when stdout carries a structured report.
fn pass_through(format: OutputFormat) -> bool {
    matches!(format, OutputFormat::Table | OutputFormat::Plain)
}

fn print_line(line: &OutputLine, to_stdout: bool) {
    match line.stream {
        OutputStream::Stdout if to_stdout => {
            let _ = writeln!(io::stdout().lock(), "{}", line.text);
        }
        OutputStream::Stdout | OutputStream::Stderr => {
            let _ = writeln!(io::stderr().lock(), "{}", line.text);
        }
    }
}

pub async fn handle(
    args: RebuildArgs,
    cfg: &Config,
    global: &GlobalOpts,
    ctx: Ctx,
) -> Result<(), CliError> {
    let rebuild = config::to_codec_rebuild(&cfg.rebuild).map_err(|_| CliError::NoRebuildTool {
        path: config::config_path(global).display().to_string(),
    })?;

    let request = RebuildRequest {
        bitpool: args.bitpool,
        bitpool_48k: args.bitpool_48k,
        pipewire_tag: args.pipewire_tag,
    };
    tracing::info!(program = rebuild.tool().program(), bitpool = request.bitpool, "starting rebuild");

    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let to_stdout = pass_through(ctx.format);
    let quiet = ctx.quiet;
    let printer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if !quiet {
                print_line(&line, to_stdout);
            }
        }
    });

    let result = rebuild.run(request, Some(tx)).await;
    // The sender is dropped with the run; drain whatever is left.
    if let Err(e) = printer.await {
        tracing::debug!(error = %e, "output printer ended abnormally");
    }
    let outcome = result?;

    let report = RebuildReport {
        success: outcome.success,
        exit_code: outcome.exit_code,
        backup_path: outcome.backup_path,
    };
    let out = output::render_single(
        ctx.format,
        &report,
        |r| r.detail(ctx.color),
        |r| {
            r.backup_path
                .as_ref()
                .map_or_else(String::new, |p| p.display().to_string())
        },
    );
    output::print_output(&out, ctx.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_formats_keep_tool_output_off_stdout() {
        assert!(pass_through(OutputFormat::Table));
        assert!(pass_through(OutputFormat::Plain));
        assert!(!pass_through(OutputFormat::Json));
        assert!(!pass_through(OutputFormat::Yaml));
    }

    #[test]
    fn detail_names_the_backup() {
        let report = RebuildReport {
            success: true,
            exit_code: Some(0),
            backup_path: Some(PathBuf::from("/var/backups/libspa-codec-bluez5-sbc.so")),
        };
        let text = report.detail(false);
        assert!(text.starts_with("Codec rebuild installed"));
        assert!(text.contains("Backup: /var/backups/libspa-codec-bluez5-sbc.so"));
        assert!(text.ends_with("Reconnect your Bluetooth device to use the new codec."));
    }
}
