// ── External codec-rebuild tool ──
//
// The privileged patch/rebuild pipeline lives outside this crate. We only
// know its invocation contract:
//
//   <program> [base args] --bitpool N [--bitpool-48k M] [--pipewire-tag T]
//
// Exit status 0 means the patched build was installed. The tool performs
// its own backup of the previous binary and announces it on stdout as a
// `BACKUP_PATH=<path>` line.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::runner::read_line_lossy;

const BACKUP_PREFIX: &str = "BACKUP_PATH=";

/// Which stream an output line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One line of tool output, forwarded live to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

/// Parameters handed to the rebuild tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildRequest {
    pub bitpool: u8,
    /// Separate ceiling for 48 kHz streams; the tool picks its own when absent.
    pub bitpool_48k: Option<u8>,
    /// PipeWire release tag to build against.
    pub pipewire_tag: Option<String>,
}

/// What the tool reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub backup_path: Option<PathBuf>,
    /// Last stderr line, kept for error reporting.
    pub last_error_line: Option<String>,
}

/// Handle to the external tool.
#[derive(Debug, Clone)]
pub struct RebuildTool {
    program: String,
    base_args: Vec<String>,
}

impl RebuildTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
        }
    }

    /// Leading arguments placed before the contract flags (e.g. a script path
    /// when `program` is an interpreter or `pkexec`).
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Full argument vector for a request.
    pub fn command_args(&self, request: &RebuildRequest) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.push("--bitpool".into());
        args.push(request.bitpool.to_string());
        if let Some(bitpool_48k) = request.bitpool_48k {
            args.push("--bitpool-48k".into());
            args.push(bitpool_48k.to_string());
        }
        if let Some(ref tag) = request.pipewire_tag {
            args.push("--pipewire-tag".into());
            args.push(tag.clone());
        }
        args
    }

    /// Run the tool to completion.
    ///
    /// Output lines are forwarded to `lines` as they arrive. The build can
    /// take minutes, so no deadline is applied here.
    pub async fn run(
        &self,
        request: &RebuildRequest,
        lines: Option<mpsc::UnboundedSender<OutputLine>>,
    ) -> Result<RebuildOutcome, Error> {
        let args = self.command_args(request);
        info!(program = %self.program, ?args, "starting codec rebuild");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (stdout_result, stderr_result) = tokio::join!(
            pump(stdout, OutputStream::Stdout, lines.clone()),
            pump(stderr, OutputStream::Stderr, lines),
        );
        let stdout_lines = stdout_result?;
        let stderr_lines = stderr_result?;
        let status = child.wait().await?;

        let backup_path = stdout_lines
            .iter()
            .rev()
            .find_map(|l| parse_backup_line(l));
        let outcome = RebuildOutcome {
            success: status.success(),
            exit_code: status.code(),
            backup_path,
            last_error_line: stderr_lines.last().cloned(),
        };

        if outcome.success {
            info!(backup = ?outcome.backup_path, "codec rebuild finished");
        } else {
            warn!(code = ?outcome.exit_code, "codec rebuild failed");
        }
        Ok(outcome)
    }
}

/// Extract the path from a `BACKUP_PATH=<path>` announcement.
pub fn parse_backup_line(line: &str) -> Option<PathBuf> {
    let path = line.trim().strip_prefix(BACKUP_PREFIX)?.trim();
    (!path.is_empty()).then(|| PathBuf::from(path))
}

async fn pump<S>(
    source: Option<S>,
    stream: OutputStream,
    sink: Option<mpsc::UnboundedSender<OutputLine>>,
) -> Result<Vec<String>, Error>
where
    S: AsyncRead + Unpin,
{
    let Some(source) = source else {
        return Ok(Vec::new());
    };
    let mut collected = Vec::new();
    let mut reader = BufReader::new(source);
    let mut buf = Vec::new();
    while let Some(line) = read_line_lossy(&mut reader, &mut buf).await? {
        debug!(?stream, line = %line, "rebuild output");
        if let Some(ref sink) = sink {
            // A receiver that went away only stops the live echo.
            let _ = sink.send(OutputLine {
                stream,
                text: line.clone(),
            });
        }
        collected.push(line);
    }
    Ok(collected)
}
