// Shared process runner for the audio-server and BlueZ reporting tools.
//
// Every adapter in this crate shells out through a `CommandRunner`, so
// timeouts, locale pinning and exit-status handling live in one place and
// tests can substitute scripted output.

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::process::Command;
use tracing::trace;

use crate::error::Error;

/// Tuning shared by every invocation made through a [`SystemRunner`].
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Upper bound for a single invocation. The child is killed on expiry.
    pub timeout: Duration,
    /// Value forced into `LC_ALL` so text listings are not localized.
    pub locale: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            locale: Some("C".into()),
        }
    }
}

/// Captured result of a finished invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs an external program to completion and captures its output.
pub trait CommandRunner: Send + Sync + 'static {
    fn run(
        &self,
        program: &str,
        args: &[&str],
    ) -> impl Future<Output = Result<CommandOutput, Error>> + Send;
}

/// Run a program and turn a non-zero exit into [`Error::ExitStatus`].
pub async fn run_checked<R: CommandRunner>(
    runner: &R,
    program: &str,
    args: &[&str],
) -> Result<String, Error> {
    let output = runner.run(program, args).await?;
    if output.success() {
        Ok(output.stdout)
    } else {
        Err(Error::ExitStatus {
            program: program.to_owned(),
            code: output.code,
            stderr: output.stderr.trim().to_owned(),
        })
    }
}

/// [`CommandRunner`] backed by real child processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    config: RunnerConfig,
}

impl SystemRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }
}

impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, Error> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref locale) = self.config.locale {
            cmd.env("LC_ALL", locale);
        }

        trace!(program, ?args, "spawning");
        let child = cmd.spawn().map_err(|source| Error::Spawn {
            program: program.to_owned(),
            source,
        })?;

        // Dropping the wait future on expiry drops the child, which kills it.
        let Ok(output) = tokio::time::timeout(self.config.timeout, child.wait_with_output()).await
        else {
            return Err(Error::Timeout {
                program: program.to_owned(),
                timeout_ms: u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX),
            });
        };
        let output = output?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Read one newline-terminated line from a child's output stream.
///
/// Invalid UTF-8 is replaced rather than rejected; tools echo arbitrary
/// bytes from build logs and device names. `None` at end of stream.
pub(crate) async fn read_line_lossy<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf);
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_owned()))
}
