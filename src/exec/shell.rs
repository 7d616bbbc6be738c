use crate::error::{CommandError, CommandOutcome};
use crate::exec::{ProcessOutput, ProcessRunner};
use crate::security::ValidationError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::debug;

/// Per-stream output cap (1 MiB)
pub const DEFAULT_OUTPUT_LIMIT: usize = 1024 * 1024;

/// Runs command lines through `sh -c`
#[derive(Debug, Clone)]
pub struct ShellRunner {
    output_limit: usize,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self::with_output_limit(DEFAULT_OUTPUT_LIMIT)
    }

    /// Create a runner that fails any command writing more than `limit` bytes
    /// to stdout or stderr
    pub fn with_output_limit(limit: usize) -> Self {
        Self {
            output_limit: limit,
        }
    }

    pub fn output_limit(&self) -> usize {
        self.output_limit
    }

    /// Drain stdout and stderr concurrently, killing the group on overflow
    async fn collect_output(
        &self,
        child: &mut GroupChild,
        command_line: &str,
    ) -> CommandOutcome<(Vec<u8>, Vec<u8>)> {
        let limit = self.output_limit;
        let stdout = read_capped(child.inner.stdout.take(), limit);
        let stderr = read_capped(child.inner.stderr.take(), limit);
        tokio::pin!(stdout, stderr);

        let mut out = None;
        let mut err = None;

        while out.is_none() || err.is_none() {
            let chunk = tokio::select! {
                bytes = &mut stdout, if out.is_none() => {
                    let bytes = bytes?;
                    let over = bytes.len() > limit;
                    out = Some(bytes);
                    over
                }
                bytes = &mut stderr, if err.is_none() => {
                    let bytes = bytes?;
                    let over = bytes.len() > limit;
                    err = Some(bytes);
                    over
                }
            };

            if chunk {
                child.kill_group();
                let _ = child.inner.kill().await;
                return Err(CommandError::OutputLimitExceeded {
                    command: command_line.to_string(),
                    limit,
                });
            }
        }

        Ok((out.unwrap_or_default(), err.unwrap_or_default()))
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessRunner for ShellRunner {
    async fn run(&self, command_line: &str, cwd: &Path) -> CommandOutcome<ProcessOutput> {
        if command_line.trim().is_empty() {
            return Err(ValidationError::EmptyCommand.into());
        }

        debug!(command = command_line, cwd = %cwd.display(), "Spawning process");

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(command_line)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|source| CommandError::Spawn {
            command: command_line.to_string(),
            source,
        })?;
        let mut child = GroupChild::new(child);

        let (stdout, stderr) = self.collect_output(&mut child, command_line).await?;
        let status = child.inner.wait().await?;
        // Reaped: the group id may be reused from here on
        child.disarm();

        let stdout = String::from_utf8_lossy(&stdout).to_string();
        let stderr = String::from_utf8_lossy(&stderr).to_string();
        let exit_code = status.code().unwrap_or(-1);

        if !status.success() {
            return Err(CommandError::ExitStatus {
                command: command_line.to_string(),
                code: exit_code,
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(ProcessOutput {
            stdout,
            stderr,
            exit_code,
        })
    }
}

/// Child running as leader of its own process group
///
/// Dropping it before `disarm` kills every process in the group, so commands
/// that fork (`npm run build` -> `sh` -> script) do not outlive a timeout.
struct GroupChild {
    inner: Child,
    pgid: Option<i32>,
}

impl GroupChild {
    fn new(inner: Child) -> Self {
        let pgid = inner.id().and_then(|id| i32::try_from(id).ok());
        Self { inner, pgid }
    }

    fn kill_group(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };
        #[cfg(unix)]
        {
            // SAFETY: killpg takes plain integers and touches no memory
            let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
            if rc != 0 {
                debug!(pgid, error = %std::io::Error::last_os_error(), "killpg failed");
            }
        }
        #[cfg(not(unix))]
        let _ = pgid;
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupChild {
    fn drop(&mut self) {
        // Runs before `inner` is dropped and reaped
        self.kill_group();
    }
}

/// Read at most `limit + 1` bytes so overflow is detectable
async fn read_capped<R>(reader: Option<R>, limit: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(reader) = reader {
        reader.take(limit as u64 + 1).read_to_end(&mut buf).await?;
    }
    Ok(buf)
}
