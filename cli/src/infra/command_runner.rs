//! Infrastructure implementation of the `CommandRunner` port.
//!
//! `TokioCommandRunner` is the production implementation that uses tokio
//! for async process execution with a guaranteed timeout: graceful signal
//! first, forceful kill after a grace period.

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use devpilot_common::{OutputLine, StreamKind};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::application::ports::{
    CommandRunner, ExecOutput, ExecRequest, SPAWN_FAILED_EXIT_CODE,
};
use crate::domain::error::ExecError;
use crate::infra::process::{isolate_group, kill, terminate};

/// How long a timed-out command gets between the graceful and forceful
/// signal.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(2);

/// Production `CommandRunner`.
///
/// Uses `tokio::select!` around the wait so the child is always signalled
/// and reaped on timeout, never left running after the future is dropped.
pub struct TokioCommandRunner {
    kill_grace: Duration,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new(kill_grace: Duration) -> Self {
        Self { kill_grace }
    }

    async fn execute(
        &self,
        request: &ExecRequest,
        sink: Option<&mpsc::UnboundedSender<OutputLine>>,
    ) -> Result<ExecOutput, ExecError> {
        let started = Instant::now();
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .current_dir(&request.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        isolate_group(&mut cmd);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(program = %request.program, error = %e, "failed to spawn");
                return Ok(ExecOutput::spawn_failed(format!(
                    "failed to spawn {}: {e}",
                    request.program
                )));
            }
        };
        let pid = child.id();
        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();
        let mut stdout = String::new();
        let mut stderr = String::new();

        tokio::select! {
            status = async {
                let (status, (), ()) = tokio::join!(
                    child.wait(),
                    read_stream(stdout_handle, StreamKind::Stdout, sink, &mut stdout),
                    read_stream(stderr_handle, StreamKind::Stderr, sink, &mut stderr),
                );
                status
            } => {
                let exit_code = match status {
                    Ok(status) => exit_code(status),
                    Err(e) => {
                        stderr.push_str(&format!("\nfailed to wait for {}: {e}", request.program));
                        SPAWN_FAILED_EXIT_CODE
                    }
                };
                Ok(ExecOutput {
                    exit_code,
                    stdout,
                    stderr,
                    duration: started.elapsed(),
                })
            }
            () = tokio::time::sleep(request.timeout) => {
                tracing::warn!(command = %request.command_line(), timeout_secs = request.timeout.as_secs(), "command timed out, terminating");
                if let Some(pid) = pid {
                    terminate(pid);
                }
                if tokio::time::timeout(self.kill_grace, child.wait()).await.is_err() {
                    if let Some(pid) = pid {
                        kill(pid);
                    }
                    let _ = child.kill().await;
                }
                Err(ExecError::Timeout {
                    after: request.timeout,
                    stdout,
                    stderr,
                })
            }
        }
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_KILL_GRACE)
    }
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, request: &ExecRequest) -> Result<ExecOutput, ExecError> {
        self.execute(request, None).await
    }

    async fn run_streaming(
        &self,
        request: &ExecRequest,
        sink: mpsc::UnboundedSender<OutputLine>,
    ) -> Result<ExecOutput, ExecError> {
        self.execute(request, Some(&sink)).await
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    // Shell convention for signal deaths.
    status
        .code()
        .or_else(|| status.signal().map(|s| 128 + s))
        .unwrap_or(SPAWN_FAILED_EXIT_CODE)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(SPAWN_FAILED_EXIT_CODE)
}

/// Read `reader` to EOF line by line into `buf`, forwarding each line to
/// `sink` when streaming.
async fn read_stream<R: AsyncRead + Unpin>(
    reader: Option<R>,
    stream: StreamKind,
    sink: Option<&mpsc::UnboundedSender<OutputLine>>,
    buf: &mut String,
) {
    let Some(reader) = reader else { return };
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let text = String::from_utf8_lossy(&line);
        buf.push_str(&text);
        if let Some(sink) = sink {
            let _ = sink.send(OutputLine {
                stream,
                line: text.trim_end_matches(['\n', '\r']).to_string(),
            });
        }
    }
}
