//! Runs an external delivery program as a short-lived child process.
//!
//! Each invocation spawns exactly one child, passes the message as positional
//! arguments, drains stdout and stderr concurrently and waits for the exit,
//! all bounded by [`BridgeConfig::timeout`]. When the timeout fires the child
//! and everything it started are killed with no grace period. On every path
//! the pipes are closed and the child is reaped before
//! [`ProcessBridge::invoke`] returns.

use crate::config::BridgeSettings;
use crate::core::OutboundMessage;
use std::ffi::OsString;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{debug, instrument, warn};

/// Immutable bridge settings, shared by all invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Program to execute.
    pub executable: String,
    /// Arguments placed before the per-message arguments.
    pub fixed_args: Vec<String>,
    /// Upper bound for the whole interaction with the child.
    pub timeout: Duration,
}

impl From<&BridgeSettings> for BridgeConfig {
    fn from(settings: &BridgeSettings) -> Self {
        Self {
            executable: settings.executable.clone(),
            fixed_args: settings.fixed_args.clone(),
            timeout: Duration::from_millis(settings.timeout_ms),
        }
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to start bridge executable '{executable}': {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("bridge {stream} stream failed: {source}")]
    Stream {
        stream: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("bridge timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("bridge reported failure: {0}")]
    RemoteFailure(String),
}

/// Delivers messages by running the configured bridge program.
#[derive(Debug, Clone)]
pub struct ProcessBridge {
    config: Arc<BridgeConfig>,
}

impl ProcessBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Builds the child's argument vector:
    /// `fixed_args... <destination_id> <text> [<attachment_path>]`.
    pub fn arguments_for(&self, message: &OutboundMessage) -> Vec<OsString> {
        let mut args: Vec<OsString> =
            self.config.fixed_args.iter().map(OsString::from).collect();
        args.push(message.destination_id.to_string().into());
        args.push(OsString::from(&message.text));
        if let Some(path) = &message.attachment_path {
            args.push(path.as_os_str().to_owned());
        }
        args
    }

    /// Runs the bridge for `message` and returns whatever it printed to stdout.
    pub async fn invoke(&self, message: &OutboundMessage) -> Result<String, BridgeError> {
        self.invoke_with_input(message, None).await
    }

    /// Like [`invoke`](Self::invoke), but writes `input` to the child's stdin
    /// before closing it.
    #[instrument(skip(self, message, input), fields(chat_id = message.destination_id))]
    pub async fn invoke_with_input(
        &self,
        message: &OutboundMessage,
        input: Option<&[u8]>,
    ) -> Result<String, BridgeError> {
        let start = Instant::now();
        let mut handle =
            ChildProcessHandle::spawn(&self.config.executable, self.arguments_for(message))?;
        debug!(
            pid = ?handle.pid(),
            executable = %self.config.executable,
            "Bridge process started"
        );

        let communicate = handle.communicate(input);
        let result = match tokio::time::timeout(self.config.timeout, communicate).await {
            Ok(Ok(output)) => output.into_result(),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(
                    pid = ?handle.pid(),
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "Bridge process timed out, killing it"
                );
                metrics::counter!("bridge_timeouts_total").increment(1);
                Err(BridgeError::Timeout(self.config.timeout))
            }
        };

        handle.release().await;
        metrics::histogram!("bridge_invocation_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        result
    }
}

/// What a child left behind after running to completion.
#[derive(Debug)]
struct BridgeOutput {
    stdout: String,
    stderr: String,
    status: Option<ExitStatus>,
}

impl BridgeOutput {
    /// Anything on stderr fails the call, whatever the exit status says.
    fn into_result(self) -> Result<String, BridgeError> {
        if !self.stderr.is_empty() {
            let detail = self.stderr.trim();
            let detail = if detail.is_empty() {
                self.stderr.clone()
            } else {
                detail.to_string()
            };
            return Err(BridgeError::RemoteFailure(detail));
        }
        if let Some(status) = self.status.filter(|s| !s.success()) {
            warn!(%status, "Bridge process exited unsuccessfully with an empty stderr");
        }
        Ok(self.stdout)
    }
}

/// Bytes kept from each output stream; the rest is read and discarded.
const MAX_CAPTURED_BYTES: usize = 64 * 1024;

/// Exclusive owner of one spawned child and its three pipes.
///
/// On Unix the child leads its own process group, so anything it starts is
/// killed along with it. [`release`](Self::release) closes the pipes, kills
/// the group and reaps the child. If the handle is dropped without being
/// released (the calling future was cancelled), the group is killed and the
/// child is left to tokio's orphan reaper.
struct ChildProcessHandle {
    child: Child,
    group: Option<u32>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    reaped: bool,
}

impl ChildProcessHandle {
    fn spawn(executable: &str, args: Vec<OsString>) -> Result<Self, BridgeError> {
        let mut command = Command::new(executable);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| BridgeError::Spawn {
            executable: executable.to_string(),
            source,
        })?;

        Ok(Self {
            group: child.id(),
            stdin: child.stdin.take(),
            stdout: child.stdout.take(),
            stderr: child.stderr.take(),
            child,
            reaped: false,
        })
    }

    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Feeds stdin, closes it, drains both output streams, then awaits exit.
    async fn communicate(&mut self, input: Option<&[u8]>) -> Result<BridgeOutput, BridgeError> {
        let stdout = self.stdout.take();
        let stderr = self.stderr.take();

        if let Some(mut stdin) = self.stdin.take() {
            if let Some(bytes) = input {
                stdin
                    .write_all(bytes)
                    .await
                    .map_err(|source| BridgeError::Stream { stream: "stdin", source })?;
                stdin
                    .flush()
                    .await
                    .map_err(|source| BridgeError::Stream { stream: "stdin", source })?;
            }
        }

        let (stdout, stderr) =
            tokio::try_join!(drain(stdout, "stdout"), drain(stderr, "stderr"))?;

        let status = match self.child.wait().await {
            Ok(status) => Some(status),
            Err(e) => {
                debug!(error = %e, "Waiting for bridge process failed");
                None
            }
        };
        self.reaped = true;

        Ok(BridgeOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            status,
        })
    }

    /// Sends SIGKILL to the child's whole process group.
    ///
    /// Also runs after a clean exit, to take down background processes the
    /// bridge left behind. A group with no members left is not an error.
    #[cfg(unix)]
    fn kill_group(&mut self) {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Some(group) = self.group.take() else {
            return;
        };
        match killpg(Pid::from_raw(group as i32), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => debug!(pgid = group, error = %e, "Killing bridge process group failed"),
        }
    }

    #[cfg(not(unix))]
    fn kill_group(&mut self) {
        self.group.take();
        if !self.reaped {
            let _ = self.child.start_kill();
        }
    }

    /// Best-effort cleanup. Kill and wait failures are logged, never returned.
    async fn release(&mut self) {
        self.stdin.take();
        self.stdout.take();
        self.stderr.take();
        self.kill_group();
        if self.reaped {
            return;
        }

        if let Err(e) = self.child.start_kill() {
            debug!(error = %e, "Bridge process could not be killed, it has likely exited");
        }
        match self.child.wait().await {
            Ok(status) => debug!(%status, "Bridge process reaped"),
            Err(e) => debug!(error = %e, "Reaping bridge process failed"),
        }
        self.reaped = true;
    }
}

impl Drop for ChildProcessHandle {
    fn drop(&mut self) {
        self.kill_group();
        if !self.reaped {
            let _ = self.child.start_kill();
        }
    }
}

/// Reads `reader` to the end, keeping at most [`MAX_CAPTURED_BYTES`].
async fn drain<R>(reader: Option<R>, stream: &'static str) -> Result<Vec<u8>, BridgeError>
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let Some(mut reader) = reader else {
        return Ok(kept);
    };

    let mut chunk = [0u8; 8192];
    let mut discarded = 0usize;
    loop {
        let n = reader
            .read(&mut chunk)
            .await
            .map_err(|source| BridgeError::Stream { stream, source })?;
        if n == 0 {
            break;
        }
        let room = MAX_CAPTURED_BYTES - kept.len();
        kept.extend_from_slice(&chunk[..n.min(room)]);
        discarded += n.saturating_sub(room);
    }

    if discarded > 0 {
        warn!(stream, discarded, "Bridge output exceeded the capture limit and was truncated");
    }
    Ok(kept)
}
