use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::launch::LaunchConfig;
use crate::protocol::{decode_sandbox_line_lossy, encode_line, HostMessage, ProtocolError, SandboxMessage};

/// How long a fresh child gets before it is checked for an early exit.
pub const START_GRACE: Duration = Duration::from_millis(500);

/// How long `stop` waits for a graceful exit before killing.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound for draining stderr in [`ProcessHandle::error_output`].
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Newest stderr bytes kept for [`ProcessHandle::error_output`].
pub const STDERR_TAIL_BYTES: usize = 16 * 1024;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Sandbox exited during startup ({status}){}", format_stderr(.stderr))]
    ExitedEarly { status: String, stderr: String },

    #[error("Sandbox is not running")]
    NotRunning,

    #[error("Sandbox I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Encode(#[from] ProtocolError),
}

fn format_stderr(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Lifecycle of a [`ProcessHandle`]. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Created,
    Running,
    Stopping,
    Stopped,
}

/// One sandbox child process and its three standard streams.
///
/// The handle owns the streams outright. Once `Stopped` it cannot be
/// restarted; launch a new handle instead.
pub struct ProcessHandle {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    stderr: StderrTail,
    state: ProcessState,
    stop_timeout: Duration,
}

impl ProcessHandle {
    /// Starts the sandbox container described by `config`.
    pub async fn launch(config: &LaunchConfig) -> Result<Self, SupervisorError> {
        info!(
            container = %config.container_name,
            image = %config.image,
            workspace = %config.workspace.display(),
            "Launching sandbox"
        );
        Self::start(config.command()).await
    }

    /// Spawns `command` with piped streams, then fails if the child does
    /// not survive the start grace period.
    pub async fn start(mut command: Command) -> Result<Self, SupervisorError> {
        let program = command.as_std().get_program().to_string_lossy().into_owned();
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| SupervisorError::Spawn {
            program: program.clone(),
            source,
        })?;
        debug!(pid = ?child.id(), "Spawned {program}");

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().ok_or_else(|| {
            SupervisorError::Io(std::io::Error::other("child stdout was not captured"))
        })?;
        let stderr = StderrTail::spawn(child.stderr.take());

        let mut handle = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr,
            state: ProcessState::Created,
            stop_timeout: STOP_TIMEOUT,
        };

        tokio::time::sleep(START_GRACE).await;
        if let Some(status) = handle.child.try_wait()? {
            handle.state = ProcessState::Stopped;
            let stderr = handle.error_output().await;
            warn!("{program} exited during startup ({status})");
            return Err(SupervisorError::ExitedEarly {
                status: status.to_string(),
                stderr,
            });
        }

        handle.state = ProcessState::Running;
        info!("Sandbox process running");
        Ok(handle)
    }

    /// Overrides the graceful-stop budget.
    #[cfg(test)]
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// `true` while the handle is `Running` and the child has not exited.
    pub fn is_running(&mut self) -> bool {
        self.state == ProcessState::Running && matches!(self.child.try_wait(), Ok(None))
    }

    /// Writes one message line to the child and flushes it.
    pub async fn send(&mut self, message: &HostMessage) -> Result<(), SupervisorError> {
        if !self.is_running() {
            return Err(SupervisorError::NotRunning);
        }
        let stdin = self.stdin.as_mut().ok_or(SupervisorError::NotRunning)?;
        let line = encode_line(message)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Reads the next message from the child, or `None` at end of output.
    ///
    /// Blank lines are skipped. A line that is not a protocol message comes
    /// back as a `response` carrying the raw text.
    pub async fn recv(&mut self) -> Result<Option<SandboxMessage>, SupervisorError> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if self.stdout.read_until(b'\n', &mut buf).await? == 0 {
                debug!("Sandbox stdout closed");
                return Ok(None);
            }
            let line = String::from_utf8_lossy(&buf);
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(decode_sandbox_line_lossy(&line)));
        }
    }

    /// The last [`STDERR_TAIL_BYTES`] the child wrote to stderr. Meant for
    /// after it exited; a still-running child yields what arrived so far.
    pub async fn error_output(&mut self) -> String {
        self.stderr.contents().await
    }

    /// Closes stdin, waits for a graceful exit, and kills the child if the
    /// wait times out. Calling it again after it succeeded does nothing.
    pub async fn stop(&mut self) -> Result<(), SupervisorError> {
        if self.state == ProcessState::Stopped {
            return Ok(());
        }
        self.state = ProcessState::Stopping;

        // Dropping stdin closes the pipe: end of input for the child.
        drop(self.stdin.take());

        match tokio::time::timeout(self.stop_timeout, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!("Sandbox exited ({status})");
            }
            Err(_) => {
                warn!(
                    "Sandbox did not exit within {:?}, killing it",
                    self.stop_timeout
                );
                self.child.kill().await?;
            }
        }

        self.state = ProcessState::Stopped;
        info!("Sandbox process stopped");
        Ok(())
    }

    /// `stop`, with any failure logged instead of returned.
    pub async fn cleanup(&mut self) {
        if let Err(e) = self.stop().await {
            warn!("Sandbox cleanup failed: {e}");
        }
    }
}

/// Background drain of the child's stderr.
///
/// The pipe is read continuously so a chatty child never blocks on it; only
/// the newest bytes are kept.
struct StderrTail {
    buffer: Arc<Mutex<VecDeque<u8>>>,
    drain: Option<JoinHandle<()>>,
}

impl StderrTail {
    fn spawn(stderr: Option<ChildStderr>) -> Self {
        let buffer = Arc::new(Mutex::new(VecDeque::new()));
        let drain = stderr.map(|mut stderr| {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                loop {
                    match stderr.read(&mut chunk).await {
                        Ok(0) => break,
                        Ok(n) => push_tail(&buffer, &chunk[..n]),
                        Err(e) => {
                            debug!("Stopped reading sandbox stderr: {e}");
                            break;
                        }
                    }
                }
            })
        });
        Self { buffer, drain }
    }

    async fn contents(&mut self) -> String {
        if let Some(drain) = self.drain.as_mut() {
            match tokio::time::timeout(STDERR_DRAIN_TIMEOUT, drain).await {
                Ok(_) => self.drain = None,
                Err(_) => debug!("Sandbox stderr still open, returning partial output"),
            }
        }
        let buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        let (front, back) = buffer.as_slices();
        let mut bytes = Vec::with_capacity(buffer.len());
        bytes.extend_from_slice(front);
        bytes.extend_from_slice(back);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

fn push_tail(buffer: &Mutex<VecDeque<u8>>, bytes: &[u8]) {
    let mut buffer = buffer.lock().unwrap_or_else(|e| e.into_inner());
    buffer.extend(bytes);
    if buffer.len() > STDERR_TAIL_BYTES {
        let excess = buffer.len() - STDERR_TAIL_BYTES;
        buffer.drain(..excess);
    }
}
