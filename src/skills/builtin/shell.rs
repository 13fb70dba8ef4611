//! Builtin skill: run a shell command inside the workspace.
//!
//! The command runs through `sh -c` in its own process group so that a
//! timeout can take down the whole pipeline, not only the shell. Standard
//! error is appended to standard output under a `[stderr]` section.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::sandbox::{ToolError, ToolResult};
use crate::skills::{parse_args, Param, ParamType, Skill, SkillContext};

/// Default command budget: 30 seconds.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CommandArgs {
    cmd: String,
    #[serde(default)]
    timeout: Option<Value>,
}

/// Executes shell commands with a time budget.
pub struct ExecuteCommandSkill;

#[async_trait]
impl Skill for ExecuteCommandSkill {
    fn name(&self) -> &'static str {
        "execute_command"
    }

    fn description(&self) -> &'static str {
        "Execute a shell command in the workspace and return its combined output. \
         Requires approval from the operator."
    }

    fn parameters(&self) -> &'static [Param] {
        const PARAMS: &[Param] = &[
            Param::required("cmd", ParamType::String, "The shell command to execute"),
            Param::optional(
                "timeout",
                ParamType::Integer,
                "Maximum execution time in seconds (default 30). Strings such as '500ms' or '2m' are accepted",
            ),
        ];
        PARAMS
    }

    async fn execute(&self, params: Value, context: &SkillContext) -> ToolResult<String> {
        let args: CommandArgs = parse_args(params)?;
        let timeout = match args.timeout {
            Some(ref value) => parse_timeout(value)?,
            None => DEFAULT_TIMEOUT,
        };
        run_command(&args.cmd, context.root.path(), timeout).await
    }
}

/// Parses a timeout given either as seconds (number) or as a string with an
/// optional unit suffix (`ms`, `s`, `m`, `h`). `null` selects the default.
pub fn parse_timeout(value: &Value) -> ToolResult<Duration> {
    let invalid = || ToolError::invalid_arguments(format!("Invalid timeout: {value}"));

    let secs = match value {
        Value::Null => return Ok(DEFAULT_TIMEOUT),
        Value::Number(n) => n.as_f64().ok_or_else(invalid)?,
        Value::String(s) => {
            let s = s.trim();
            let split = s
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .unwrap_or(s.len());
            let (number, unit) = s.split_at(split);
            let number: f64 = number.parse().map_err(|_| invalid())?;
            let scale = match unit.trim() {
                "" | "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
                "ms" | "millis" | "milliseconds" => 0.001,
                "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
                "h" | "hour" | "hours" => 3600.0,
                _ => return Err(invalid()),
            };
            number * scale
        }
        _ => return Err(invalid()),
    };

    if !secs.is_finite() || secs <= 0.0 {
        return Err(invalid());
    }
    Duration::try_from_secs_f64(secs).map_err(|_| invalid())
}

/// Runs `cmd` through the shell in `cwd`, bounded by `timeout`.
pub async fn run_command(cmd: &str, cwd: &Path, timeout: Duration) -> ToolResult<String> {
    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(cmd)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    debug!(command = %cmd, timeout_ms = timeout.as_millis() as u64, "Executing command");

    let mut child = command
        .spawn()
        .map_err(|e| ToolError::io(format!("Command execution failed: {e}")))?;
    let pid = child.id();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Draining the pipes is part of the budget: a backgrounded descendant
    // can hold them open after the shell itself has exited.
    let finished = async {
        let (status, stdout, stderr) =
            tokio::join!(child.wait(), read_all(stdout), read_all(stderr));
        status.map(|status| (status, stdout, stderr))
    };

    let outcome = tokio::time::timeout(timeout, finished).await;
    let (status, stdout, stderr) = match outcome {
        Ok(Ok(collected)) => collected,
        Ok(Err(e)) => return Err(ToolError::io(format!("Command execution failed: {e}"))),
        Err(_) => {
            warn!(command = %cmd, "Command timed out after {timeout:?}, killing");
            kill_process_group(pid);
            // Reaps the shell unless it already exited on its own.
            if !matches!(child.try_wait(), Ok(Some(_))) {
                if let Err(e) = child.kill().await {
                    warn!("Failed to reap timed-out command: {e}");
                }
            }
            return Err(ToolError::Timeout(timeout));
        }
    };

    let mut output = stdout;
    if !stderr.is_empty() {
        output.push_str("\n[stderr]\n");
        output.push_str(&stderr);
    }

    if !status.success() {
        return Err(ToolError::Execution {
            code: status.code().unwrap_or(-1),
            output,
        });
    }

    if output.is_empty() {
        Ok("(no output)".to_string())
    } else {
        Ok(output)
    }
}

async fn read_all<R: AsyncRead + Unpin>(stream: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        let _ = stream.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        // SAFETY: killpg only sends a signal. The group id equals the pid of
        // the shell spawned with process_group(0).
        unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
