//! Host chat loop: terminal on one side, sandbox child on the other.

use std::io::Write;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, info};

use crate::config::Config;
use crate::protocol::{HostMessage, SandboxMessage, STATUS_READY, STATUS_RESET};
use crate::supervisor::{LaunchConfig, ProcessHandle};

/// How much of the child's stderr is shown when it dies.
const STDERR_TAIL_LINES: usize = 20;

/// Runs an interactive session: launch the sandbox, chat until `exit`,
/// end of input or Ctrl-C, then tear the sandbox down.
pub async fn run(config: Config) -> Result<()> {
    let launch = LaunchConfig::from_config(&config)?;
    tokio::fs::create_dir_all(&launch.workspace)
        .await
        .with_context(|| format!("Failed to create workspace {}", launch.workspace.display()))?;

    println!(
        "agentcell v{} | model {} | workspace {}",
        env!("CARGO_PKG_VERSION"),
        launch.model,
        launch.workspace.display()
    );
    println!("Starting sandbox {} ...", launch.container_name);

    let mut handle = ProcessHandle::launch(&launch).await?;
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut output = std::io::stdout();

    let result = {
        let session = chat(&mut handle, &mut input, &mut output);
        tokio::pin!(session);
        tokio::select! {
            result = &mut session => result,
            _ = tokio::signal::ctrl_c() => {
                println!("\nSession interrupted.");
                Ok(())
            }
        }
    };

    handle.cleanup().await;
    debug!(state = ?handle.state(), "Sandbox cleaned up");
    result
}

/// Drives one session over an already running sandbox.
pub async fn chat<R, W>(
    handle: &mut ProcessHandle,
    input: &mut Lines<R>,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    wait_ready(handle, out).await?;

    loop {
        write!(out, "\n> ")?;
        out.flush()?;

        let Some(line) = input.next_line().await? else {
            writeln!(out)?;
            info!("Terminal input closed, ending session");
            handle.send(&HostMessage::Exit).await?;
            return Ok(());
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.to_lowercase().as_str() {
            "exit" => {
                handle.send(&HostMessage::Exit).await?;
                writeln!(out, "Goodbye.")?;
                return Ok(());
            }
            "reset" => {
                handle.send(&HostMessage::Reset).await?;
                wait_reset(handle, out).await?;
            }
            _ => {
                handle.send(&HostMessage::prompt(line)).await?;
                relay(handle, input, out).await?;
            }
        }
    }
}

async fn wait_ready<W: Write>(handle: &mut ProcessHandle, out: &mut W) -> Result<()> {
    loop {
        match handle.recv().await? {
            Some(SandboxMessage::Status { status, model, .. }) if status == STATUS_READY => {
                writeln!(
                    out,
                    "Sandbox ready (model: {}). Type 'exit' to quit, 'reset' to clear the conversation.",
                    model.as_deref().unwrap_or("unknown")
                )?;
                return Ok(());
            }
            Some(SandboxMessage::Error { message }) => {
                bail!("Sandbox failed to start: {message}")
            }
            Some(other) => debug!("Ignoring {other:?} before ready"),
            None => return Err(unexpected_exit(handle).await),
        }
    }
}

async fn wait_reset<W: Write>(handle: &mut ProcessHandle, out: &mut W) -> Result<()> {
    loop {
        match handle.recv().await? {
            Some(SandboxMessage::Status { status, .. }) if status == STATUS_RESET => {
                writeln!(out, "Conversation history cleared.")?;
                return Ok(());
            }
            Some(SandboxMessage::Error { message }) => {
                writeln!(out, "Error: {message}")?;
                return Ok(());
            }
            Some(other) => debug!("Ignoring {other:?} while awaiting reset"),
            None => return Err(unexpected_exit(handle).await),
        }
    }
}

/// Prints a prompt's progress until its terminal message, answering
/// approval requests from `input` along the way.
async fn relay<R, W>(handle: &mut ProcessHandle, input: &mut Lines<R>, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    loop {
        let Some(message) = handle.recv().await? else {
            return Err(unexpected_exit(handle).await);
        };
        let terminal = message.is_terminal();

        match message {
            SandboxMessage::Thinking { content } => writeln!(out, "[thinking] {content}")?,
            SandboxMessage::ToolCall { tool, args } => {
                writeln!(out, "[tool] {tool} {}", Value::Object(args))?
            }
            SandboxMessage::ToolOutput { tool, content } => {
                writeln!(out, "[{tool} output]\n{}", content.trim_end())?
            }
            SandboxMessage::ApprovalRequest { command } => {
                write!(out, "The agent wants to run:\n    {command}\nAllow? [y/N] ")?;
                out.flush()?;
                let answer = input.next_line().await?.unwrap_or_default();
                let approved = matches!(answer.trim().to_lowercase().as_str(), "y" | "yes");
                info!(approved, "Approval answered for: {command}");

                let reply = if approved {
                    HostMessage::ApprovalGranted
                } else {
                    writeln!(out, "Command denied.")?;
                    HostMessage::ApprovalDenied
                };
                handle.send(&reply).await?;
            }
            SandboxMessage::Response { content } => writeln!(out, "\n{content}")?,
            SandboxMessage::Error { message } => writeln!(out, "Error: {message}")?,
            SandboxMessage::Status { status, .. } => debug!("Status while relaying: {status}"),
        }

        if terminal {
            return Ok(());
        }
    }
}

async fn unexpected_exit(handle: &mut ProcessHandle) -> anyhow::Error {
    let tail = tail_lines(&handle.error_output().await, STDERR_TAIL_LINES);
    if tail.is_empty() {
        anyhow!("sandbox exited unexpectedly")
    } else {
        anyhow!("sandbox exited unexpectedly:\n{tail}")
    }
}

fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    lines[lines.len().saturating_sub(count)..].join("\n")
}
