//! Sandbox entrypoint: drives one [`Agent`] from protocol lines.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::agent::{Agent, AgentEvent, ApprovalGate, EventSink, Reply};
use crate::config::SandboxEnv;
use crate::llm::OllamaClient;
use crate::protocol::{
    decode_host_line, encode_line, HostMessage, ProtocolError, SandboxMessage, STATUS_EXITING,
    STATUS_INTERRUPTED, STATUS_RESET,
};
use crate::sandbox::SandboxRoot;
use crate::skills::SkillRegistry;

/// Runs the sandbox role on this process's stdin and stdout until the host
/// says `exit`, closes the stream, or Ctrl-C arrives.
pub async fn run(env: SandboxEnv) -> Result<()> {
    info!(
        model = %env.llm.model,
        ollama_host = %env.llm.host,
        workspace = %env.workspace.display(),
        "Starting sandbox agent"
    );
    let ready = SandboxMessage::ready(&env.llm.model, &env.llm.host);

    let root = SandboxRoot::new(env.workspace.clone())?;
    let skills = SkillRegistry::with_builtins();
    info!("Skills ({}): {}", skills.len(), skills.names().join(", "));
    let llm = Arc::new(OllamaClient::new(env.llm));
    let mut agent = Agent::new(llm, skills, root, &env.agent);

    let channel = GuestChannel::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout());
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };
    serve(&mut agent, &channel, ready, shutdown).await
}

/// The sandbox's half of the protocol: host lines in, sandbox lines out.
///
/// Doubles as the agent's approval gate and event sink, so a prompt's
/// progress and approval requests travel on the same stream as its reply.
pub struct GuestChannel<R, W> {
    reader: Mutex<R>,
    writer: Mutex<W>,
}

impl<R, W> GuestChannel<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        }
    }

    /// Writes one message line and flushes it.
    pub async fn send(&self, message: &SandboxMessage) -> Result<()> {
        let line = encode_line(message)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Next non-blank input line, or `None` at end of input.
    async fn next_line(&self) -> Result<Option<String>> {
        let mut reader = self.reader.lock().await;
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(None);
            }
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
    }
}

#[async_trait]
impl<R, W> ApprovalGate for GuestChannel<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn approve(&self, command: &str) -> bool {
        let request = SandboxMessage::ApprovalRequest {
            command: command.to_string(),
        };
        if let Err(e) = self.send(&request).await {
            error!("Failed to send approval request: {e:#}");
            return false;
        }

        match self.next_line().await {
            Ok(Some(line)) => match decode_host_line(&line) {
                Ok(HostMessage::ApprovalGranted) => true,
                Ok(HostMessage::ApprovalDenied) => false,
                Ok(other) => {
                    warn!("Expected an approval answer, got {other:?}; treating as denial");
                    false
                }
                Err(e) => {
                    warn!("Unreadable approval answer ({e}); treating as denial");
                    false
                }
            },
            Ok(None) => {
                warn!("Input closed while awaiting approval; treating as denial");
                false
            }
            Err(e) => {
                warn!("Failed to read approval answer ({e:#}); treating as denial");
                false
            }
        }
    }
}

#[async_trait]
impl<R, W> EventSink for GuestChannel<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn emit(&self, event: AgentEvent) {
        if let Err(e) = self.send(&SandboxMessage::from(event)).await {
            error!("Failed to send agent event: {e:#}");
        }
    }
}

/// Serves `channel` until `exit`, end of input or `shutdown` resolving.
///
/// `ready` is sent before the first line is read. When `shutdown` wins, an
/// `interrupted` status goes out once the in-flight work has been dropped.
pub async fn serve<R, W>(
    agent: &mut Agent,
    channel: &GuestChannel<R, W>,
    ready: SandboxMessage,
    shutdown: impl Future<Output = ()>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let interrupted = {
        let work = serve_messages(agent, channel, ready);
        tokio::pin!(work);
        tokio::pin!(shutdown);
        tokio::select! {
            result = &mut work => {
                result?;
                false
            }
            _ = &mut shutdown => true,
        }
    };

    if interrupted {
        info!("Interrupted, shutting down");
        channel.send(&SandboxMessage::status(STATUS_INTERRUPTED)).await?;
    }
    Ok(())
}

async fn serve_messages<R, W>(
    agent: &mut Agent,
    channel: &GuestChannel<R, W>,
    ready: SandboxMessage,
) -> Result<()>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    channel.send(&ready).await?;
    info!("Sandbox ready ({})", agent.llm_description());

    while let Some(line) = channel.next_line().await? {
        let request = match decode_host_line(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Rejected request: {e}");
                channel.send(&SandboxMessage::error(request_error(e))).await?;
                continue;
            }
        };

        match request {
            HostMessage::Prompt { content } if content.trim().is_empty() => {
                channel.send(&SandboxMessage::error("Empty prompt")).await?;
            }
            HostMessage::Prompt { content } => {
                debug!("Prompt received ({} chars)", content.len());
                let reply = agent
                    .think_act_observe(&content, Some(channel), Some(channel))
                    .await;
                let message = match reply {
                    Reply::Answer(content) => SandboxMessage::Response { content },
                    Reply::ServiceFailure(message) => SandboxMessage::Error { message },
                };
                channel.send(&message).await?;
            }
            HostMessage::Reset => {
                agent.reset();
                channel.send(&SandboxMessage::status(STATUS_RESET)).await?;
            }
            HostMessage::Exit => {
                info!("Exit requested");
                channel.send(&SandboxMessage::status(STATUS_EXITING)).await?;
                return Ok(());
            }
            HostMessage::ApprovalGranted | HostMessage::ApprovalDenied => {
                channel
                    .send(&SandboxMessage::error("Unexpected approval message"))
                    .await?;
            }
        }
    }

    info!("Input closed, shutting down");
    Ok(())
}

fn request_error(e: ProtocolError) -> String {
    match e {
        ProtocolError::UnknownType(kind) => format!("Unknown request type: {kind}"),
        ProtocolError::MissingType => "Missing request type".to_string(),
        other => other.to_string(),
    }
}
